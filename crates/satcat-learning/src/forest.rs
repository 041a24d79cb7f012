//! Random forest classifier.
//!
//! Each tree is a Gini CART grown on a bootstrap sample, considering
//! `sqrt(n_features)` randomly chosen features per split. Trees are stored
//! as flat node arenas so the whole forest serializes to plain JSON.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::LearningError;

/// How samples are weighted per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClassWeight {
    /// Every sample weighs one.
    #[default]
    #[serde(rename = "none", alias = "uniform")]
    Uniform,
    /// Samples weigh `n_samples / (n_classes * class_count)`.
    #[serde(rename = "balanced")]
    Balanced,
}

impl ClassWeight {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassWeight::Uniform => "none",
            ClassWeight::Balanced => "balanced",
        }
    }
}

/// Hyperparameters of one forest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    /// Minimum distinct samples a node needs before it may split.
    pub min_samples_split: usize,
    /// Minimum distinct samples on each side of a split.
    pub min_samples_leaf: usize,
    pub class_weight: ClassWeight,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            class_weight: ClassWeight::Uniform,
        }
    }
}

impl std::fmt::Display for ForestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        write!(
            f,
            "n_estimators={}, max_depth={}, min_samples_split={}, min_samples_leaf={}, class_weight={}",
            self.n_estimators,
            depth,
            self.min_samples_split,
            self.min_samples_leaf,
            self.class_weight.as_str()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution, normalized to sum to one.
    Leaf { distribution: Vec<f64> },
}

/// One fitted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_for(&self, row: &[f64]) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            match &self.nodes[id] {
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                Node::Leaf { .. } => deepest = deepest.max(depth),
            }
        }
        deepest
    }
}

/// Training inputs shared by every tree of one fit.
struct TreeInputs<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    params: &'a ForestParams,
    max_features: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Position in the sorted order; samples `..=position` go left.
    position: usize,
    proxy: f64,
}

fn gini(totals: &[f64], weight: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    1.0 - totals.iter().map(|c| (c / weight).powi(2)).sum::<f64>()
}

fn class_totals(samples: &[usize], inputs: &TreeInputs<'_>, weights: &[f64]) -> Vec<f64> {
    let mut totals = vec![0.0; inputs.n_classes];
    for &i in samples {
        totals[inputs.y[i]] += weights[i];
    }
    totals
}

fn grow_tree(
    inputs: &TreeInputs<'_>,
    weights: &[f64],
    rng: &mut StdRng,
    importances: &mut [f64],
) -> DecisionTree {
    let n_features = inputs.x[0].len();
    let root: Vec<usize> = (0..inputs.x.len()).filter(|&i| weights[i] > 0.0).collect();

    let mut nodes = vec![Node::Leaf {
        distribution: Vec::new(),
    }];
    let mut stack = vec![(0usize, root, 0usize)];
    let mut feature_order: Vec<usize> = (0..n_features).collect();

    while let Some((id, mut samples, depth)) = stack.pop() {
        let totals = class_totals(&samples, inputs, weights);
        let weight: f64 = totals.iter().sum();
        let impurity = gini(&totals, weight);

        let depth_reached = inputs.params.max_depth.is_some_and(|max| depth >= max);
        let too_small = samples.len() < inputs.params.min_samples_split
            || samples.len() < 2 * inputs.params.min_samples_leaf;

        let split = if depth_reached || too_small || impurity <= f64::EPSILON {
            None
        } else {
            feature_order.shuffle(rng);
            best_split(inputs, weights, &mut samples, &feature_order, &totals)
        };

        let Some(split) = split else {
            let distribution = if weight > 0.0 {
                totals.iter().map(|c| c / weight).collect()
            } else {
                vec![1.0 / inputs.n_classes as f64; inputs.n_classes]
            };
            nodes[id] = Node::Leaf { distribution };
            continue;
        };

        let feature = split.feature;
        samples.sort_by(|&a, &b| inputs.x[a][feature].total_cmp(&inputs.x[b][feature]));
        let right_samples = samples.split_off(split.position + 1);
        let left_samples = samples;

        let left_totals = class_totals(&left_samples, inputs, weights);
        let right_totals = class_totals(&right_samples, inputs, weights);
        let left_weight: f64 = left_totals.iter().sum();
        let right_weight: f64 = right_totals.iter().sum();
        importances[feature] += weight * impurity
            - left_weight * gini(&left_totals, left_weight)
            - right_weight * gini(&right_totals, right_weight);

        let left = nodes.len();
        let right = left + 1;
        nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        nodes[id] = Node::Split {
            feature,
            threshold: split.threshold,
            left,
            right,
        };
        stack.push((right, right_samples, depth + 1));
        stack.push((left, left_samples, depth + 1));
    }

    DecisionTree { nodes }
}

/// Best Gini split over the sampled features.
///
/// Features are visited in `feature_order` until `max_features` features
/// that are not constant within the node have been examined.
fn best_split(
    inputs: &TreeInputs<'_>,
    weights: &[f64],
    samples: &mut [usize],
    feature_order: &[usize],
    totals: &[f64],
) -> Option<SplitCandidate> {
    let min_leaf = inputs.params.min_samples_leaf;
    let mut best: Option<SplitCandidate> = None;
    let mut visited = 0;

    for &feature in feature_order {
        if visited >= inputs.max_features {
            break;
        }
        samples.sort_by(|&a, &b| inputs.x[a][feature].total_cmp(&inputs.x[b][feature]));
        let first = inputs.x[samples[0]][feature];
        let last = inputs.x[samples[samples.len() - 1]][feature];
        if first == last {
            continue;
        }
        visited += 1;

        let mut left = vec![0.0; inputs.n_classes];
        let mut left_weight = 0.0;
        let total_weight: f64 = totals.iter().sum();

        for position in 0..samples.len() - 1 {
            let i = samples[position];
            left[inputs.y[i]] += weights[i];
            left_weight += weights[i];

            let value = inputs.x[i][feature];
            let next = inputs.x[samples[position + 1]][feature];
            if value == next {
                continue;
            }
            let n_left = position + 1;
            if n_left < min_leaf || samples.len() - n_left < min_leaf {
                continue;
            }

            let right_weight = total_weight - left_weight;
            if left_weight <= 0.0 || right_weight <= 0.0 {
                continue;
            }
            let left_sq: f64 = left.iter().map(|c| c * c).sum();
            let right_sq: f64 = totals
                .iter()
                .zip(&left)
                .map(|(t, l)| (t - l) * (t - l))
                .sum();
            let proxy = left_sq / left_weight + right_sq / right_weight;

            if best.as_ref().is_none_or(|b| proxy > b.proxy) {
                let mut threshold = (value + next) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    position,
                    proxy,
                });
            }
        }
    }
    best
}

/// Per-class weights for `y`.
fn class_weights(y: &[usize], n_classes: usize, mode: ClassWeight) -> Vec<f64> {
    match mode {
        ClassWeight::Uniform => vec![1.0; n_classes],
        ClassWeight::Balanced => {
            let mut counts = vec![0usize; n_classes];
            for &label in y {
                counts[label] += 1;
            }
            let present = counts.iter().filter(|&&c| c > 0).count().max(1);
            counts
                .iter()
                .map(|&c| {
                    if c == 0 {
                        1.0
                    } else {
                        y.len() as f64 / (present as f64 * c as f64)
                    }
                })
                .collect()
        }
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_classes: usize,
    feature_names: Vec<String>,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on rows `x` with class indices `y` in `0..n_classes`.
    ///
    /// Tree `t` draws its bootstrap sample and feature order from a
    /// generator seeded with `seed + t`, so fits are reproducible.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if `x` is empty, if row
    /// widths differ from `feature_names`, if `x` and `y` differ in length
    /// or if a label is outside `0..n_classes`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        feature_names: &[String],
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self, LearningError> {
        if x.is_empty() {
            return Err(LearningError::InvalidData(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(LearningError::InvalidData(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = feature_names.len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(LearningError::InvalidData(format!(
                "every row must have {n_features} features"
            )));
        }
        if let Some(bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(LearningError::InvalidData(format!(
                "label {bad} is outside 0..{n_classes}"
            )));
        }

        let per_class = class_weights(y, n_classes, params.class_weight);
        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        let inputs = TreeInputs {
            x,
            y,
            n_classes,
            params,
            max_features,
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];
        let n = x.len();

        for t in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
            let mut counts = vec![0u32; n];
            for _ in 0..n {
                counts[rng.gen_range(0..n)] += 1;
            }
            let weights: Vec<f64> = counts
                .iter()
                .zip(y)
                .map(|(&count, &label)| f64::from(count) * per_class[label])
                .collect();

            let mut tree_importances = vec![0.0; n_features];
            trees.push(grow_tree(&inputs, &weights, &mut rng, &mut tree_importances));

            let sum: f64 = tree_importances.iter().sum();
            if sum > 0.0 {
                for (total, value) in importances.iter_mut().zip(&tree_importances) {
                    *total += value / sum;
                }
            }
        }

        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            importances.iter_mut().for_each(|v| *v /= sum);
        }

        Ok(Self {
            params: params.clone(),
            n_classes,
            feature_names: feature_names.to_vec(),
            trees,
            feature_importances: importances,
        })
    }

    /// Mean class distribution over all trees.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if `row` has the wrong width.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, LearningError> {
        if row.len() != self.feature_names.len() {
            return Err(LearningError::InvalidData(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                row.len()
            )));
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in proba.iter_mut().zip(tree.leaf_for(row)) {
                *total += p;
            }
        }
        let n_trees = self.trees.len().max(1) as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        Ok(proba)
    }

    /// Most probable class index; ties go to the smallest index.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if `row` has the wrong width.
    pub fn predict(&self, row: &[f64]) -> Result<usize, LearningError> {
        let proba = self.predict_proba(row)?;
        let mut best = 0;
        for (class, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = class;
            }
        }
        Ok(best)
    }

    /// Predict every row.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if any row has the wrong width.
    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>, LearningError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean decrease in Gini impurity per feature, summing to one.
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}
