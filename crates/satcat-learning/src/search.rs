//! Stratified cross-validation and parallel grid search.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use crate::error::LearningError;
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::macro_f1;
use crate::preprocess::take;
use crate::types::CandidateScore;

/// One cross-validation fold as `(train, validation)` row indices.
pub type Fold = (Vec<usize>, Vec<usize>);

/// Split rows into `k` folds preserving class proportions.
///
/// The samples of each class are dealt to the folds in turn, in row order.
///
/// # Errors
///
/// Returns [`LearningError::InvalidData`] if there are fewer rows than folds.
pub fn stratified_folds(y: &[usize], k: usize) -> Result<Vec<Fold>, LearningError> {
    if k < 2 || y.len() < k {
        return Err(LearningError::InvalidData(format!(
            "cannot split {} rows into {} folds",
            y.len(),
            k
        )));
    }

    let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
    let mut seen = vec![0usize; n_classes];
    let mut fold_of = Vec::with_capacity(y.len());
    for &label in y {
        fold_of.push(seen[label] % k);
        seen[label] += 1;
    }

    Ok((0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| fold_of[i] == fold);
            (train, validation)
        })
        .collect())
}

/// Classes with fewer members than folds.
#[must_use]
pub fn sparse_classes(y: &[usize], k: usize) -> Vec<usize> {
    let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
    let mut counts = vec![0usize; n_classes];
    for &label in y {
        counts[label] += 1;
    }
    counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0 && count < k)
        .map(|(class, _)| class)
        .collect()
}

/// Training data shared read-only by every search worker.
pub struct SearchData<'a> {
    pub x: &'a [Vec<f64>],
    pub y: &'a [usize],
    pub n_classes: usize,
    pub feature_names: &'a [String],
    pub seed: u64,
}

fn score_candidate(
    data: &SearchData<'_>,
    folds: &[Fold],
    params: &ForestParams,
) -> Result<CandidateScore, LearningError> {
    let mut fold_scores = Vec::with_capacity(folds.len());
    for (train, validation) in folds {
        let forest = RandomForest::fit(
            &take(data.x, train),
            &take(data.y, train),
            data.n_classes,
            data.feature_names,
            params,
            data.seed,
        )?;
        let predicted = forest.predict_many(&take(data.x, validation))?;
        fold_scores.push(macro_f1(&take(data.y, validation), &predicted));
    }
    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len().max(1) as f64;
    debug!("{} -> {:.4}", params, mean_score);
    Ok(CandidateScore {
        params: params.clone(),
        mean_score,
        fold_scores,
    })
}

/// Cross-validate every candidate on `jobs` scoped threads.
///
/// Worker `w` scores candidates `w, w + jobs, ...`. Scores come back in
/// grid order regardless of which worker finished first. `on_candidate`
/// receives `(completed, total)` after each candidate.
///
/// # Errors
///
/// Returns the first error in grid order, or
/// [`LearningError::InvalidData`] if a worker panicked.
pub fn grid_search<F>(
    data: &SearchData<'_>,
    folds: &[Fold],
    candidates: &[ForestParams],
    jobs: usize,
    on_candidate: F,
) -> Result<Vec<CandidateScore>, LearningError>
where
    F: Fn(usize, usize) + Sync,
{
    let total = candidates.len();
    let workers = jobs.clamp(1, total.max(1));
    let completed = AtomicUsize::new(0);
    info!(
        "Cross-validating {} candidates over {} folds with {} workers",
        total,
        folds.len(),
        workers
    );

    let mut results: Vec<Option<Result<CandidateScore, LearningError>>> =
        (0..total).map(|_| None).collect();

    let outcome = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let completed = &completed;
                let on_candidate = &on_candidate;
                scope.spawn(move || {
                    (worker..total)
                        .step_by(workers)
                        .map(|index| {
                            let score = score_candidate(data, folds, &candidates[index]);
                            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                            on_candidate(done, total);
                            (index, score)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Result<Vec<_>, _>>()
    });

    let per_worker = outcome.map_err(|_| {
        LearningError::InvalidData("a grid search worker panicked".to_string())
    })?;
    for (index, score) in per_worker.into_iter().flatten() {
        results[index] = Some(score);
    }

    results
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(LearningError::InvalidData(
                    "a grid candidate was not scored".to_string(),
                ))
            })
        })
        .collect()
}

/// Index of the highest mean score; ties go to the earliest candidate.
#[must_use]
pub fn best_candidate(scores: &[CandidateScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, score) in scores.iter().enumerate() {
        if best.is_none_or(|b| score.mean_score > scores[b].mean_score) {
            best = Some(index);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ClassWeight;
    use std::sync::Mutex;

    // ========================================================================
    // Folds
    // ========================================================================

    #[test]
    fn test_stratified_folds_balance_classes() {
        let y = vec![0, 0, 0, 1, 1, 1, 0, 0, 0];
        let folds = stratified_folds(&y, 3).unwrap();
        assert_eq!(folds.len(), 3);

        for (train, validation) in &folds {
            assert_eq!(train.len() + validation.len(), y.len());
            let ones = validation.iter().filter(|&&i| y[i] == 1).count();
            let zeros = validation.iter().filter(|&&i| y[i] == 0).count();
            assert_eq!((zeros, ones), (2, 1));
        }

        // every row is validated exactly once
        let mut all: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_folds_too_few_rows() {
        assert!(stratified_folds(&[0, 1], 3).is_err());
        assert!(stratified_folds(&[0, 1, 0], 1).is_err());
    }

    #[test]
    fn test_sparse_classes() {
        assert_eq!(sparse_classes(&[0, 0, 0, 1, 2, 2, 2], 3), vec![1]);
    }

    // ========================================================================
    // Search
    // ========================================================================

    fn data() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..12 {
            x.push(vec![i as f64]);
            y.push(0);
            x.push(vec![100.0 + i as f64]);
            y.push(1);
        }
        (x, y, vec!["f0".to_string()])
    }

    #[test]
    fn test_grid_search_order_and_progress() {
        let (x, y, names) = data();
        let search_data = SearchData {
            x: &x,
            y: &y,
            n_classes: 2,
            feature_names: &names,
            seed: 42,
        };
        let folds = stratified_folds(&y, 3).unwrap();
        let candidates: Vec<ForestParams> = [3, 4, 5]
            .into_iter()
            .map(|n| ForestParams {
                n_estimators: n,
                class_weight: ClassWeight::Balanced,
                ..ForestParams::default()
            })
            .collect();

        let progress = Mutex::new(Vec::new());
        let scores = grid_search(&search_data, &folds, &candidates, 2, |done, total| {
            progress.lock().unwrap().push((done, total));
        })
        .unwrap();

        let estimators: Vec<usize> = scores.iter().map(|s| s.params.n_estimators).collect();
        assert_eq!(estimators, vec![3, 4, 5]);
        assert!(scores.iter().all(|s| s.fold_scores.len() == 3));
        assert!(scores.iter().all(|s| s.mean_score == 1.0));

        let mut progress = progress.into_inner().unwrap();
        progress.sort_unstable();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_best_candidate_tie_goes_first() {
        let score = |n: usize, mean: f64| CandidateScore {
            params: ForestParams {
                n_estimators: n,
                ..ForestParams::default()
            },
            mean_score: mean,
            fold_scores: vec![mean],
        };
        let scores = vec![score(1, 0.5), score(2, 0.9), score(3, 0.9)];
        assert_eq!(best_candidate(&scores), Some(1));
        assert_eq!(best_candidate(&[]), None);
    }
}
