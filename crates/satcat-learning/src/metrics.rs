//! Classification metrics.
//!
//! Per-class scores use `zero_division = 0`: a class never predicted has
//! precision 0, and a class never present has recall 0.

use std::collections::BTreeSet;

use crate::types::ClassReport;

/// Fraction of predictions equal to the truth.
#[must_use]
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// `matrix[t][p]` counts samples of class `t` predicted as `p`.
#[must_use]
pub fn confusion_matrix(truth: &[usize], predicted: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0; n_classes]; n_classes];
    for (&t, &p) in truth.iter().zip(predicted) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Precision, recall, F1 and support of one class.
#[must_use]
pub fn class_scores(truth: &[usize], predicted: &[usize], class: usize) -> (f64, f64, f64, usize) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    (precision, recall, f1, tp + fn_)
}

/// Unweighted mean F1 over every class that occurs in either slice.
#[must_use]
pub fn macro_f1(truth: &[usize], predicted: &[usize]) -> f64 {
    let classes: BTreeSet<usize> = truth.iter().chain(predicted).copied().collect();
    if classes.is_empty() {
        return 0.0;
    }
    let total: f64 = classes
        .iter()
        .map(|&c| class_scores(truth, predicted, c).2)
        .sum();
    total / classes.len() as f64
}

/// One report per class index in `0..labels.len()`.
#[must_use]
pub fn per_class_report(truth: &[usize], predicted: &[usize], labels: &[String]) -> Vec<ClassReport> {
    labels
        .iter()
        .enumerate()
        .map(|(class, label)| {
            let (precision, recall, f1, support) = class_scores(truth, predicted, class);
            ClassReport {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect()
}
