use std::collections::{BTreeMap, BTreeSet};

use crate::datasets::tlink::Labels;

/// Precision, recall, F1 and support of a single class
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassScores {
    /// Fraction of predictions of the class that were correct
    pub precision: f64,
    /// Fraction of the class that was predicted
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Number of true examples of the class
    pub support: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Scores for one class id
pub fn class_scores(y_true: &[usize], y_pred: &[usize], class: usize) -> ClassScores {
    let mut tp = 0;
    let mut predicted = 0;
    let mut support = 0;

    for (&t, &p) in y_true.iter().zip(y_pred) {
        if p == class {
            predicted += 1;
        }
        if t == class {
            support += 1;
            if p == class {
                tp += 1;
            }
        }
    }

    let precision = ratio(tp, predicted);
    let recall = ratio(tp, support);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    ClassScores {
        precision,
        recall,
        f1,
        support,
    }
}

/// Weighted average of precision, recall and F1 across classes
fn average(scores: &[ClassScores], weight: impl Fn(&ClassScores) -> f64) -> (f64, f64, f64) {
    let total: f64 = scores.iter().map(&weight).sum();
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let avg = |f: fn(&ClassScores) -> f64| {
        scores.iter().map(|s| f(s) * weight(s)).sum::<f64>() / total
    };

    (avg(|s| s.precision), avg(|s| s.recall), avg(|s| s.f1))
}

/// Accuracy and macro-averaged precision, recall and F1
///
/// The macro average runs over every class seen in either the truth or the predictions.
pub fn compute_metrics(y_true: &[usize], y_pred: &[usize]) -> BTreeMap<String, f64> {
    debug_assert_eq!(y_true.len(), y_pred.len(), "truth and predictions differ in length");

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

    let classes: BTreeSet<usize> = y_true.iter().chain(y_pred).copied().collect();
    let scores: Vec<ClassScores> = classes
        .iter()
        .map(|&class| class_scores(y_true, y_pred, class))
        .collect();

    let (precision, recall, f1) = average(&scores, |_| 1.0);

    BTreeMap::from([
        ("acc".to_string(), ratio(correct, y_true.len())),
        ("precision".to_string(), precision),
        ("recall".to_string(), recall),
        ("f1".to_string(), f1),
    ])
}

/// A per-class report with macro and weighted averages over every known label
pub fn classification_report(y_true: &[usize], y_pred: &[usize], labels: &Labels) -> String {
    let width = labels
        .iter()
        .map(|label| label.chars().count())
        .chain(["weighted avg".len()])
        .max()
        .unwrap_or_default();

    let mut report = format!(
        "{:>width$} {:>9} {:>9} {:>9} {:>9}\n\n",
        "", "precision", "recall", "f1-score", "support"
    );

    let scores: Vec<ClassScores> = (0..labels.len())
        .map(|class| class_scores(y_true, y_pred, class))
        .collect();

    for (label, s) in labels.iter().zip(&scores) {
        report.push_str(&format!(
            "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}\n",
            label, s.precision, s.recall, s.f1, s.support
        ));
    }

    let total: usize = scores.iter().map(|s| s.support).sum();

    report.push('\n');
    for (name, weight) in [("macro avg", false), ("weighted avg", true)] {
        let (precision, recall, f1) = average(&scores, |s| {
            if weight {
                s.support as f64
            } else {
                1.0
            }
        });

        report.push_str(&format!(
            "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}\n",
            name, precision, recall, f1, total
        ));
    }

    report
}
