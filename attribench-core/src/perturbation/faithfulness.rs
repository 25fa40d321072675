//! Incremental masking faithfulness.
//!
//! Features are masked in order of decreasing |contribution| by replacing them with the
//! reference baseline. A faithful explanation makes the predicted-class probability fall
//! steadily as more top features are masked, so the score is the negated Pearson
//! correlation between the number of masked features and the model output.

use crate::capability::{Classifier, argmax};
use crate::error::CapabilityError;
use crate::stats;

/// Masking order: indices by descending |contribution|, lower index first on ties.
pub fn masking_order(contributions: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..contributions.len()).collect();
    order.sort_by(|&a, &b| {
        contributions[b]
            .abs()
            .total_cmp(&contributions[a].abs())
            .then(a.cmp(&b))
    });
    order
}

/// Outputs and score of one masking curve.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskingCurve {
    pub target_class: usize,
    /// Predicted-class probability after masking 0, 1, ..., m features.
    pub outputs: Vec<f64>,
    /// In [-1, 1]; 0 when the output never moves.
    pub faithfulness: f64,
}

/// Mask up to `max_masked` top features one at a time and score the resulting curve.
pub fn masking_curve(
    classifier: &dyn Classifier,
    instance: &[f64],
    contributions: &[f64],
    baselines: &[f64],
    max_masked: Option<usize>,
) -> Result<MaskingCurve, CapabilityError> {
    let n = instance.len();
    if contributions.len() != n || baselines.len() != n {
        return Err(CapabilityError::Dimension {
            expected: n,
            actual: contributions.len().min(baselines.len()),
        });
    }
    let steps = max_masked.unwrap_or(n).min(n);
    let order = masking_order(contributions);

    let mut batch = Vec::with_capacity(steps + 1);
    let mut current = instance.to_vec();
    batch.push(current.clone());
    for &idx in order.iter().take(steps) {
        current[idx] = baselines[idx];
        batch.push(current.clone());
    }

    let probs = classifier.predict_proba(&batch)?;
    if probs.len() != batch.len() {
        return Err(CapabilityError::Classifier(format!(
            "expected {} prediction rows, got {}",
            batch.len(),
            probs.len()
        )));
    }
    let target_class = argmax(&probs[0]);
    let outputs = probs
        .iter()
        .map(|row| match row.get(target_class) {
            Some(p) if p.is_finite() => Ok(*p),
            _ => Err(CapabilityError::NonFinite(format!(
                "probability for class {target_class}"
            ))),
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let masked_counts: Vec<f64> = (0..outputs.len()).map(|k| k as f64).collect();
    let faithfulness = match stats::pearson(&masked_counts, &outputs) {
        Some(r) => (-r).clamp(-1.0, 1.0),
        None => 0.0,
    };

    Ok(MaskingCurve {
        target_class,
        outputs,
        faithfulness,
    })
}
