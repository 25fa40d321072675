//! Concentration of an attribution vector.

use crate::stats;
use serde::{Deserialize, Serialize};

/// Share of total |attribution| used to count effective features.
pub const EFFECTIVE_MASS: f64 = 0.8;

/// Complexity of one instance's attribution plus reported diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    /// `1 - H(p) / ln(n)` over `p = |c| / sum|c|`: 1 for one dominant feature, 0 for uniform.
    pub complexity: f64,
    pub gini: f64,
    /// Features needed to cover [`EFFECTIVE_MASS`] of the attribution.
    pub effective_features: usize,
}

/// `None` when every contribution is zero (no distribution to measure).
pub fn complexity(contributions: &[f64]) -> Option<ComplexityReport> {
    let distribution = stats::abs_distribution(contributions)?;
    let n = distribution.len();
    let complexity = if n <= 1 {
        1.0
    } else {
        let entropy = stats::shannon_entropy(&distribution);
        (1.0 - entropy / (n as f64).ln()).clamp(0.0, 1.0)
    };
    Some(ComplexityReport {
        complexity,
        gini: stats::gini(&distribution),
        effective_features: stats::effective_count(&distribution, EFFECTIVE_MASS),
    })
}
