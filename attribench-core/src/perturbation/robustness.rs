//! Stability of attributions under small random input perturbations.

use crate::config::PerturbationConfig;
use crate::reference::{FeatureKind, ReferenceStats};
use crate::stats;
use rand::Rng;
use rand_distr::StandardNormal;

/// A perturbed copy of `instance`.
///
/// Numeric features get Gaussian noise with std `magnitude_fraction * reference std`;
/// categorical features are resampled from their observed distribution with
/// probability `categorical_resample_probability` (always, by default).
pub fn perturb<R: Rng + ?Sized>(
    instance: &[f64],
    reference: &ReferenceStats,
    config: &PerturbationConfig,
    rng: &mut R,
) -> Vec<f64> {
    instance
        .iter()
        .zip(&reference.features)
        .map(|(value, feature)| match (feature.kind, &feature.distribution) {
            (FeatureKind::Categorical, Some(dist)) => {
                if rng.gen_bool(config.categorical_resample_probability) {
                    dist.sample(rng)
                } else {
                    *value
                }
            }
            _ => {
                let z: f64 = rng.sample(StandardNormal);
                value + z * config.magnitude_fraction * feature.std
            }
        })
        .collect()
}

/// `1 / (1 + mean L2 distance)` between the unit-normalized original attribution and
/// each unit-normalized perturbed attribution.
pub fn robustness_score(original: &[f64], perturbed: &[Vec<f64>]) -> Option<f64> {
    if perturbed.is_empty() {
        return None;
    }
    let base = stats::unit_normalize(original);
    let total: f64 = perturbed
        .iter()
        .map(|p| stats::l2_distance(&base, &stats::unit_normalize(p)))
        .sum();
    Some(1.0 / (1.0 + total / perturbed.len() as f64))
}
