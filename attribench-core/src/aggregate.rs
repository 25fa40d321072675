//! Global feature importance from many per-instance attributions.

use crate::config::AggregationConfig;
use crate::error::Result;
use crate::sample::{AttributionSample, validate_schema};
use serde::{Deserialize, Serialize};

/// Reduction applied across instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Mean of absolute contributions. Sign cancellation is not meaningful for importance.
    #[default]
    MeanAbsolute,
    /// Mean of signed contributions, for population-level directionality.
    MeanSigned,
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMode::MeanAbsolute => write!(f, "mean_absolute"),
            AggregationMode::MeanSigned => write!(f, "mean_signed"),
        }
    }
}

/// One row of a global ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub feature: String,
    pub importance: f64,
    /// 1-based position.
    pub rank: usize,
}

/// A method's global importance ranking. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalImportance {
    /// Method identifier the ranking was computed for.
    pub method: String,
    /// Ordered by descending importance, ties by ascending feature name.
    pub ranked_features: Vec<RankedFeature>,
    pub aggregation: AggregationMode,
    pub num_samples: usize,
}

impl GlobalImportance {
    pub fn len(&self) -> usize {
        self.ranked_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked_features.is_empty()
    }

    /// Feature names of the first `k` entries (fewer if the ranking is shorter).
    pub fn top_k(&self, k: usize) -> Vec<&str> {
        self.ranked_features
            .iter()
            .take(k)
            .map(|r| r.feature.as_str())
            .collect()
    }

    pub fn rank_of(&self, feature: &str) -> Option<usize> {
        self.ranked_features
            .iter()
            .find(|r| r.feature == feature)
            .map(|r| r.rank)
    }

    pub fn importance_of(&self, feature: &str) -> Option<f64> {
        self.ranked_features
            .iter()
            .find(|r| r.feature == feature)
            .map(|r| r.importance)
    }
}

/// Reduces per-instance attributions from one method into a ranked global list.
#[derive(Debug, Clone, Default)]
pub struct GlobalAggregator {
    config: AggregationConfig,
}

impl GlobalAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn with_mode(mode: AggregationMode) -> Self {
        Self {
            config: AggregationConfig {
                mode,
                ..AggregationConfig::default()
            },
        }
    }

    pub fn mode(&self) -> AggregationMode {
        self.config.mode
    }

    /// Aggregate `samples` with the configured mode.
    ///
    /// Fails with `SchemaMismatch` when samples disagree on their feature set and with
    /// `EmptyInput` when no samples are given.
    pub fn aggregate(
        &self,
        method: impl Into<String>,
        samples: &[AttributionSample],
    ) -> Result<GlobalImportance> {
        self.aggregate_with_mode(method, samples, self.config.mode)
    }

    pub fn aggregate_with_mode(
        &self,
        method: impl Into<String>,
        samples: &[AttributionSample],
        mode: AggregationMode,
    ) -> Result<GlobalImportance> {
        let features = validate_schema(samples)?;
        let n = samples.len() as f64;

        let scored: Vec<(String, f64)> = features
            .into_iter()
            .map(|feature| {
                let total: f64 = samples
                    .iter()
                    .map(|s| {
                        let c = s.feature_contributions[&feature];
                        match mode {
                            AggregationMode::MeanAbsolute => c.abs(),
                            AggregationMode::MeanSigned => c,
                        }
                    })
                    .sum();
                (feature, total / n)
            })
            .collect();

        let ranked_features = rank_scores(scored, self.config.tie_epsilon)
            .into_iter()
            .enumerate()
            .map(|(i, (feature, importance))| RankedFeature {
                feature,
                importance,
                rank: i + 1,
            })
            .collect();

        let method = method.into();
        tracing::debug!(method = %method, mode = %mode, samples = samples.len(), "Aggregated global importance");

        Ok(GlobalImportance {
            method,
            ranked_features,
            aggregation: mode,
            num_samples: samples.len(),
        })
    }
}

/// Order by descending score; scores within `epsilon` of the first score of their group
/// form one tie group, ordered by ascending name.
fn rank_scores(mut scored: Vec<(String, f64)>, epsilon: f64) -> Vec<(String, f64)> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut start = 0;
    while start < scored.len() {
        let mut end = start + 1;
        while end < scored.len() && (scored[start].1 - scored[end].1).abs() <= epsilon {
            end += 1;
        }
        scored[start..end].sort_by(|a, b| a.0.cmp(&b.0));
        start = end;
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;

    fn sample(id: &str, pairs: &[(&str, f64)]) -> AttributionSample {
        AttributionSample::new(id, pairs.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn test_tie_groups_do_not_chain() {
        let scored = vec![
            ("a".to_string(), 0.0),
            ("m".to_string(), 6e-13),
            ("z".to_string(), 1.2e-12),
        ];
        let names: Vec<String> = rank_scores(scored, 1e-12)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["m", "z", "a"]);
    }

    #[test]
    fn test_mean_absolute_ranking() {
        let samples = vec![
            sample("0", &[("a", 0.5), ("b", -0.3), ("c", 0.1), ("d", 0.0)]),
            sample("1", &[("a", -0.5), ("b", 0.3), ("c", 0.1), ("d", 0.0)]),
        ];
        let global = GlobalAggregator::default().aggregate("shap", &samples).unwrap();
        assert_eq!(global.top_k(4), vec!["a", "b", "c", "d"]);
        assert_eq!(global.num_samples, 2);
        assert_eq!(global.aggregation, AggregationMode::MeanAbsolute);
        assert!((global.importance_of("a").unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(global.rank_of("d"), Some(4));
    }

    #[test]
    fn test_mean_signed_cancels() {
        let samples = vec![
            sample("0", &[("a", 0.5), ("b", 0.2)]),
            sample("1", &[("a", -0.5), ("b", 0.2)]),
        ];
        let global = GlobalAggregator::with_mode(AggregationMode::MeanSigned)
            .aggregate("lime", &samples)
            .unwrap();
        assert_eq!(global.top_k(2), vec!["b", "a"]);
        assert_eq!(global.importance_of("a"), Some(0.0));
    }

    #[test]
    fn test_ties_break_by_name() {
        let samples = vec![sample("0", &[("zeta", 0.4), ("alpha", 0.4), ("mid", 0.4)])];
        let global = GlobalAggregator::default().aggregate("m", &samples).unwrap();
        assert_eq!(global.top_k(3), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_ties_within_epsilon() {
        // 0.1 + 0.2 and 0.3 differ by one ulp
        let samples = vec![sample("0", &[("b", 0.1 + 0.2), ("a", 0.3)])];
        let global = GlobalAggregator::default().aggregate("m", &samples).unwrap();
        assert_eq!(global.top_k(2), vec!["a", "b"]);
    }

    #[test]
    fn test_schema_mismatch() {
        let samples = vec![sample("0", &[("a", 1.0)]), sample("1", &[("b", 1.0)])];
        assert!(matches!(
            GlobalAggregator::default().aggregate("m", &samples),
            Err(BenchError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_empty_samples() {
        assert!(matches!(
            GlobalAggregator::default().aggregate("m", &[]),
            Err(BenchError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_mode_serde() {
        assert_eq!(
            serde_json::to_string(&AggregationMode::MeanAbsolute).unwrap(),
            "\"mean_absolute\""
        );
        assert_eq!(AggregationMode::MeanSigned.to_string(), "mean_signed");
    }
}
