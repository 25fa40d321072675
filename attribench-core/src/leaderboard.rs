//! Ranking of (model, method) pairs by composite explanation quality.

use crate::quality::QualityScore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub model: String,
    pub method: String,
    pub composite: f64,
    pub faithfulness: f64,
    pub robustness: f64,
    pub complexity: f64,
    /// Predictive performance of the model (e.g. AUC), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Rank scores by composite descending; ties go to model name, then method name.
    pub fn from_scores<'a, I>(scores: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a QualityScore)>,
    {
        Self::build(scores, &BTreeMap::new())
    }

    /// Like [`from_scores`](Self::from_scores), attaching a performance figure per model.
    pub fn with_performance<'a, I>(scores: I, performance: &BTreeMap<String, f64>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a QualityScore)>,
    {
        Self::build(scores, performance)
    }

    fn build<'a, I>(scores: I, performance: &BTreeMap<String, f64>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a QualityScore)>,
    {
        let mut entries: Vec<LeaderboardEntry> = scores
            .into_iter()
            .map(|(model, score)| LeaderboardEntry {
                rank: 0,
                model: model.to_string(),
                method: score.method.clone(),
                composite: score.composite,
                faithfulness: score.faithfulness,
                robustness: score.robustness,
                complexity: score.complexity,
                performance: performance.get(model).copied(),
            })
            .collect();

        entries.sort_by(|a, b| {
            b.composite
                .total_cmp(&a.composite)
                .then_with(|| a.model.cmp(&b.model))
                .then_with(|| a.method.cmp(&b.method))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    /// Best-ranked entry for one model.
    pub fn best_for_model(&self, model: &str) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.model == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityWeights;
    use pretty_assertions::assert_eq;

    fn score(method: &str, composite: f64) -> QualityScore {
        QualityScore {
            method: method.into(),
            model_fingerprint: "fp".into(),
            faithfulness: composite,
            raw_faithfulness: composite * 2.0 - 1.0,
            robustness: composite,
            complexity: composite,
            composite,
            weights: QualityWeights::default(),
            evaluated_instances: 5,
            skipped_count: 0,
            mean_gini: 0.0,
            mean_effective_features: 1.0,
        }
    }

    #[test]
    fn test_ranked_by_composite() {
        let shap = score("shap", 0.8);
        let lime = score("lime", 0.6);
        let board = Leaderboard::from_scores([("xgb", &lime), ("xgb", &shap)]);
        let methods: Vec<&str> = board.entries.iter().map(|e| e.method.as_str()).collect();
        assert_eq!(methods, vec!["shap", "lime"]);
        assert_eq!(board.entries[0].rank, 1);
        assert_eq!(board.entries[1].rank, 2);
    }

    #[test]
    fn test_ties_broken_by_model_then_method() {
        let a = score("shap", 0.7);
        let b = score("lime", 0.7);
        let board = Leaderboard::from_scores([("rf", &a), ("lr", &a), ("lr", &b)]);
        let order: Vec<(&str, &str)> = board
            .entries
            .iter()
            .map(|e| (e.model.as_str(), e.method.as_str()))
            .collect();
        assert_eq!(order, vec![("lr", "lime"), ("lr", "shap"), ("rf", "shap")]);
    }

    #[test]
    fn test_performance_attached_per_model() {
        let s = score("shap", 0.5);
        let perf = BTreeMap::from([("xgb".to_string(), 0.91)]);
        let board = Leaderboard::with_performance([("xgb", &s), ("lr", &s)], &perf);
        assert_eq!(board.best_for_model("xgb").unwrap().performance, Some(0.91));
        assert_eq!(board.best_for_model("lr").unwrap().performance, None);
    }
}
