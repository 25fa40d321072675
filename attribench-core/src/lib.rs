//! # attribench-core: Explanation Aggregation, Agreement & Quality Evaluation
//!
//! This crate turns per-instance feature attributions into global importance rankings,
//! measures how far two attribution methods agree, and scores each method's explanation
//! quality on a trained classifier.
//!
//! ## Pipeline
//!
//! 1. **Aggregation**: [`GlobalAggregator`] reduces attribution samples to a ranked list
//! 2. **Agreement**: [`AgreementAnalyzer`] compares rankings by top-k overlap and rank correlation
//! 3. **Evaluation**: [`PerturbationEvaluator`] measures faithfulness, robustness and complexity
//! 4. **Scoring**: [`QualityScorer`] folds those into one composite score per method
//!
//! [`Benchmark`] runs the whole pipeline for a set of methods on one model.

// Foundation
pub mod config;
pub mod error;
pub mod sample;
pub mod stats;

// Inputs
pub mod capability;
pub mod reference;

// Engine
pub mod aggregate;
pub mod agreement;
pub mod perturbation;
pub mod quality;

// Reporting
pub mod benchmark;
pub mod cache;
pub mod interpretation;
pub mod leaderboard;

// Re-exports
pub use aggregate::{AggregationMode, GlobalAggregator, GlobalImportance, RankedFeature};
pub use agreement::{AgreementAnalyzer, AgreementResult, RankCorrelation};
pub use benchmark::{Benchmark, BenchmarkReport, ModelUnderTest};
pub use cache::{CacheKey, QualityCache};
pub use capability::{
    Attribution, Attributor, Classifier, LinearAttributor, LogisticClassifier,
    OcclusionAttributor,
};
pub use config::EngineConfig;
pub use error::{BenchError, CapabilityError, FailureStage, InstanceFailure, Result};
pub use interpretation::{Interpretation, interpret};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use perturbation::{EvaluationInstance, PerturbationEvaluator, PerturbationMetrics};
pub use quality::{QualityScore, QualityScorer, QualityWeights};
pub use reference::{FeatureKind, ReferenceDataset, ReferenceStats};
pub use sample::AttributionSample;
