//! Error types for the attribench engine.
//!
//! Structural and configuration problems surface immediately as [`BenchError`].
//! Per-instance failures during perturbation evaluation are recorded as
//! [`InstanceFailure`] values and only escalate once the skip threshold is crossed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Incompatible feature space: rankings '{method_a}' and '{method_b}' share no features")]
    IncompatibleFeatureSpace { method_a: String, method_b: String },

    #[error(
        "Insufficient valid samples: {skipped} of {total} instances failed during {stage} (limit {limit})"
    )]
    InsufficientValidSamples {
        stage: String,
        skipped: usize,
        total: usize,
        limit: usize,
    },

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Evaluation cancelled after {completed} of {total} instances")]
    Cancelled { completed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl BenchError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn empty(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors raised by an external classifier or attributor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("attributor failed: {0}")]
    Attributor(String),

    #[error("non-finite output: {0}")]
    NonFinite(String),

    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

/// Stage of perturbation evaluation in which an instance failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Prediction,
    Attribution,
    Faithfulness,
    Robustness,
    Complexity,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Prediction => write!(f, "prediction"),
            FailureStage::Attribution => write!(f, "attribution"),
            FailureStage::Faithfulness => write!(f, "faithfulness"),
            FailureStage::Robustness => write!(f, "robustness"),
            FailureStage::Complexity => write!(f, "complexity"),
        }
    }
}

/// A recorded, non-fatal attributor or classifier failure for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceFailure {
    pub instance_id: String,
    pub stage: FailureStage,
    pub cause: String,
}

/// A type alias for results using [`BenchError`].
pub type Result<T> = std::result::Result<T, BenchError>;
