//! Configuration for the attribench engine.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> environment -> explicit overrides. Configuration is read from
//! `~/.config/attribench/config.toml` and/or `.attribench/config.toml` in the workspace.

use crate::aggregate::AggregationMode;
use crate::error::{BenchError, Result};
use crate::quality::QualityWeights;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub agreement: AgreementConfig,
    #[serde(default)]
    pub perturbation: PerturbationConfig,
    #[serde(default)]
    pub weights: QualityWeights,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Check structural constraints across every section.
    pub fn validate(&self) -> Result<()> {
        self.aggregation.validate()?;
        self.agreement.validate()?;
        self.perturbation.validate()?;
        self.weights.validate()?;
        Ok(())
    }
}

/// Global importance aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Reduction applied across instances.
    #[serde(default)]
    pub mode: AggregationMode,
    /// Importances closer than this are treated as tied and ordered by name.
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::default(),
            tie_epsilon: default_tie_epsilon(),
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tie_epsilon >= 0.0 && self.tie_epsilon.is_finite()) {
            return Err(BenchError::config(format!(
                "aggregation.tie_epsilon must be a finite non-negative number, got {}",
                self.tie_epsilon
            )));
        }
        Ok(())
    }
}

fn default_tie_epsilon() -> f64 {
    1e-12
}

/// Pairwise method agreement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementConfig {
    /// Cutoffs for top-k overlap.
    #[serde(default = "default_top_k_values")]
    pub top_k_values: Vec<usize>,
    /// Size of each method's top list used for rank correlation.
    #[serde(default = "default_top_n")]
    pub top_n_for_correlation: usize,
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            top_k_values: default_top_k_values(),
            top_n_for_correlation: default_top_n(),
        }
    }
}

impl AgreementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k_values.is_empty() {
            return Err(BenchError::config("agreement.top_k_values must not be empty"));
        }
        if self.top_k_values.contains(&0) {
            return Err(BenchError::config("agreement.top_k_values must be positive"));
        }
        if self.top_n_for_correlation == 0 {
            return Err(BenchError::config(
                "agreement.top_n_for_correlation must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_top_k_values() -> Vec<usize> {
    vec![5, 10]
}

fn default_top_n() -> usize {
    20
}

/// Perturbation protocol for faithfulness and robustness evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationConfig {
    /// Perturbed copies per instance for robustness.
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    /// Noise scale as a fraction of each numeric feature's reference std.
    #[serde(default = "default_magnitude_fraction")]
    pub magnitude_fraction: f64,
    /// Chance that a categorical feature is resampled in one perturbed copy.
    #[serde(default = "default_categorical_resample")]
    pub categorical_resample_probability: f64,
    /// Masking steps for faithfulness (None masks every feature).
    #[serde(default)]
    pub max_masked_features: Option<usize>,
    /// Seed for all perturbation randomness.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Worker pool size (None uses the available cores).
    #[serde(default)]
    pub workers: Option<usize>,
    /// Fraction of instances allowed to fail before the evaluation is rejected.
    #[serde(default = "default_max_skip_fraction")]
    pub max_skip_fraction: f64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            repeats: default_repeats(),
            magnitude_fraction: default_magnitude_fraction(),
            categorical_resample_probability: default_categorical_resample(),
            max_masked_features: None,
            seed: default_seed(),
            workers: None,
            max_skip_fraction: default_max_skip_fraction(),
        }
    }
}

impl PerturbationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repeats == 0 {
            return Err(BenchError::config("perturbation.repeats must be at least 1"));
        }
        if !(self.magnitude_fraction > 0.0 && self.magnitude_fraction.is_finite()) {
            return Err(BenchError::config(format!(
                "perturbation.magnitude_fraction must be positive, got {}",
                self.magnitude_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.categorical_resample_probability) {
            return Err(BenchError::config(format!(
                "perturbation.categorical_resample_probability must be in [0, 1], got {}",
                self.categorical_resample_probability
            )));
        }
        if self.max_masked_features == Some(0) {
            return Err(BenchError::config(
                "perturbation.max_masked_features must be at least 1",
            ));
        }
        if self.workers == Some(0) {
            return Err(BenchError::config("perturbation.workers must be at least 1"));
        }
        if !(self.max_skip_fraction > 0.0 && self.max_skip_fraction <= 1.0) {
            return Err(BenchError::config(format!(
                "perturbation.max_skip_fraction must be in (0, 1], got {}",
                self.max_skip_fraction
            )));
        }
        Ok(())
    }

    /// Resolved worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Content hash of every setting that can change evaluation results.
    ///
    /// The worker count is excluded: results do not depend on scheduling.
    pub fn content_hash(&self) -> String {
        let normalized = Self {
            workers: None,
            ..self.clone()
        };
        let json = serde_json::to_string(&normalized).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn default_repeats() -> usize {
    10
}

fn default_magnitude_fraction() -> f64 {
    0.05
}

fn default_categorical_resample() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    42
}

fn default_max_skip_fraction() -> f64 {
    0.5
}

/// Quality score cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `ATTRIBENCH_`)
/// 3. Workspace-local config (`.attribench/config.toml`)
/// 4. User config (`~/.config/attribench/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&EngineConfig>,
) -> std::result::Result<EngineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "attribench", "attribench") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".attribench").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // ATTRIBENCH_PERTURBATION__REPEATS, ATTRIBENCH_WEIGHTS__FAITHFULNESS, etc.
    figment = figment.merge(Env::prefixed("ATTRIBENCH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration and reject structurally invalid settings.
pub fn load_validated(workspace: Option<&Path>) -> Result<EngineConfig> {
    let config = load_config(workspace, None).map_err(|e| BenchError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
