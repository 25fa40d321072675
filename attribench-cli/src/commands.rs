//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::MethodArg;
use crate::ModeArg;
use crate::ModelInputs;
use crate::WeightArgs;
use anyhow::Context;
use attribench_core::config::load_config;
use attribench_core::{
    AggregationMode, AgreementAnalyzer, AttributionSample, Attributor, Benchmark, EngineConfig,
    EvaluationInstance, GlobalAggregator, GlobalImportance, LinearAttributor, LogisticClassifier,
    ModelUnderTest, OcclusionAttributor, PerturbationEvaluator, PerturbationMetrics, QualityCache,
    QualityScorer, QualityWeights, ReferenceDataset, ReferenceStats, interpret,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Aggregate {
            samples,
            method,
            mode,
            output,
        } => handle_aggregate(&samples, &method, mode, output.as_deref(), workspace),
        Commands::Compare {
            a,
            b,
            top_k,
            top_n,
            output,
        } => handle_compare(&a, &b, top_k, top_n, output.as_deref(), workspace),
        Commands::Score {
            metrics,
            weights,
            output,
        } => handle_score(&metrics, &weights, output.as_deref(), workspace),
        Commands::Evaluate {
            inputs,
            method,
            output,
        } => handle_evaluate(&inputs, method, output.as_deref(), workspace).await,
        Commands::Benchmark {
            inputs,
            methods,
            name,
            weights,
            output,
        } => {
            handle_benchmark(
                &inputs,
                &methods,
                name.as_deref(),
                &weights,
                output.as_deref(),
                workspace,
            )
            .await
        }
        Commands::Interpret {
            samples,
            instance,
            top_n,
        } => handle_interpret(&samples, instance.as_deref(), top_n),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn engine_config(workspace: &Path) -> anyhow::Result<EngineConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn weights_override(args: &WeightArgs, base: &QualityWeights) -> QualityWeights {
    match (args.w_faithfulness, args.w_robustness, args.w_complexity) {
        (Some(f), Some(r), Some(c)) => QualityWeights {
            faithfulness: f,
            robustness: r,
            complexity: c,
            tolerance: base.tolerance,
        },
        _ => base.clone(),
    }
}

/// Cancellation token tripped by Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight instances");
            child.cancel();
        }
    });
    token
}

struct LoadedInputs {
    model: Arc<LogisticClassifier>,
    reference: Arc<ReferenceStats>,
    instances: Vec<EvaluationInstance>,
}

fn load_inputs(inputs: &ModelInputs) -> anyhow::Result<LoadedInputs> {
    let model: LogisticClassifier = read_json(&inputs.model)?;
    let dataset: ReferenceDataset = read_json(&inputs.reference)?;
    let instances: Vec<EvaluationInstance> = read_json(&inputs.instances)?;
    let reference = ReferenceStats::from_dataset(&dataset)?;
    if model.feature_names != reference.feature_names() {
        anyhow::bail!(
            "Model features {:?} do not match reference features {:?}",
            model.feature_names,
            reference.feature_names()
        );
    }
    Ok(LoadedInputs {
        model: Arc::new(model),
        reference: Arc::new(reference),
        instances,
    })
}

fn build_attributor(
    method: MethodArg,
    model: &Arc<LogisticClassifier>,
    reference: &ReferenceStats,
) -> anyhow::Result<Arc<dyn Attributor>> {
    let attributor: Arc<dyn Attributor> = match method {
        MethodArg::Linear => Arc::new(LinearAttributor::from_logistic(model, reference)?),
        MethodArg::Occlusion => Arc::new(OcclusionAttributor::new(model.clone(), reference)),
    };
    Ok(attributor)
}

fn apply_input_overrides(config: &mut EngineConfig, inputs: &ModelInputs) {
    if let Some(seed) = inputs.seed {
        config.perturbation.seed = seed;
    }
    if inputs.workers.is_some() {
        config.perturbation.workers = inputs.workers;
    }
}

fn handle_aggregate(
    samples_path: &Path,
    method: &str,
    mode: Option<ModeArg>,
    output: Option<&Path>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = engine_config(workspace)?;
    let samples: Vec<AttributionSample> = read_json(samples_path)?;
    let aggregator = GlobalAggregator::new(config.aggregation);
    let ranking = match mode {
        Some(ModeArg::MeanAbsolute) => {
            aggregator.aggregate_with_mode(method, &samples, AggregationMode::MeanAbsolute)?
        }
        Some(ModeArg::MeanSigned) => {
            aggregator.aggregate_with_mode(method, &samples, AggregationMode::MeanSigned)?
        }
        None => aggregator.aggregate(method, &samples)?,
    };
    write_json(&ranking, output)
}

fn handle_compare(
    a: &Path,
    b: &Path,
    top_k: Option<Vec<usize>>,
    top_n: Option<usize>,
    output: Option<&Path>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let mut config = engine_config(workspace)?;
    if let Some(top_k) = top_k {
        config.agreement.top_k_values = top_k;
    }
    if let Some(top_n) = top_n {
        config.agreement.top_n_for_correlation = top_n;
    }
    config.agreement.validate()?;

    let ranking_a: GlobalImportance = read_json(a)?;
    let ranking_b: GlobalImportance = read_json(b)?;
    let result = AgreementAnalyzer::new(config.agreement).compare(&ranking_a, &ranking_b)?;
    write_json(&result, output)
}

fn handle_score(
    metrics_path: &Path,
    weights: &WeightArgs,
    output: Option<&Path>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = engine_config(workspace)?;
    let metrics: PerturbationMetrics = read_json(metrics_path)?;
    let scorer = QualityScorer::new(weights_override(weights, &config.weights))?;
    write_json(&scorer.score(&metrics)?, output)
}

async fn handle_evaluate(
    inputs: &ModelInputs,
    method: MethodArg,
    output: Option<&Path>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let mut config = engine_config(workspace)?;
    apply_input_overrides(&mut config, inputs);
    let loaded = load_inputs(inputs)?;
    let attributor = build_attributor(method, &loaded.model, &loaded.reference)?;

    let evaluator = PerturbationEvaluator::new(loaded.reference.clone(), config.perturbation)?;
    let cancel = interrupt_token();
    let metrics = evaluator
        .evaluate(loaded.model, attributor, &loaded.instances, &cancel)
        .await?;
    write_json(&metrics, output)
}

async fn handle_benchmark(
    inputs: &ModelInputs,
    methods: &[MethodArg],
    name: Option<&str>,
    weights: &WeightArgs,
    output: Option<&Path>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let mut config = engine_config(workspace)?;
    apply_input_overrides(&mut config, inputs);
    config.weights = weights_override(weights, &config.weights);
    let loaded = load_inputs(inputs)?;

    let mut attributors = Vec::new();
    for method in methods {
        if !attributors
            .iter()
            .any(|a: &Arc<dyn Attributor>| a.method() == method_id(*method))
        {
            attributors.push(build_attributor(*method, &loaded.model, &loaded.reference)?);
        }
    }

    let model_name = name
        .map(str::to_string)
        .or_else(|| {
            inputs
                .model
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "model".to_string());
    let model = ModelUnderTest::new(model_name, loaded.model.clone());

    let bench = Benchmark::new(config)?;
    let cache = QualityCache::new();
    let cancel = interrupt_token();
    let report = bench
        .run(
            &model,
            loaded.reference,
            &attributors,
            &loaded.instances,
            Some(&cache),
            &cancel,
        )
        .await?;

    if output.is_some() {
        for entry in &report.leaderboard.entries {
            println!(
                "{:>2}. {:<12} composite {:.3} (faithfulness {:.3}, robustness {:.3}, complexity {:.3})",
                entry.rank,
                entry.method,
                entry.composite,
                entry.faithfulness,
                entry.robustness,
                entry.complexity
            );
        }
    }
    write_json(&report, output)
}

fn method_id(method: MethodArg) -> &'static str {
    match method {
        MethodArg::Linear => "linear",
        MethodArg::Occlusion => "occlusion",
    }
}

fn handle_interpret(
    samples_path: &Path,
    instance: Option<&str>,
    top_n: usize,
) -> anyhow::Result<()> {
    let samples: Vec<AttributionSample> = read_json(samples_path)?;
    let selected: Vec<&AttributionSample> = match instance {
        Some(id) => samples.iter().filter(|s| s.instance_id == id).collect(),
        None => samples.iter().collect(),
    };
    if selected.is_empty() {
        anyhow::bail!("No matching attribution samples in {}", samples_path.display());
    }
    for sample in selected {
        let reading = interpret(sample, top_n);
        println!("[{}]\n{}\n", reading.instance_id, reading.text);
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".attribench");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&EngineConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = engine_config(workspace)?;
            config.validate()?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
