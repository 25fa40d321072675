//! attribench CLI: aggregate, compare and score feature attributions from JSON files.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// attribench: explanation aggregation, agreement and quality evaluation
#[derive(Parser, Debug)]
#[command(name = "attribench", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .attribench/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Aggregation reduction.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    MeanAbsolute,
    MeanSigned,
}

/// Built-in attribution method.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum MethodArg {
    /// Exact linear-logit attributions
    Linear,
    /// Single-feature occlusion against the reference baseline
    Occlusion,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Aggregate attribution samples into a global importance ranking
    Aggregate {
        /// JSON array of attribution samples
        samples: PathBuf,
        /// Method identifier recorded in the ranking
        #[arg(short, long, default_value = "method")]
        method: String,
        /// Override the configured aggregation mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare two global importance rankings
    Compare {
        /// First ranking (JSON)
        a: PathBuf,
        /// Second ranking (JSON)
        b: PathBuf,
        /// Top-k cutoffs, comma separated
        #[arg(long, value_delimiter = ',')]
        top_k: Option<Vec<usize>>,
        /// Features per ranking used for rank correlation
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score raw perturbation metrics into a composite quality score
    Score {
        /// Perturbation metrics (JSON)
        metrics: PathBuf,
        #[command(flatten)]
        weights: WeightArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run perturbation evaluation for one built-in method
    Evaluate {
        #[command(flatten)]
        inputs: ModelInputs,
        /// Attribution method to evaluate
        #[arg(long, value_enum, default_value = "linear")]
        method: MethodArg,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Aggregate, compare and score several built-in methods on one model
    Benchmark {
        #[command(flatten)]
        inputs: ModelInputs,
        /// Methods to benchmark, comma separated
        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_values = ["linear", "occlusion"]
        )]
        methods: Vec<MethodArg>,
        /// Name the model is reported under
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        weights: WeightArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Describe the largest contributions of attribution samples in plain language
    Interpret {
        /// JSON array of attribution samples
        samples: PathBuf,
        /// Only this instance
        #[arg(long)]
        instance: Option<String>,
        /// Number of features described
        #[arg(short = 'n', long, default_value = "5")]
        top_n: usize,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Model, reference data and evaluation instances.
#[derive(clap::Args, Debug)]
struct ModelInputs {
    /// Logistic model (JSON: feature_names, weights, intercept)
    #[arg(long)]
    model: PathBuf,
    /// Reference dataset (JSON: feature_names, kinds, rows)
    #[arg(long)]
    reference: PathBuf,
    /// Evaluation instances (JSON array of {instance_id, values})
    #[arg(long)]
    instances: PathBuf,
    /// Override the perturbation seed
    #[arg(long)]
    seed: Option<u64>,
    /// Override the worker pool size
    #[arg(long)]
    workers: Option<usize>,
}

/// Composite weight overrides; all three must be given together.
#[derive(clap::Args, Debug, Default)]
struct WeightArgs {
    #[arg(long, requires_all = ["w_robustness", "w_complexity"])]
    w_faithfulness: Option<f64>,
    #[arg(long, requires_all = ["w_faithfulness", "w_complexity"])]
    w_robustness: Option<f64>,
    #[arg(long, requires_all = ["w_faithfulness", "w_robustness"])]
    w_complexity: Option<f64>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "attribench", "attribench")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "attribench.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
