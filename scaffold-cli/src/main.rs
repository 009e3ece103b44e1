//! Scaffold CLI: train adversarial explainability models on CSV data.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Scaffold: classifiers that hide their behavior from post-hoc explainers
#[derive(Parser, Debug)]
#[command(name = "scaffold", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Train a detector on a CSV dataset and evaluate the resulting router
    Train(TrainArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyKind {
    /// Gaussian jitter around real rows (LIME-style probes)
    Gaussian,
    /// Features replaced from a k-means background (SHAP-style probes)
    Substitution,
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// CSV file with a header row
    #[arg(short, long)]
    data: PathBuf,

    /// Name of the ground-truth label column
    #[arg(short, long)]
    label: String,

    /// Probe family the detector should recognize
    #[arg(short, long, value_enum, default_value = "gaussian")]
    strategy: StrategyKind,

    /// Column the obscured model thresholds
    #[arg(long)]
    obscure_feature: String,

    /// Threshold for the obscured model (class 1 above it)
    #[arg(long, default_value_t = 0.0)]
    obscure_threshold: f64,

    /// Column the display model thresholds
    #[arg(long)]
    display_feature: String,

    /// Threshold for the display model (class 1 above it)
    #[arg(long, default_value_t = 0.0)]
    display_threshold: f64,

    /// Categorical columns, comma separated
    #[arg(long, value_delimiter = ',')]
    categorical: Vec<String>,

    /// Columns always given to the detector, comma separated
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// Columns never perturbed, comma separated
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Root directory for cached synthetic datasets
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Always regenerate synthetic data and never write the cache
    #[arg(long)]
    no_cache: bool,

    /// Random seed for the whole run
    #[arg(long)]
    seed: Option<u64>,

    /// Print the training summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination file
        #[arg(default_value = "scaffold.toml")]
        path: PathBuf,
    },
    /// Show the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
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
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "scaffold", "scaffold")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "scaffold.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, cli.config.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_arguments() {
        let cli = Cli::try_parse_from([
            "scaffold",
            "train",
            "--data",
            "compas.csv",
            "--label",
            "two_year_recid",
            "--strategy",
            "substitution",
            "--obscure-feature",
            "race",
            "--display-feature",
            "unrelated",
            "--categorical",
            "race,sex",
            "--no-cache",
            "--seed",
            "7",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.strategy, StrategyKind::Substitution);
        assert_eq!(args.categorical, vec!["race", "sex"]);
        assert!(args.include.is_empty());
        assert!(args.no_cache);
        assert_eq!(args.seed, Some(7));
    }

    #[test]
    fn test_train_requires_model_features() {
        let parsed = Cli::try_parse_from(["scaffold", "train", "--data", "x.csv", "--label", "y"]);
        assert!(parsed.is_err());
    }
}
