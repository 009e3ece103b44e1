//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, StrategyKind, TrainArgs};
use anyhow::{Context, bail};
use ndarray::Axis;
use scaffold_core::config::load_config;
use scaffold_core::data::frame::cell_to_f64;
use scaffold_core::data::split::shuffled_partition;
use scaffold_core::data::{TrainingInput, csv};
use scaffold_core::models::FeatureThresholdModel;
use scaffold_core::{
    AdversarialRouter, BackgroundSubstitution, DetectorTrainer, FeatureSpace, FileCache,
    GaussianNeighborhood, ScaffoldConfig, TrainingReport,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, config_file: Option<&Path>) -> anyhow::Result<()> {
    match command {
        Commands::Train(args) => handle_train(args, config_file),
        Commands::Config { action } => handle_config(action, config_file),
    }
}

fn load(config_file: Option<&Path>) -> anyhow::Result<ScaffoldConfig> {
    load_config(config_file).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn handle_config(action: ConfigAction, config_file: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { path } => {
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            let toml_str = toml::to_string_pretty(&ScaffoldConfig::default())?;
            std::fs::write(&path, &toml_str)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(config_file)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// What `train` prints once the router is ready.
#[derive(Debug, Serialize)]
struct TrainSummary {
    detector: TrainingReport,
    /// Router agreement with the obscured model on held-out real rows.
    fidelity: f64,
    /// Share of held-out real rows routed to the display model.
    probe_rate: f64,
    /// Router accuracy against the ground-truth label on held-out rows.
    accuracy: f64,
}

fn handle_train(args: TrainArgs, config_file: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load(config_file)?;
    apply_overrides(&mut config, &args);
    let problems = config.validate();
    if !problems.is_empty() {
        bail!("Invalid configuration:\n  {}", problems.join("\n  "));
    }

    let mut frame = csv::read_frame(&args.data)
        .with_context(|| format!("Failed to read {}", args.data.display()))?;
    let labels = frame
        .take_column(&args.label)?
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_to_f64(cell) {
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            _ => bail!("Row {}: label {} is not a class index", i + 1, cell),
        })
        .collect::<anyhow::Result<Vec<usize>>>()?;

    let table = TrainingInput::from(frame).into_table()?;
    let names = table.columns.clone().unwrap_or_default();
    let space = FeatureSpace::new(names.clone());
    let index = |name: &String| {
        space
            .index_of(name)
            .with_context(|| format!("Unknown column '{name}'"))
    };
    let obscure_idx = index(&args.obscure_feature)?;
    let display_idx = index(&args.display_feature)?;
    let categorical = space.indices_of(&args.categorical)?;
    let include = space.indices_of(&args.include)?;

    let trainer = match args.strategy {
        StrategyKind::Gaussian => DetectorTrainer::new(
            GaussianNeighborhood::from_config(&config.gaussian)
                .with_hold_fixed(space.indices_of(&args.exclude)?),
        ),
        StrategyKind::Substitution => DetectorTrainer::new(
            BackgroundSubstitution::from_config(&config.substitution)
                .with_exclude_features(args.exclude.iter().cloned()),
        ),
    }
    .with_config(&config)
    .with_categorical(categorical)
    .with_include(include);

    let trainer = if config.cache.enabled {
        let stem = args
            .data
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        let dir = config
            .cache
            .dir
            .join(format!("{}_{stem}", trainer.strategy_name()));
        tracing::debug!(dir = %dir.display(), "using dataset cache");
        trainer.with_cache(FileCache::new(dir).with_decimals(config.cache.decimals))
    } else {
        trainer
    };

    let mut rng = config.rng();
    let (train_rows, test_rows) =
        shuffled_partition(table.values.nrows(), config.holdout_fraction, &mut rng)?;
    let x_train = table.values.select(Axis(0), &train_rows);
    let x_test = table.values.select(Axis(0), &test_rows);
    let y_train: Vec<usize> = train_rows.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<usize> = test_rows.iter().map(|&i| labels[i]).collect();

    let mut router = AdversarialRouter::new(
        Arc::new(FeatureThresholdModel::new(obscure_idx, args.obscure_threshold)),
        Arc::new(FeatureThresholdModel::new(display_idx, args.display_threshold)),
    )
    .with_threshold(config.threshold);
    router.train(x_train, &y_train, Some(names), &trainer, &mut rng)?;

    let detector = router
        .training_report()
        .cloned()
        .context("Training finished without a report")?;
    let summary = TrainSummary {
        fidelity: router.fidelity(x_test.view())?,
        probe_rate: router.probe_rate(x_test.view())?,
        accuracy: router.score(x_test.view(), &y_test)?,
        detector,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn apply_overrides(config: &mut ScaffoldConfig, args: &TrainArgs) {
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(dir) = &args.cache_dir {
        config.cache.dir = dir.clone();
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
}

fn print_summary(summary: &TrainSummary) {
    let report = &summary.detector;
    let metrics = &report.holdout_metrics;
    println!("Strategy:          {}", report.strategy);
    println!("Detector columns:  {}", report.detector_columns.join(", "));
    println!(
        "Synthetic rows:    {} train / {} hold-out ({} real, {} probe)",
        report.n_train, report.n_holdout, report.n_real, report.n_probe
    );
    println!(
        "Detector hold-out: accuracy {:.3}, precision {:.3}, recall {:.3}, F1 {:.3}",
        metrics.accuracy, metrics.precision, metrics.recall, metrics.f1_score
    );
    println!("Fidelity:          {:.3}", summary.fidelity);
    println!("Probe rate:        {:.3}", summary.probe_rate);
    println!("Accuracy:          {:.3}", summary.accuracy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn args() -> TrainArgs {
        TrainArgs {
            data: PathBuf::from("data.csv"),
            label: "y".into(),
            strategy: StrategyKind::Gaussian,
            obscure_feature: "a".into(),
            obscure_threshold: 0.0,
            display_feature: "b".into(),
            display_threshold: 0.0,
            categorical: vec![],
            include: vec![],
            exclude: vec![],
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            no_cache: true,
            seed: Some(9),
            json: false,
        }
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let mut config = ScaffoldConfig::default();
        apply_overrides(&mut config, &args());
        assert_eq!(config.seed, 9);
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/cache"));
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_train_end_to_end_on_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = dir.path().join("toy.csv");
        let mut body = String::from("a,b,c,y\n");
        for i in 0..20 {
            body.push_str(&format!("{},{},{},{}\n", i % 2, (i * 3) % 7, i, i % 2));
        }
        std::fs::write(&data, body).unwrap();

        let mut train = args();
        train.data = data;
        train.cache_dir = Some(dir.path().join("cache"));
        train.no_cache = false;
        train.json = true;
        handle_train(train, None).unwrap();
        assert!(dir.path().join("cache/gaussian_toy/gaussian_toy.csv").exists());
    }
}
