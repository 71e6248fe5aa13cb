//! Train the configured classifiers on a prepared dataset.

use std::path::PathBuf;

use dualreadout::config::{self, PipelineConfig};
use dualreadout::ml::engine::{self, MethodConfig};
use dualreadout::pipeline::{BACKGROUND_TABLE, SIGNAL_TABLE};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = dualreadout::logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let config = load_config(options.config.as_ref())?;
    config.validate().map_err(|err| err.to_string())?;
    if !options.dataset_dir.is_dir() {
        return Err(format!(
            "Dataset path is not a directory: {}",
            options.dataset_dir.display()
        ));
    }
    let methods: Vec<&MethodConfig> = match options.method.as_deref() {
        Some(name) => vec![
            config
                .method(name)
                .ok_or_else(|| format!("No method named {name} in the config"))?,
        ],
        None => config.methods.iter().collect(),
    };
    for method in methods {
        let outcome = engine::train(
            &options.dataset_dir,
            SIGNAL_TABLE,
            BACKGROUND_TABLE,
            method,
            &options.out_dir,
        )
        .map_err(|err| err.to_string())?;
        println!(
            "{} ({}): {} train rows, test accuracy {:.4} -> {}",
            method.name,
            method.kind.as_str(),
            outcome.train_rows,
            outcome.test_metrics.accuracy,
            outcome.model_path.display()
        );
        for stats in &outcome.test_metrics.per_class {
            println!(
                "  {:<12} precision={:.3}  recall={:.3}  support={}",
                stats.class_id, stats.precision, stats.recall, stats.support
            );
        }
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig, String> {
    match path {
        Some(path) => config::load_from_path(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())
}

#[derive(Debug, Clone)]
struct CliOptions {
    dataset_dir: PathBuf,
    out_dir: PathBuf,
    method: Option<String>,
    config: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut dataset_dir: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("models");
    let mut method: Option<String> = None;
    let mut config: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset_dir = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = PathBuf::from(value);
            }
            "--method" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--method requires a value".to_string())?;
                method = Some(value.clone());
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    let dataset_dir =
        dataset_dir.ok_or_else(|| format!("--dataset is required\n\n{}", help_text()))?;
    Ok(CliOptions {
        dataset_dir,
        out_dir,
        method,
        config,
    })
}

fn help_text() -> String {
    [
        "dualreadout-train",
        "",
        "Train signal/background classifiers and write one <name>.model per method.",
        "",
        "Usage:",
        "  dualreadout-train --dataset <dir> [--out <dir>] [--method <name>] [--config <file>]",
        "",
        "Options:",
        "  --dataset <dir>   Dataset written by dualreadout-prepare.",
        "  --out <dir>       Model output directory (default: models).",
        "  --method <name>   Train only this configured method.",
        "  --config <file>   Pipeline config TOML (default: app config file).",
    ]
    .join("\n")
}
