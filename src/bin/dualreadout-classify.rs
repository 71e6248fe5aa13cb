//! Score a directory of test waveforms with every model in a model directory.

use std::path::PathBuf;

use dualreadout::config::{self, PipelineConfig};
use dualreadout::pipeline::classify_directory;

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
    let run = classify_directory(&config, &options.test_dir, &options.models_dir, &options.out_dir)
        .map_err(|err| err.to_string())?;
    let counts = run.counts;
    println!(
        "ingested={} parse_failures={} accepted={} rejected={} scored={}",
        counts.ingested, counts.parse_failures, counts.accepted, counts.rejected, counts.scored
    );
    for (method, response) in &run.report.responses {
        println!(
            "  {:<12} entries={} underflow={} overflow={}",
            method, response.entries, response.underflow, response.overflow
        );
    }
    for skipped in &run.report.skipped_models {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    println!("Report written to {}", run.report_path.display());
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
    test_dir: PathBuf,
    models_dir: PathBuf,
    out_dir: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut test_dir: Option<PathBuf> = None;
    let mut models_dir = PathBuf::from("models");
    let mut out_dir = PathBuf::from("classification");
    let mut config: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--test" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--test requires a value".to_string())?;
                test_dir = Some(PathBuf::from(value));
            }
            "--models" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--models requires a value".to_string())?;
                models_dir = PathBuf::from(value);
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = PathBuf::from(value);
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

    let test_dir = test_dir.ok_or_else(|| format!("--test is required\n\n{}", help_text()))?;
    Ok(CliOptions {
        test_dir,
        models_dir,
        out_dir,
        config,
    })
}

fn help_text() -> String {
    [
        "dualreadout-classify",
        "",
        "Score test waveforms with every <name>.model found in a directory.",
        "",
        "Usage:",
        "  dualreadout-classify --test <dir> [--models <dir>] [--out <dir>] [--config <file>]",
        "",
        "Options:",
        "  --test <dir>      Directory of test waveform CSVs.",
        "  --models <dir>    Model directory (default: models).",
        "  --out <dir>       Report directory (default: classification).",
        "  --config <file>   Pipeline config TOML (default: app config file).",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_test_is_given() {
        let options = parse_args(vec!["--test".into(), "t".into()]).unwrap();
        assert_eq!(options.test_dir, PathBuf::from("t"));
        assert_eq!(options.models_dir, PathBuf::from("models"));
        assert_eq!(options.out_dir, PathBuf::from("classification"));
    }
}
