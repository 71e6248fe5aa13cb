//! Build a signal/background dataset from two directories of waveform CSVs.

use std::path::PathBuf;

use dualreadout::config::{self, PipelineConfig};
use dualreadout::pipeline::{PipelineOutcome, prepare_dataset};

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
    let outcome = prepare_dataset(&config, &options.signal_dir, &options.background_dir, &options.out_dir)
        .map_err(|err| err.to_string())?;
    let counts = outcome.counts();
    println!(
        "ingested={} parse_failures={} accepted={} rejected={}",
        counts.ingested, counts.parse_failures, counts.accepted, counts.rejected
    );
    match outcome {
        PipelineOutcome::Completed { value, .. } => {
            for table in &value.tables {
                println!("  {:<12} rows={}", table.name, table.rows);
            }
            println!(
                "Dataset written to {} ({} encoding, {} bins)",
                value.dataset_dir.display(),
                value.manifest.encoding.as_str(),
                value.manifest.bin_count
            );
        }
        PipelineOutcome::Empty { .. } => {
            println!("No waveform passed the quality gate; only reports were written");
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
    signal_dir: PathBuf,
    background_dir: PathBuf,
    out_dir: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut signal_dir: Option<PathBuf> = None;
    let mut background_dir: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("dataset");
    let mut config: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--signal" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--signal requires a value".to_string())?;
                signal_dir = Some(PathBuf::from(value));
            }
            "--background" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--background requires a value".to_string())?;
                background_dir = Some(PathBuf::from(value));
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

    let signal_dir = signal_dir.ok_or_else(|| format!("--signal is required\n\n{}", help_text()))?;
    let background_dir =
        background_dir.ok_or_else(|| format!("--background is required\n\n{}", help_text()))?;
    Ok(CliOptions {
        signal_dir,
        background_dir,
        out_dir,
        config,
    })
}

fn help_text() -> String {
    [
        "dualreadout-prepare",
        "",
        "Gate, normalize and encode signal and background waveforms into a dataset.",
        "",
        "Usage:",
        "  dualreadout-prepare --signal <dir> --background <dir> [--out <dir>] [--config <file>]",
        "",
        "Options:",
        "  --signal <dir>      Directory of signal waveform CSVs.",
        "  --background <dir>  Directory of background waveform CSVs.",
        "  --out <dir>         Output directory (default: dataset).",
        "  --config <file>     Pipeline config TOML (default: app config file).",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_required_directories() {
        let options = parse_args(args(&["--signal", "s", "--background", "b"])).unwrap();
        assert_eq!(options.signal_dir, PathBuf::from("s"));
        assert_eq!(options.background_dir, PathBuf::from("b"));
        assert_eq!(options.out_dir, PathBuf::from("dataset"));
        assert!(options.config.is_none());
    }

    #[test]
    fn missing_background_is_an_error() {
        let err = parse_args(args(&["--signal", "s"])).unwrap_err();
        assert!(err.starts_with("--background is required"));
    }

    #[test]
    fn unknown_argument_is_an_error() {
        let err = parse_args(args(&["--bogus"])).unwrap_err();
        assert!(err.starts_with("Unknown argument: --bogus"));
    }
}
