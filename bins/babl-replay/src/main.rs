//! BABL replay tool.
//!
//! Loads an engine configuration, replays an ordered scenario of protocol
//! events through a fresh rewards distributor and prints the resulting
//! rewards report.

mod scenario;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use scenario::Scenario;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Replay BABL protocol events and report mining rewards.
#[derive(Parser, Debug)]
#[command(
    name = "babl-replay",
    version,
    about = "Replay an ordered BABL event scenario and print the rewards report"
)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Engine configuration file (TOML, JSON or YAML); BABL_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let engine = settings::load(args.config.as_deref())?;
    info!(
        start_time = engine.start_time,
        epoch_duration = engine.epoch_duration,
        keepers = engine.keepers.len(),
        "configuration loaded"
    );

    let scenario = Scenario::from_file(&args.scenario)?;
    let report = scenario::replay(engine, &scenario)
        .with_context(|| format!("replay of {} failed", args.scenario.display()))?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).context("failed to encode report")?)
        }
        OutputFormat::Text => print!("{}", report.to_text()),
    }
    Ok(())
}

/// Initialize tracing. `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // Logs go to stderr so the report on stdout stays parseable.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["babl-replay", "run.json"]).unwrap();
        assert_eq!(args.scenario, PathBuf::from("run.json"));
        assert_eq!(args.output, OutputFormat::Text);
        assert!(args.config.is_none());
    }

    #[test]
    fn args_parse_json_output_and_config() {
        let args =
            Args::try_parse_from(["babl-replay", "--output", "json", "--config", "babl.toml", "run.json"]).unwrap();
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.config, Some(PathBuf::from("babl.toml")));
    }
}
