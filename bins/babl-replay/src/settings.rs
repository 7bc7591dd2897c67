//! Engine configuration for the replay tool.
//!
//! Layers, lowest precedence first: built-in defaults, the optional
//! `--config` file (TOML, JSON or YAML by extension), then `BABL_*`
//! environment variables (`BABL_EPOCH_DURATION`, `BABL_HEART_GARDEN`).
//! A `mining` table replaces the default parameters as a whole, so it must
//! carry every field.

use std::path::Path;

use anyhow::{Context, Result};
use babl_core::config::EngineConfig;
use config::{Config, Environment, File};

/// `BABL_` prefix, `__` between nested keys.
fn environment() -> Environment {
    Environment::with_prefix("BABL").prefix_separator("_").separator("__")
}

/// Load and validate the engine configuration.
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    load_with(path, environment())
}

fn load_with(path: Option<&Path>, env: Environment) -> Result<EngineConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let engine: EngineConfig = builder
        .add_source(env)
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("configuration does not match the engine schema")?;

    engine.validate().context("invalid engine configuration")?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use babl_core::constants::{EPOCH_DURATION, START_TIME};
    use babl_core::types::Address;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let engine = load_with(None, vars(&[])).unwrap();
        assert_eq!(engine.start_time, START_TIME);
        assert_eq!(engine.epoch_duration, EPOCH_DURATION);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"start_time": 1000, "epoch_duration": 500, "keepers": ["{}"], "heart_garden": "{}"}}"#,
            "cc".repeat(32),
            "aa".repeat(32)
        )
        .unwrap();

        let engine = load_with(Some(file.path()), vars(&[])).unwrap();
        assert_eq!(engine.start_time, 1000);
        assert_eq!(engine.epoch_duration, 500);
        assert!(engine.is_keeper(&Address([0xCC; 32])));
        assert_eq!(engine.heart_garden, Some(Address([0xAA; 32])));
    }

    #[test]
    fn zero_epoch_in_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"epoch_duration": 0}}"#).unwrap();
        assert!(load_with(Some(file.path()), vars(&[])).is_err());
    }

    fn vars(pairs: &[(&str, String)]) -> Environment {
        let map: config::Map<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        environment().source(Some(map))
    }

    #[test]
    fn single_underscore_variables_override_defaults() {
        let env = vars(&[
            ("BABL_EPOCH_DURATION", "777".to_string()),
            ("BABL_HEART_GARDEN", "aa".repeat(32)),
        ]);
        let engine = load_with(None, env).unwrap();
        assert_eq!(engine.epoch_duration, 777);
        assert_eq!(engine.heart_garden, Some(Address([0xAA; 32])));
        assert_eq!(engine.start_time, START_TIME);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"start_time": 1000, "epoch_duration": 500}}"#).unwrap();
        let env = vars(&[("BABL_EPOCH_DURATION", "600".to_string())]);
        let engine = load_with(Some(file.path()), env).unwrap();
        assert_eq!(engine.start_time, 1000);
        assert_eq!(engine.epoch_duration, 600);
    }

    #[test]
    fn zero_epoch_from_environment_is_rejected() {
        let env = vars(&[("BABL_EPOCH_DURATION", "0".to_string())]);
        assert!(load_with(None, env).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/babl.toml"))).is_err());
    }
}
