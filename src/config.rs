//! Configuration for a repair run.
//!
//! Settings come from ~/.config/buildmend/config.json plus environment
//! overrides, resolved once at startup into a `Config` that is threaded
//! into the orchestrator and applier explicitly. Nothing reads the
//! environment mid-run.
//!
//! Recognized environment variables:
//! - `BUILDMEND_APPLY`: `0`/`false` validates and logs intended actions
//!   without touching the filesystem; `1` or absent applies for real.
//! - `OPENAI_API_KEY`, `OPENAI_MODEL`

use crate::llm::client::{DEFAULT_MODEL, DEFAULT_MODEL_TIMEOUT};
use crate::llm::ModelSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10 * 60;

/// Persisted knobs. All optional; defaults cover a fresh install.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    model: Option<String>,
    build_timeout_secs: Option<u64>,
    model_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// When false, the applier and command stage run in dry-run mode.
    pub apply_enabled: bool,
    pub model: String,
    pub api_key: Option<String>,
    pub build_timeout: Duration,
    pub model_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apply_enabled: true,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            build_timeout: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS),
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("buildmend").join("config.json"))
    }

    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Self {
        let file = Self::load_file();
        let mut config = Config::default();

        if let Some(model) = file.model {
            config.model = model;
        }
        if let Some(secs) = file.build_timeout_secs {
            config.build_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.model_timeout_secs {
            config.model_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.command_timeout_secs {
            config.command_timeout = Duration::from_secs(secs);
        }

        config.apply_enabled = parse_apply_flag(std::env::var("BUILDMEND_APPLY").ok().as_deref());
        config.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }

        config
    }

    fn load_file() -> ConfigFile {
        let Some(path) = Self::config_path() else {
            return ConfigFile::default();
        };
        let Ok(content) = fs::read_to_string(&path) else {
            return ConfigFile::default();
        };
        match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(err) => {
                preserve_corrupt_config(&path, &content);
                eprintln!(
                    "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                    err
                );
                ConfigFile::default()
            }
        }
    }

    /// Model settings for the client, or `None` when no API key is
    /// configured (the run reports `ModelError` instead of calling out).
    pub fn model_settings(&self) -> Option<ModelSettings> {
        self.api_key.as_ref().map(|api_key| ModelSettings {
            model: self.model.clone(),
            api_key: api_key.clone(),
            timeout: self.model_timeout,
        })
    }
}

/// `0`/`false` (any case) disables mutation; everything else, including an
/// absent variable, applies for real.
pub fn parse_apply_flag(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        Some(value) => {
            let lowered = value.to_ascii_lowercase();
            lowered != "0" && lowered != "false"
        }
        None => true,
    }
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_flag_defaults_to_enabled() {
        assert!(parse_apply_flag(None));
        assert!(parse_apply_flag(Some("1")));
        assert!(parse_apply_flag(Some("yes")));
    }

    #[test]
    fn apply_flag_recognizes_disable_values() {
        assert!(!parse_apply_flag(Some("0")));
        assert!(!parse_apply_flag(Some("false")));
        assert!(!parse_apply_flag(Some("FALSE")));
        assert!(!parse_apply_flag(Some(" 0 ")));
    }

    #[test]
    fn default_config_applies_for_real_with_default_model() {
        let config = Config::default();
        assert!(config.apply_enabled);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.model_settings().is_none());
    }

    #[test]
    fn model_settings_need_an_api_key() {
        let config = Config {
            api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        let settings = config.model_settings().unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }
}
