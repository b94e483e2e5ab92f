use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::calendar::ShamsiDate;
use crate::pipeline::structuring::gemini_types::normalize_model_id;
use crate::pipeline::structuring::{FallbackPolicy, MalformedPolicy, DEFAULT_BASE_URL};

/// Application-level constants
pub const APP_NAME: &str = "tour-extract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_MODELS: &str = "TOUR_EXTRACT_MODELS";
pub const ENV_BASE_URL: &str = "TOUR_EXTRACT_BASE_URL";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "tour_extract=info"
}

/// Per-user configuration directory, e.g. `~/.config/tour-extract/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GOOGLE_API_KEY is not set")]
    MissingApiKey,

    #[error("No candidate models configured")]
    NoModels,

    #[error("Invalid setting {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Resolved runtime settings.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Model identifiers, tried in this order.
    pub candidate_models: Vec<String>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Pause after a rate-limited attempt.
    pub rate_limit_pause_ms: u64,
    /// Treat a non-JSON reply as a failed attempt and try the next model.
    pub fallback_on_malformed: bool,
    /// Shamsi year assumed when neither the document nor the operator gives one.
    pub default_year: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            candidate_models: vec![
                "gemini-2.0-flash-exp".into(),
                "gemini-1.5-flash".into(),
                "gemini-1.5-pro".into(),
            ],
            api_base_url: DEFAULT_BASE_URL.into(),
            request_timeout_secs: 120,
            rate_limit_pause_ms: 2000,
            fallback_on_malformed: false,
            default_year: 1404,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from `path`, or from the default location when `path`
    /// is `None`. A missing default file yields the built-in defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.is_file() => p,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Config file loaded");
        Ok(settings)
    }

    /// Apply `TOUR_EXTRACT_*` overrides. `lookup` is usually
    /// `|k| std::env::var(k).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(models) = lookup(ENV_MODELS) {
            let models = parse_model_list(&models);
            if !models.is_empty() {
                self.candidate_models = models;
            }
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.api_base_url = url.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidate_models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        for model in &self.candidate_models {
            normalize_model_id(model).map_err(|e| ConfigError::InvalidValue {
                key: "candidate_models",
                reason: e.to_string(),
            })?;
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                key: "api_base_url",
                reason: format!("'{}' is not an http(s) URL", self.api_base_url),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        ShamsiDate::new(self.default_year, 1, 1).map_err(|e| ConfigError::InvalidValue {
            key: "default_year",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limit_pause_ms)
    }

    pub fn malformed_policy(&self) -> MalformedPolicy {
        if self.fallback_on_malformed {
            MalformedPolicy::NextCandidate
        } else {
            MalformedPolicy::ReturnRaw
        }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            rate_limit_pause: self.rate_limit_pause(),
            malformed: self.malformed_policy(),
        }
    }
}

/// Split a comma-separated model list, dropping blanks.
pub fn parse_model_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the API key through `lookup`. Blank values count as missing.
pub fn api_key_from<F>(lookup: F) -> Result<Zeroizing<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(ENV_API_KEY) {
        Some(key) if !key.trim().is_empty() => Ok(Zeroizing::new(key.trim().to_string())),
        _ => Err(ConfigError::MissingApiKey),
    }
}

pub fn api_key_from_env() -> Result<Zeroizing<String>, ConfigError> {
    api_key_from(|k| std::env::var(k).ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.candidate_models[0], "gemini-2.0-flash-exp");
        assert_eq!(settings.rate_limit_pause(), Duration::from_secs(2));
        assert_eq!(settings.malformed_policy(), MalformedPolicy::ReturnRaw);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings = Settings::from_toml_str(
            r#"
candidate_models = ["gemini-1.5-pro"]
fallback_on_malformed = true
"#,
        )
        .unwrap();
        assert_eq!(settings.candidate_models, vec!["gemini-1.5-pro".to_string()]);
        assert_eq!(settings.malformed_policy(), MalformedPolicy::NextCandidate);
        assert_eq!(settings.request_timeout_secs, 120);
        assert_eq!(settings.default_year, 1404);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = Settings::from_toml_str("candidate_model = [\"x\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_year = 1405\nrate_limit_pause_ms = 500\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.default_year, 1405);
        assert_eq!(settings.rate_limit_pause(), Duration::from_millis(500));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_models_and_url() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(env(&[
            (ENV_MODELS, " m-a , ,m-b "),
            (ENV_BASE_URL, "http://localhost:8089"),
        ]));
        assert_eq!(settings.candidate_models, vec!["m-a".to_string(), "m-b".to_string()]);
        assert_eq!(settings.api_base_url, "http://localhost:8089");
    }

    #[test]
    fn blank_env_models_ignored() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(env(&[(ENV_MODELS, " , ")]));
        assert_eq!(settings.candidate_models, Settings::default().candidate_models);
    }

    #[test]
    fn empty_model_list_invalid() {
        let settings = Settings {
            candidate_models: vec![],
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::NoModels)));
    }

    #[test]
    fn bad_values_invalid() {
        let bad_model = Settings {
            candidate_models: vec!["../files".into()],
            ..Settings::default()
        };
        assert!(matches!(
            bad_model.validate(),
            Err(ConfigError::InvalidValue { key: "candidate_models", .. })
        ));

        let bad_url = Settings {
            api_base_url: "ftp://example.com".into(),
            ..Settings::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_year = Settings {
            default_year: 0,
            ..Settings::default()
        };
        assert!(matches!(
            bad_year.validate(),
            Err(ConfigError::InvalidValue { key: "default_year", .. })
        ));
    }

    #[test]
    fn api_key_lookup() {
        assert_eq!(
            api_key_from(env(&[(ENV_API_KEY, " abc ")])).unwrap().as_str(),
            "abc"
        );
        assert!(matches!(
            api_key_from(env(&[(ENV_API_KEY, "  ")])),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(api_key_from(env(&[])), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn config_path_under_app_dir() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("tour-extract/config.toml"));
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
