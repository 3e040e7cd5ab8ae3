//! Runtime configuration.
//!
//! Read from `moi-report.toml` when present, otherwise defaults; a few
//! environment variables override the file so deployments do not need one.

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "moi-report.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the machine-translation pass.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    /// `generateContent` endpoint of the model.
    pub endpoint: String,
    /// When set, requests go here instead and the backend adds credentials.
    pub proxy_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                .to_string(),
            proxy_url: None,
            api_key_env: "MOI_TRANSLATE_API_KEY".to_string(),
            concurrency: 4,
            timeout_secs: 30,
            max_retries: 2,
            backoff_ms: 250,
        }
    }
}

impl TranslateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub output_dir: PathBuf,
    pub session_file: PathBuf,
    /// TTF with Tamil coverage, needed for the translated PDF.
    pub tamil_font_path: Option<PathBuf>,
    pub translation: TranslateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            output_dir: PathBuf::from("exports"),
            session_file: PathBuf::from(".moi-session.json"),
            tamil_font_path: None,
            translation: TranslateConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!(path = %path.display(), "reading config");
            Self::from_toml(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        config.apply_env(|k| std::env::var(k).ok());
        Ok(config)
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("MOI_API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = get("MOI_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MOI_TAMIL_FONT") {
            self.tamil_font_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MOI_TRANSLATE_PROXY") {
            self.translation.proxy_url = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = Config::from_toml(
            r#"
            output_dir = "out"
            [translation]
            concurrency = 8
            "#,
        )
        .unwrap();
        assert_eq!(c.output_dir, PathBuf::from("out"));
        assert_eq!(c.translation.concurrency, 8);
        assert_eq!(c.translation.max_retries, 2);
        assert_eq!(c.api, ApiConfig::default());
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = Config::from_toml("output_dir = [").unwrap_err();
        assert!(matches!(err, crate::error::ExportError::Config(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut c = Config::default();
        c.apply_env(|k| match k {
            "MOI_API_BASE_URL" => Some("http://api.internal:8080".into()),
            "MOI_TAMIL_FONT" => Some("/fonts/NotoSansTamil.ttf".into()),
            _ => None,
        });
        assert_eq!(c.api.base_url, "http://api.internal:8080");
        assert_eq!(c.tamil_font_path, Some(PathBuf::from("/fonts/NotoSansTamil.ttf")));
        assert_eq!(c.output_dir, PathBuf::from("exports"));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(c.translation.concurrency, 4);
    }
}
