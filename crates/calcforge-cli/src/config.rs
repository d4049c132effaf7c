//! CLI configuration
//!
//! Loaded from a TOML file (`CALCFORGE_CONFIG_PATH`, default `calcforge.toml`)
//! and then overridden by `CALCFORGE_*` environment variables. A missing file
//! means defaults.

use anyhow::{Context, Result};
use calcforge_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown log format '{other}', expected 'text' or 'json'"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter(), format: LogFormat::default() }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CalcforgeConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CalcforgeConfig {
    /// Load from `path`, or from `CALCFORGE_CONFIG_PATH`, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            PathBuf::from(
                std::env::var("CALCFORGE_CONFIG_PATH").unwrap_or_else(|_| "calcforge.toml".to_string()),
            )
        });

        let config = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Self::from_toml(&text).with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `CALCFORGE_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CALCFORGE_EVALUATION_TIMEOUT_MS") {
            self.engine.evaluation_timeout_ms = parse_var("CALCFORGE_EVALUATION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("CALCFORGE_MAX_FORMULA_LENGTH") {
            self.engine.max_formula_length = parse_var("CALCFORGE_MAX_FORMULA_LENGTH", &v)?;
        }
        if let Some(v) = lookup("CALCFORGE_MAX_EXPRESSION_DEPTH") {
            self.engine.max_expression_depth = parse_var("CALCFORGE_MAX_EXPRESSION_DEPTH", &v)?;
        }
        if let Some(v) = lookup("CALCFORGE_FORMULA_CACHE_CAPACITY") {
            self.engine.formula_cache_capacity = parse_var("CALCFORGE_FORMULA_CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("CALCFORGE_LOG_FORMAT") {
            self.logging.format = v.parse().context("invalid CALCFORGE_LOG_FORMAT")?;
        }

        if self.engine.evaluation_timeout_ms == 0 {
            warn!("evaluation_timeout_ms is 0; every evaluation will time out");
        }
        Ok(self)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().with_context(|| format!("invalid value '{value}' for {key}"))
}

fn default_log_filter() -> String {
    "calcforge=info".to_string()
}
