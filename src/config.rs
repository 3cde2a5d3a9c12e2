//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `SCREENFOLIO_CONFIG`) and
//! deserializes into strongly-typed structs. Every field has a default,
//! so a missing file or a partial file is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "SCREENFOLIO_CONFIG";

/// Config file used when the env var is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_SCREENER_URL: &str = "https://www.screener.in/screens/2961981/chatgpt-weekly/";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub portfolio: PortfolioConfig,
    pub scoring: ScoringConfig,
}

/// Where and how screener pages are fetched.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    /// Rows the source serves per full page; a shorter page is the last one.
    pub page_size: usize,
    /// Upper bound on pages fetched in one run.
    pub max_pages: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Extra attempts per page after the first. Zero disables retries.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SCREENER_URL.to_string(),
            page_size: 25,
            max_pages: 200,
            timeout_secs: 30,
            user_agent: "Mozilla/5.0".to_string(),
            max_retries: 0,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Directory holding the canonical portfolio and its archives.
    pub dir: PathBuf,
    /// Capital used when no canonical portfolio exists yet.
    pub default_capital: f64,
    pub max_holdings: usize,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            default_capital: 1_000_000.0,
            max_holdings: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// Column holding the current share price.
    pub price_column: String,
    /// Fail the run when a scored metric column is missing instead of
    /// scoring it as zero.
    pub strict_schema: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            price_column: "CMPRs.".to_string(),
            strict_schema: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The config path from the environment, or the default.
    pub fn resolve_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn validate(&self) -> Result<()> {
        use crate::types::FolioError;

        if self.source.page_size == 0 {
            return Err(FolioError::Config("source.page_size must be positive".into()).into());
        }
        if self.portfolio.max_holdings == 0 {
            return Err(
                FolioError::Config("portfolio.max_holdings must be positive".into()).into(),
            );
        }
        if !self.portfolio.default_capital.is_finite() || self.portfolio.default_capital < 0.0 {
            return Err(FolioError::Config(
                "portfolio.default_capital must be a non-negative number".into(),
            )
            .into());
        }
        Ok(())
    }
}
