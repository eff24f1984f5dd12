//! Engine configuration parsing from environment variables.
//!
//! Selects the domain config and applies run-time overrides: sample floor,
//! shrinkage strength and worker pool size.

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_DOMAIN: &str = "equity_rolling";

/// Engine environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEnvConfig {
    /// Preset name or path to a domain TOML file
    pub domain_config: String,
    pub min_samples: Option<usize>,
    pub shrink_strength: Option<f64>,
    /// Size of a dedicated rayon pool; `None` uses the global pool
    pub threads: Option<usize>,
}

impl Default for EngineEnvConfig {
    fn default() -> Self {
        Self {
            domain_config: DEFAULT_DOMAIN.to_string(),
            min_samples: None,
            shrink_strength: None,
            threads: None,
        }
    }
}

impl EngineEnvConfig {
    pub fn from_env() -> Result<Self> {
        let threads = Self::parse_optional::<usize>("ENGINE_THREADS")?;
        if threads == Some(0) {
            anyhow::bail!("ENGINE_THREADS must be >= 1");
        }
        let min_samples = Self::parse_optional::<usize>("PWIN_MIN_SAMPLES")?;
        if min_samples == Some(0) {
            anyhow::bail!("PWIN_MIN_SAMPLES must be >= 1");
        }

        Ok(Self {
            domain_config: env::var("PWIN_DOMAIN_CONFIG")
                .unwrap_or_else(|_| DEFAULT_DOMAIN.to_string()),
            min_samples,
            shrink_strength: Self::parse_optional::<f64>("PWIN_SHRINK_K")?,
            threads,
        })
    }

    fn parse_optional<T>(key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match env::var(key) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .context(format!("Failed to parse {}", key)),
            _ => Ok(None),
        }
    }
}
