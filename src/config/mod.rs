//! Configuration module for the pwin engine.
//!
//! Per-domain estimation settings come from TOML files or presets
//! (`DomainConfig`); run-time overrides and observability settings come from
//! the environment.

mod domain_config;
mod engine_env_config;
mod observability_config;

pub use domain_config::{DomainConfig, HorizonConfig, StateConfig};
pub use engine_env_config::{DEFAULT_DOMAIN, EngineEnvConfig};
pub use observability_config::{LogFormat, ObservabilityEnvConfig};

use crate::application::pipeline::EstimationPipeline;
use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineEnvConfig,
    pub observability: ObservabilityEnvConfig,
    pub domain: DomainConfig,
}

impl Config {
    /// Loads environment settings and the selected domain config
    pub fn from_env() -> Result<Self> {
        let engine = EngineEnvConfig::from_env()?;
        let observability = ObservabilityEnvConfig::from_env()?;
        let domain = DomainConfig::resolve(&engine.domain_config)
            .with_context(|| format!("Failed to load domain '{}'", engine.domain_config))?;

        Ok(Self {
            engine,
            observability,
            domain,
        })
    }

    /// Same as [`from_env`](Self::from_env) but with an explicit domain source
    pub fn with_domain(mut self, source: &str) -> Result<Self> {
        self.domain = DomainConfig::resolve(source)
            .with_context(|| format!("Failed to load domain '{}'", source))?;
        self.engine.domain_config = source.to_string();
        Ok(self)
    }

    /// Pipeline for the configured domain with environment overrides applied
    pub fn pipeline(&self) -> Result<EstimationPipeline> {
        let mut pipeline = EstimationPipeline::new(&self.domain)
            .with_context(|| format!("Invalid domain config '{}'", self.domain.name))?;
        if let Some(min_samples) = self.engine.min_samples {
            pipeline = pipeline
                .with_min_samples(min_samples)
                .context("Invalid PWIN_MIN_SAMPLES")?;
        }
        if let Some(strength) = self.engine.shrink_strength {
            pipeline = pipeline
                .with_shrink_strength(strength)
                .context("Invalid PWIN_SHRINK_K")?;
        }
        Ok(pipeline)
    }
}
