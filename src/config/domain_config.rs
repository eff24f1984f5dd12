//! Per-domain engine configuration.
//!
//! Everything that differs between equity, macro and sports estimation lives
//! here and is passed into the engine explicitly: the outcome alphabet and
//! its classification rule, state length, shrinkage constants, warm-up
//! policies and the minimum sample floor. Files are TOML; the presets below
//! cover the domains the engine ships with.

use crate::application::rolling::window_manager::WarmupPolicy;
use crate::application::threshold::ThresholdSettings;
use crate::domain::errors::ConfigError;
use crate::domain::estimation::alphabet::OutcomeAlphabet;
use crate::domain::estimation::classifier::{ClassificationRule, Classifier, CutPoint, SignalTransform};
use crate::domain::estimation::shrinkage::{Prior, ShrinkageParams};
use crate::domain::series::calendar::CalendarPeriod;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

fn default_ahead() -> usize {
    1
}

fn default_min_samples() -> usize {
    30
}

fn default_interval_level() -> f64 {
    0.90
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Number of trailing labels in a state
    pub k: usize,
    /// Distance between the newest state label and the predicted label
    #[serde(default = "default_ahead")]
    pub ahead: usize,
}

/// A named horizon and the warm-up policy that feeds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonConfig {
    pub name: String,
    pub policy: WarmupPolicy,
}

impl HorizonConfig {
    pub fn new(name: impl Into<String>, policy: WarmupPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    pub alphabet: OutcomeAlphabet,
    #[serde(default)]
    pub classifier: ClassificationRule,
    #[serde(default)]
    pub transform: SignalTransform,
    pub state: StateConfig,
    #[serde(default)]
    pub shrinkage: ShrinkageParams,
    #[serde(default)]
    pub horizons: Vec<HorizonConfig>,
    /// Usable `(state, outcome)` pairs below which a window is refused
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Credible interval mass reported with each estimate
    #[serde(default = "default_interval_level")]
    pub interval_level: f64,
    #[serde(default)]
    pub threshold: Option<ThresholdSettings>,
}

impl DomainConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: DomainConfig = toml::from_str(raw).context("Failed to parse domain config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read domain config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid domain config {}", path.display()))
    }

    /// Loads `source` as a preset name, falling back to a TOML file path
    pub fn resolve(source: &str) -> Result<Self> {
        match Self::preset(source) {
            Some(config) => Ok(config),
            None => Self::load(source),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        Classifier::new(&self.classifier, &self.alphabet)?;
        if self.state.k == 0 {
            return Err(ConfigError::invalid("state.k", "must be >= 1"));
        }
        if self.state.ahead == 0 {
            return Err(ConfigError::invalid("state.ahead", "must be >= 1"));
        }
        self.shrinkage.validate(&self.alphabet)?;
        if self.min_samples == 0 {
            return Err(ConfigError::invalid("min_samples", "must be >= 1"));
        }
        if !(self.interval_level > 0.0 && self.interval_level < 1.0) {
            return Err(ConfigError::invalid(
                "interval_level",
                format!("must be in (0, 1), got {}", self.interval_level),
            ));
        }
        for (i, horizon) in self.horizons.iter().enumerate() {
            if self.horizons[..i].iter().any(|h| h.name == horizon.name) {
                return Err(ConfigError::invalid(
                    "horizons",
                    format!("duplicate horizon '{}'", horizon.name),
                ));
            }
            horizon
                .policy
                .validate()
                .map_err(|reason| ConfigError::invalid("horizons", format!("{}: {}", horizon.name, reason)))?;
        }
        if let Some(threshold) = &self.threshold {
            threshold.validate()?;
        }
        Ok(())
    }

    pub fn horizon(&self, name: &str) -> Option<&HorizonConfig> {
        self.horizons.iter().find(|h| h.name == name)
    }

    /// Policy by horizon name, or a calendar period name as shorthand
    pub fn policy_for(&self, name: &str) -> Result<WarmupPolicy> {
        if let Some(horizon) = self.horizon(name) {
            return Ok(horizon.policy.clone());
        }
        let period = CalendarPeriod::from_str(name).with_context(|| {
            format!(
                "Unknown horizon '{}' for domain {} (configured: {})",
                name,
                self.name,
                self.horizons
                    .iter()
                    .map(|h| h.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        Ok(WarmupPolicy::calendar(period))
    }

    pub fn preset_names() -> &'static [&'static str] {
        &[
            "equity_rolling",
            "equity_calendar",
            "macro_three_class",
            "gdp_bins",
            "sports_binary",
        ]
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "equity_rolling" => Some(Self::equity_rolling()),
            "equity_calendar" => Some(Self::equity_calendar()),
            "macro_three_class" => Some(Self::macro_three_class()),
            "gdp_bins" => Some(Self::gdp_bins()),
            "sports_binary" => Some(Self::sports_binary()),
            _ => None,
        }
    }

    /// Up/down on rolling log returns over 1/5/21 bars ("regime now")
    pub fn equity_rolling() -> Self {
        Self {
            name: "equity_rolling".to_string(),
            alphabet: OutcomeAlphabet::binary(),
            classifier: ClassificationRule::Sign { threshold: 0.0 },
            transform: SignalTransform::LogReturn,
            state: StateConfig { k: 3, ahead: 1 },
            shrinkage: ShrinkageParams::new(Prior::Fixed { value: 0.5 }, 15.0),
            horizons: CalendarPeriod::all()
                .into_iter()
                .map(|p| HorizonConfig::new(p.as_str(), WarmupPolicy::rolling_for(p)))
                .collect(),
            min_samples: default_min_samples(),
            interval_level: default_interval_level(),
            threshold: Some(ThresholdSettings::default()),
        }
    }

    /// Up/down between ISO-week and month closes
    pub fn equity_calendar() -> Self {
        Self {
            name: "equity_calendar".to_string(),
            alphabet: OutcomeAlphabet::binary(),
            classifier: ClassificationRule::Sign { threshold: 0.0 },
            transform: SignalTransform::LogReturn,
            state: StateConfig { k: 3, ahead: 1 },
            shrinkage: ShrinkageParams::new(Prior::Fixed { value: 0.5 }, 20.0),
            horizons: vec![
                HorizonConfig::new("weekly", WarmupPolicy::calendar(CalendarPeriod::Weekly)),
                HorizonConfig::new("monthly", WarmupPolicy::calendar(CalendarPeriod::Monthly)),
            ],
            min_samples: default_min_samples(),
            interval_level: default_interval_level(),
            threshold: None,
        }
    }

    /// Policy-rate decisions (change in percentage points) over the last two meetings
    pub fn macro_three_class() -> Self {
        let rule = ClassificationRule::CutPoints {
            bins: vec![
                CutPoint {
                    min: 0.125,
                    class: "HIKE_25".to_string(),
                },
                CutPoint {
                    min: -0.125,
                    class: "HOLD".to_string(),
                },
            ],
            fallback: "CUT_25".to_string(),
        };
        Self {
            name: "macro_three_class".to_string(),
            alphabet: Self::alphabet_of(&["CUT_25", "HOLD", "HIKE_25"]),
            classifier: rule,
            transform: SignalTransform::Level,
            state: StateConfig { k: 2, ahead: 1 },
            shrinkage: ShrinkageParams::new(Prior::Uniform, 15.0),
            horizons: vec![HorizonConfig::new(
                "event",
                WarmupPolicy::Rolling {
                    horizon: 1,
                    ceiling_bars: 400,
                    floor_bars: 40,
                },
            )],
            min_samples: default_min_samples(),
            interval_level: default_interval_level(),
            threshold: None,
        }
    }

    /// Quarterly GDP growth bins over the last two releases
    pub fn gdp_bins() -> Self {
        let bin = |min: f64, class: &str| CutPoint {
            min,
            class: class.to_string(),
        };
        Self {
            name: "gdp_bins".to_string(),
            alphabet: Self::alphabet_of(&["CONTRACTION", "STALL", "MODERATE", "EXPANSION"]),
            classifier: ClassificationRule::CutPoints {
                bins: vec![
                    bin(3.0, "EXPANSION"),
                    bin(1.5, "MODERATE"),
                    bin(0.0, "STALL"),
                ],
                fallback: "CONTRACTION".to_string(),
            },
            transform: SignalTransform::Level,
            state: StateConfig { k: 2, ahead: 1 },
            shrinkage: ShrinkageParams::new(Prior::Uniform, 15.0),
            horizons: vec![HorizonConfig::new(
                "release",
                WarmupPolicy::Rolling {
                    horizon: 1,
                    ceiling_bars: 320,
                    floor_bars: 40,
                },
            )],
            min_samples: default_min_samples(),
            interval_level: default_interval_level(),
            threshold: None,
        }
    }

    /// Win / no-win match results, shrunk toward a coin flip
    pub fn sports_binary() -> Self {
        Self {
            name: "sports_binary".to_string(),
            alphabet: OutcomeAlphabet::binary(),
            classifier: ClassificationRule::Sign { threshold: 0.5 },
            transform: SignalTransform::Level,
            state: StateConfig { k: 3, ahead: 1 },
            shrinkage: ShrinkageParams::new(Prior::Fixed { value: 0.5 }, 20.0),
            horizons: vec![HorizonConfig::new(
                "season",
                WarmupPolicy::Rolling {
                    horizon: 1,
                    ceiling_bars: 380,
                    floor_bars: 38,
                },
            )],
            min_samples: default_min_samples(),
            interval_level: default_interval_level(),
            threshold: None,
        }
    }

    fn alphabet_of(classes: &[&str]) -> OutcomeAlphabet {
        OutcomeAlphabet::new(classes.iter().copied()).unwrap_or_else(|_| OutcomeAlphabet::binary())
    }
}
