//! Load configuration.
//!
//! A [`LoadRequest`] carries every option recognized by the loader. It can be
//! built in code or read from TOML, where every field except `gas` has a
//! default:
//!
//! ```toml
//! gas = "CFC-11"
//! program = "cats"
//! freq = "monthly"
//! gapfill = true
//! strategy = "robust_seasonal"
//! forecast_periods = 12
//! addlocation = true
//! ```

use gaslab_core::domain::Frequency;
use gaslab_core::gapfill::{FillStrategy, GapFillConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Upper bound on concurrent fetches; remote servers refuse more.
pub const MAX_FETCH_WORKERS: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn default_program() -> String {
    "cats".to_string()
}
fn default_freq() -> Frequency {
    Frequency::Monthly
}
fn default_strategy() -> FillStrategy {
    FillStrategy::RobustSeasonal
}
fn default_seasonal_periods() -> usize {
    12
}
fn default_fetch_workers() -> usize {
    3
}
fn default_fill_workers() -> usize {
    4
}
fn default_warmup_periods() -> usize {
    16
}
fn default_divergence_sigma() -> f64 {
    2.0
}

/// One gas from one measurement program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Gas alias, resolved by the canonicalizer.
    pub gas: String,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_freq")]
    pub freq: Frequency,
    #[serde(default)]
    pub gapfill: bool,
    #[serde(default = "default_strategy")]
    pub strategy: FillStrategy,
    #[serde(default)]
    pub forecast_periods: usize,
    #[serde(default = "default_seasonal_periods")]
    pub seasonal_periods: usize,
    /// Join site latitude, longitude and elevation.
    #[serde(default)]
    pub addlocation: bool,
    /// Subset of the program's sites; all sites when absent.
    #[serde(default)]
    pub sites: Option<Vec<String>>,
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,
    #[serde(default = "default_fill_workers")]
    pub fill_workers: usize,
    #[serde(default = "default_warmup_periods")]
    pub warmup_periods: usize,
    #[serde(default = "default_divergence_sigma")]
    pub divergence_sigma: f64,
}

impl LoadRequest {
    pub fn new(gas: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            gas: gas.into(),
            program: program.into(),
            freq: default_freq(),
            gapfill: false,
            strategy: default_strategy(),
            forecast_periods: 0,
            seasonal_periods: default_seasonal_periods(),
            addlocation: false,
            sites: None,
            fetch_workers: default_fetch_workers(),
            fill_workers: default_fill_workers(),
            warmup_periods: default_warmup_periods(),
            divergence_sigma: default_divergence_sigma(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let request: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "gas",
                reason: "must not be empty".into(),
            });
        }
        if self.seasonal_periods < 2 {
            return Err(ConfigError::Invalid {
                field: "seasonal_periods",
                reason: format!("must be at least 2, got {}", self.seasonal_periods),
            });
        }
        if !self.divergence_sigma.is_finite() {
            return Err(ConfigError::Invalid {
                field: "divergence_sigma",
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }

    pub fn with_gapfill(mut self, strategy: FillStrategy) -> Self {
        self.gapfill = true;
        self.strategy = strategy;
        self
    }

    pub fn with_freq(mut self, freq: Frequency) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_forecast(mut self, periods: usize) -> Self {
        self.forecast_periods = periods;
        self
    }

    pub fn with_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = Some(sites.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_location(mut self) -> Self {
        self.addlocation = true;
        self
    }

    pub fn with_workers(mut self, fetch: usize, fill: usize) -> Self {
        self.fetch_workers = fetch;
        self.fill_workers = fill;
        self
    }

    /// Fetch pool size, clamped to `1..=MAX_FETCH_WORKERS`.
    pub fn effective_fetch_workers(&self) -> usize {
        self.fetch_workers.clamp(1, MAX_FETCH_WORKERS)
    }

    pub fn effective_fill_workers(&self) -> usize {
        self.fill_workers.max(1)
    }

    /// Engine parameters derived from this request.
    pub fn gapfill_config(&self) -> GapFillConfig {
        GapFillConfig {
            strategy: self.strategy,
            seasonal_periods: self.seasonal_periods,
            forecast_periods: self.forecast_periods,
            warmup_periods: self.warmup_periods,
            divergence_sigma: self.divergence_sigma,
            ..GapFillConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_takes_defaults() {
        let req = LoadRequest::from_toml("gas = \"n2o\"").unwrap();
        assert_eq!(req.program, "cats");
        assert_eq!(req.freq, Frequency::Monthly);
        assert!(!req.gapfill);
        assert_eq!(req.strategy, FillStrategy::RobustSeasonal);
        assert_eq!(req.seasonal_periods, 12);
        assert_eq!(req.fetch_workers, 3);
        assert_eq!(req.warmup_periods, 16);
        assert_eq!(req.divergence_sigma, 2.0);
        assert_eq!(req.sites, None);
    }

    #[test]
    fn full_toml_round_trips_options() {
        let toml = r#"
            gas = "CFC-11"
            program = "otto"
            freq = "monthly"
            gapfill = true
            strategy = "seasonal"
            forecast_periods = 12
            addlocation = true
            sites = ["brw", "smo"]
            fetch_workers = 10
            divergence_sigma = 3.0
        "#;
        let req = LoadRequest::from_toml(toml).unwrap();
        assert_eq!(req.strategy, FillStrategy::Seasonal);
        assert_eq!(req.sites.as_deref(), Some(&["brw".to_string(), "smo".to_string()][..]));
        assert_eq!(req.effective_fetch_workers(), MAX_FETCH_WORKERS);
        let cfg = req.gapfill_config();
        assert_eq!(cfg.forecast_periods, 12);
        assert_eq!(cfg.divergence_sigma, 3.0);
        assert_eq!(cfg.warmup_periods, 16);
    }

    #[test]
    fn gas_is_required() {
        assert!(matches!(
            LoadRequest::from_toml("program = \"cats\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            LoadRequest::from_toml("gas = \"  \""),
            Err(ConfigError::Invalid { field: "gas", .. })
        ));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(LoadRequest::from_toml("gas = \"f11\"\nstrategy = \"spline\"").is_err());
    }

    #[test]
    fn workers_are_clamped() {
        let req = LoadRequest::new("f11", "cats").with_workers(0, 0);
        assert_eq!(req.effective_fetch_workers(), 1);
        assert_eq!(req.effective_fill_workers(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LoadRequest::from_file(Path::new("/nonexistent/gaslab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
