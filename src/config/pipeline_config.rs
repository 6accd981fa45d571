//! Pipeline configuration parsing from environment variables.
//!
//! Covers the output directory, labelling, volatility fitting and HTTP timeouts.

use crate::application::ml::training_set::LabelConfig;
use crate::application::volatility::estimator::VolatilityConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineEnvConfig {
    pub processed_data_dir: PathBuf,

    // Labels
    pub forecast_horizon: usize,
    pub decline_ratio: f64,

    // Volatility
    pub volatility_scale: f64,
    pub garch_min_observations: usize,
    pub garch_max_iterations: usize,
    pub garch_max_fit_ms: u64,

    pub http_timeout_secs: u64,
}

impl PipelineEnvConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            processed_data_dir: env::var("PROCESSED_DATA_DIR")
                .unwrap_or_else(|_| "data/processed".to_string())
                .into(),
            forecast_horizon: Self::parse("FORECAST_HORIZON", 3)?,
            decline_ratio: Self::parse("DECLINE_RATIO", 0.95)?,
            volatility_scale: Self::parse("VOLATILITY_SCALE", 1000.0)?,
            garch_min_observations: Self::parse("GARCH_MIN_OBSERVATIONS", 10)?,
            garch_max_iterations: Self::parse("GARCH_MAX_ITERATIONS", 5000)?,
            garch_max_fit_ms: Self::parse("GARCH_MAX_FIT_MS", 5000)?,
            http_timeout_secs: Self::parse("HTTP_TIMEOUT_SECS", 10)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn parse<T>(key: &str, default: T) -> Result<T>
    where
        T: FromStr + ToString,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .trim()
            .parse::<T>()
            .context(format!("Failed to parse {}", key))
    }

    fn validate(&self) -> Result<()> {
        if self.forecast_horizon == 0 {
            anyhow::bail!("FORECAST_HORIZON must be at least 1");
        }
        if !(self.decline_ratio > 0.0 && self.decline_ratio.is_finite()) {
            anyhow::bail!("DECLINE_RATIO must be a positive number, got {}", self.decline_ratio);
        }
        if !(self.volatility_scale > 0.0 && self.volatility_scale.is_finite()) {
            anyhow::bail!(
                "VOLATILITY_SCALE must be a positive number, got {}",
                self.volatility_scale
            );
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn label_config(&self) -> LabelConfig {
        LabelConfig {
            forecast_horizon: self.forecast_horizon,
            decline_ratio: self.decline_ratio,
        }
    }

    pub fn volatility_config(&self) -> VolatilityConfig {
        VolatilityConfig {
            scale: self.volatility_scale,
            min_observations: self.garch_min_observations,
            max_iterations: self.garch_max_iterations,
            max_fit_duration: Duration::from_millis(self.garch_max_fit_ms),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
