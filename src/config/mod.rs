//! Configuration module for klinelab.
//!
//! Loads structured configuration from environment variables, organized by
//! concern: data sources and pipeline tuning.

mod pipeline_config;
mod source_config;

pub use pipeline_config::PipelineEnvConfig;
pub use source_config::{BinanceConfig, CoinGeckoConfig, SourceEnvConfig};

use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: SourceEnvConfig,
    pub pipeline: PipelineEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let sources = SourceEnvConfig::from_env();
        let pipeline = PipelineEnvConfig::from_env().context("Failed to load pipeline config")?;

        Ok(Self { sources, pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    // Tests mutate process-wide environment variables
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn get_env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const KEYS: [&str; 12] = [
        "PROCESSED_DATA_DIR",
        "FORECAST_HORIZON",
        "DECLINE_RATIO",
        "VOLATILITY_SCALE",
        "GARCH_MIN_OBSERVATIONS",
        "GARCH_MAX_ITERATIONS",
        "GARCH_MAX_FIT_MS",
        "HTTP_TIMEOUT_SECS",
        "BINANCE_API_KEY",
        "BINANCE_BASE_URL",
        "COINGECKO_API_KEY",
        "COINGECKO_BASE_URL",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = get_env_lock().lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.pipeline.processed_data_dir, std::path::Path::new("data/processed"));
        assert_eq!(config.pipeline.label_config().forecast_horizon, 3);
        assert!((config.pipeline.label_config().decline_ratio - 0.95).abs() < 1e-12);
        let volatility = config.pipeline.volatility_config();
        assert!((volatility.scale - 1000.0).abs() < 1e-12);
        assert_eq!(volatility.min_observations, 10);
        assert_eq!(volatility.max_fit_duration, Duration::from_secs(5));
        assert_eq!(config.pipeline.http_timeout(), Duration::from_secs(10));
        assert!(config.sources.binance.api_key.is_none());
        assert_eq!(config.sources.binance.base_url, "https://api.binance.com");
        assert_eq!(
            config.sources.coingecko.base_url,
            "https://api.coingecko.com/api/v3"
        );
    }

    #[test]
    fn test_overrides() {
        let _guard = get_env_lock().lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("FORECAST_HORIZON", "5");
            env::set_var("DECLINE_RATIO", "0.9");
            env::set_var("GARCH_MAX_FIT_MS", "250");
            env::set_var("COINGECKO_API_KEY", "demo-key");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.pipeline.forecast_horizon, 5);
        assert!((config.pipeline.decline_ratio - 0.9).abs() < 1e-12);
        assert_eq!(
            config.pipeline.volatility_config().max_fit_duration,
            Duration::from_millis(250)
        );
        assert_eq!(config.sources.coingecko.api_key.as_deref(), Some("demo-key"));

        clear_env();
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let _guard = get_env_lock().lock().unwrap();
        clear_env();

        unsafe { env::set_var("FORECAST_HORIZON", "soon") };
        let err = Config::from_env().unwrap_err();
        assert!(format!("{:#}", err).contains("FORECAST_HORIZON"));

        unsafe { env::set_var("FORECAST_HORIZON", "0") };
        assert!(Config::from_env().is_err());

        clear_env();
    }
}
