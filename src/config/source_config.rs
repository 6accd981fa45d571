//! Market data source configuration parsing from environment variables.
//!
//! - Binance (klines)
//! - CoinGecko (coin metadata)

use std::env;

/// Binance API configuration
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl BinanceConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var("BINANCE_API_KEY"),
            base_url: env::var("BINANCE_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
        }
    }
}

/// CoinGecko API configuration. Public mode when no key is set.
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl CoinGeckoConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var("COINGECKO_API_KEY"),
            base_url: env::var("COINGECKO_BASE_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
        }
    }
}

/// Aggregated data source configuration
#[derive(Debug, Clone)]
pub struct SourceEnvConfig {
    pub binance: BinanceConfig,
    pub coingecko: CoinGeckoConfig,
}

impl SourceEnvConfig {
    pub fn from_env() -> Self {
        Self {
            binance: BinanceConfig::from_env(),
            coingecko: CoinGeckoConfig::from_env(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
