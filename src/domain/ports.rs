use crate::domain::market::kline::RawKline;
use anyhow::Result;
use async_trait::async_trait;

/// Source of raw candle rows (e.g. an exchange REST API).
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches klines for `symbol` covering the last `days` days, oldest first.
    async fn fetch_klines(&self, symbol: &str, interval: &str, days: u32)
    -> Result<Vec<RawKline>>;
}

/// Source of raw coin metadata snapshots.
#[async_trait]
pub trait CoinMetadataSource: Send + Sync {
    async fn fetch_coin(&self, coin_id: &str) -> Result<serde_json::Value>;
}
