//! Binance Kline Source
//!
//! Pages historical klines from the public REST API (`/api/v3/klines`).

use crate::domain::errors::MarketDataError;
use crate::domain::market::kline::{RawKline, validate_symbol};
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum rows Binance returns per klines request.
pub const PAGE_LIMIT: usize = 1000;

pub struct BinanceKlineSource {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
}

impl BinanceKlineSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: HttpClientFactory::create_client(timeout),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<RawKline>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = PAGE_LIMIT.to_string();
        let start = start_ms.to_string();
        let end = end_ms.to_string();
        let url_with_query = build_url_with_query(
            &url,
            &[
                ("symbol", symbol),
                ("interval", interval),
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
                ("limit", limit.as_str()),
            ],
        );

        let mut request = self.client.get(&url_with_query);
        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch klines from Binance")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance klines fetch failed ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Binance klines response")
    }
}

/// Start time of the page following `page`, or `None` when `page` is the last one.
pub fn next_page_start(symbol: &str, page: &[RawKline]) -> Result<Option<i64>, MarketDataError> {
    if page.len() < PAGE_LIMIT {
        return Ok(None);
    }
    let last_open = page
        .last()
        .and_then(|k| k.first())
        .and_then(|v| v.as_i64())
        .ok_or_else(|| MarketDataError::InvalidData {
            symbol: symbol.to_string(),
            reason: "kline without integer open time".to_string(),
        })?;
    Ok(Some(last_open + 1))
}

#[async_trait]
impl MarketDataSource for BinanceKlineSource {
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        days: u32,
    ) -> Result<Vec<RawKline>> {
        let api_symbol = validate_symbol(symbol)?;

        let end_ms = Utc::now().timestamp_millis();
        let mut start_ms = end_ms - ChronoDuration::days(i64::from(days)).num_milliseconds();
        let mut klines = Vec::new();

        while start_ms < end_ms {
            let page = self
                .fetch_page(&api_symbol, interval, start_ms, end_ms)
                .await
                .with_context(|| format!("Error fetching data for {}", api_symbol))?;
            debug!(
                "BinanceKlineSource: {} rows from {} for {}",
                page.len(),
                start_ms,
                api_symbol
            );

            let next = next_page_start(&api_symbol, &page)?;
            klines.extend(page);
            match next {
                Some(next) if next > start_ms => start_ms = next,
                _ => break,
            }
        }

        info!(
            "BinanceKlineSource: Fetched {} klines for {} ({}, {} days)",
            klines.len(),
            api_symbol,
            interval,
            days
        );
        Ok(klines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(len: usize, first_open: i64) -> Vec<RawKline> {
        (0..len as i64)
            .map(|i| vec![json!(first_open + i * 60_000), json!("1.0")])
            .collect()
    }

    #[test]
    fn test_short_page_is_last() {
        assert_eq!(next_page_start("BTCUSDT", &page(10, 0)), Ok(None));
        assert_eq!(next_page_start("BTCUSDT", &[]), Ok(None));
    }

    #[test]
    fn test_full_page_continues_after_last_open_time() {
        let full = page(PAGE_LIMIT, 1_000);
        let last = 1_000 + (PAGE_LIMIT as i64 - 1) * 60_000;
        assert_eq!(next_page_start("BTCUSDT", &full), Ok(Some(last + 1)));
    }

    #[test]
    fn test_full_page_with_bad_open_time_is_invalid() {
        let mut full = page(PAGE_LIMIT, 0);
        full[PAGE_LIMIT - 1][0] = json!("oops");
        assert!(matches!(
            next_page_start("BTCUSDT", &full),
            Err(MarketDataError::InvalidData { .. })
        ));
    }

    #[tokio::test]
    async fn test_lowercase_symbol_fails_before_any_request() {
        let source = BinanceKlineSource::new("http://127.0.0.1:9", None, Duration::from_secs(1));
        let err = source.fetch_klines("btcusdt", "1h", 1).await.unwrap_err();
        assert!(err.downcast_ref::<MarketDataError>().is_some());
    }
}
