use crate::domain::coin::CoinMetrics;
use crate::domain::ports::CoinMetadataSource;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Query flags for `/coins/{id}`: market, community and developer data plus
/// tickers (for the liquidity score), without localization or sparkline.
const COIN_QUERY: [(&str, &str); 6] = [
    ("localization", "false"),
    ("tickers", "true"),
    ("market_data", "true"),
    ("community_data", "true"),
    ("developer_data", "true"),
    ("sparkline", "false"),
];

pub struct CoinGeckoClient {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("COINGECKO_API_KEY not set, using public mode (reduced rate limit)");
        }

        Self {
            client: HttpClientFactory::create_client(timeout),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn coin_url(&self, coin_id: &str) -> String {
        build_url_with_query(&format!("{}/coins/{}", self.base_url, coin_id), &COIN_QUERY)
    }

    /// Fetches and cleans the metadata snapshot for `coin_id`.
    pub async fn coin_metrics(&self, coin_id: &str) -> Result<CoinMetrics> {
        let raw = self.fetch_coin(coin_id).await?;
        let metrics = CoinMetrics::from_raw(&raw);
        metrics
            .validate()
            .with_context(|| format!("Invalid metadata for {}", coin_id))?;
        Ok(metrics)
    }
}

#[async_trait]
impl CoinMetadataSource for CoinGeckoClient {
    async fn fetch_coin(&self, coin_id: &str) -> Result<serde_json::Value> {
        if coin_id.trim().is_empty() {
            anyhow::bail!("Coin id must not be empty");
        }
        info!("CoinGeckoClient: Fetching metadata for {}", coin_id);

        let mut request = self
            .client
            .get(self.coin_url(coin_id))
            .header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch coin data from CoinGecko")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko request failed ({}): {}", status, error_text);
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse CoinGecko response")?;

        if let Some(keys) = raw.as_object().map(|o| o.keys().cloned().collect::<Vec<_>>()) {
            debug!("CoinGecko payload keys: {:?}", keys);
        }
        Ok(raw)
    }
}
