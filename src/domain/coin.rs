//! Coin metadata snapshots and the static metrics derived from them.

use crate::domain::errors::CoinDataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityRating {
    High,
    Mid,
    Low,
    Unknown,
}

impl LiquidityRating {
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s > 0.8 => LiquidityRating::High,
            Some(s) if s > 0.5 => LiquidityRating::Mid,
            Some(_) => LiquidityRating::Low,
            None => LiquidityRating::Unknown,
        }
    }
}

impl fmt::Display for LiquidityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Cleaned coin snapshot with derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMetrics {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub dev_score: Option<f64>,
    pub community: Option<i64>,
    pub liquidity: Option<f64>,
    pub ath_change: Option<f64>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,

    // Derived
    pub supply_ratio: Option<f64>,
    pub fully_diluted_valuation: Option<f64>,
    pub liquidity_rating: LiquidityRating,
}

impl CoinMetrics {
    /// Extracts metrics from a raw `/coins/{id}` payload.
    ///
    /// Missing or unconvertible fields become `None`; this never fails.
    pub fn from_raw(raw: &Value) -> Self {
        debug!("Cleaning coin metadata snapshot");

        let market = |key: &str| raw.pointer(&format!("/market_data/{}", key));
        let usd = |key: &str| raw.pointer(&format!("/market_data/{}/usd", key));

        let mut metrics = Self {
            id: text(raw.get("id")),
            symbol: text(raw.get("symbol")),
            name: text(raw.get("name")),
            dev_score: safe_float(raw.get("developer_score")),
            community: safe_int(raw.pointer("/community_data/twitter_followers")),
            liquidity: safe_float(raw.get("liquidity_score")),
            ath_change: safe_float(usd("ath_change_percentage")),
            current_price: safe_float(usd("current_price")),
            market_cap: safe_float(usd("market_cap")),
            circulating_supply: safe_float(market("circulating_supply")),
            total_supply: safe_float(market("total_supply")),
            max_supply: safe_float(market("max_supply")),
            last_updated: text(raw.get("last_updated"))
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            supply_ratio: None,
            fully_diluted_valuation: None,
            liquidity_rating: LiquidityRating::Unknown,
        };
        metrics.derive_metrics();
        metrics
    }

    fn derive_metrics(&mut self) {
        self.supply_ratio = match (self.circulating_supply, self.total_supply) {
            (Some(circulating), Some(total)) if circulating != 0.0 && total != 0.0 => {
                Some(circulating / total)
            }
            _ => None,
        };

        self.fully_diluted_valuation = match (self.current_price, self.total_supply) {
            (Some(price), Some(total)) if price != 0.0 && total != 0.0 => Some(price * total),
            _ => None,
        };

        self.liquidity_rating = LiquidityRating::from_score(self.liquidity);
    }

    /// Checks the minimum fields a snapshot needs to be usable.
    pub fn validate(&self) -> Result<(), CoinDataError> {
        if self.id.as_deref().is_none_or(str::is_empty) {
            return Err(CoinDataError::MissingField { field: "id" });
        }
        if self.symbol.as_deref().is_none_or(str::is_empty) {
            return Err(CoinDataError::MissingField { field: "symbol" });
        }
        let price = self
            .current_price
            .ok_or(CoinDataError::MissingField { field: "current_price" })?;
        if self.market_cap.is_none() {
            return Err(CoinDataError::MissingField { field: "market_cap" });
        }
        if price <= 0.0 {
            return Err(CoinDataError::InvalidPrice { price });
        }
        Ok(())
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Lenient float coercion: numbers and numeric strings convert, anything else is `None`.
pub fn safe_float(value: Option<&Value>) -> Option<f64> {
    let converted = match value? {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    if converted.is_none() {
        warn!("Value not convertible to float: {:?}", value);
    }
    converted.filter(|v| v.is_finite())
}

/// Lenient integer coercion; floats are truncated.
pub fn safe_int(value: Option<&Value>) -> Option<i64> {
    let converted = match value? {
        Value::Null => return None,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };

    if converted.is_none() {
        warn!("Value not convertible to int: {:?}", value);
    }
    converted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bitcoin() -> Value {
        json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "developer_score": 99.2,
            "liquidity_score": "0.9",
            "community_data": { "twitter_followers": 6_000_000 },
            "market_data": {
                "current_price": { "usd": 60_000.0 },
                "market_cap": { "usd": 1.2e12 },
                "ath_change_percentage": { "usd": -12.5 },
                "circulating_supply": 19_000_000.0,
                "total_supply": 21_000_000.0,
                "max_supply": 21_000_000.0
            },
            "last_updated": "2024-05-01T12:00:00.000Z"
        })
    }

    #[test]
    fn test_from_raw_extracts_and_derives() {
        let metrics = CoinMetrics::from_raw(&bitcoin());

        assert_eq!(metrics.id.as_deref(), Some("bitcoin"));
        assert_eq!(metrics.community, Some(6_000_000));
        assert_eq!(metrics.liquidity, Some(0.9));
        assert_eq!(metrics.liquidity_rating, LiquidityRating::High);
        assert!((metrics.supply_ratio.unwrap() - 19.0 / 21.0).abs() < 1e-12);
        assert_eq!(metrics.fully_diluted_valuation, Some(60_000.0 * 21_000_000.0));
        assert!(metrics.last_updated.is_some());
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_become_none() {
        let metrics = CoinMetrics::from_raw(&json!({ "id": "dust" }));

        assert!(metrics.current_price.is_none());
        assert!(metrics.supply_ratio.is_none());
        assert_eq!(metrics.liquidity_rating, LiquidityRating::Unknown);
        assert_eq!(
            metrics.validate(),
            Err(CoinDataError::MissingField { field: "symbol" })
        );
    }

    #[test]
    fn test_liquidity_rating_thresholds() {
        assert_eq!(LiquidityRating::from_score(Some(0.81)), LiquidityRating::High);
        assert_eq!(LiquidityRating::from_score(Some(0.8)), LiquidityRating::Mid);
        assert_eq!(LiquidityRating::from_score(Some(0.5)), LiquidityRating::Low);
        assert_eq!(LiquidityRating::from_score(None), LiquidityRating::Unknown);
    }

    #[test]
    fn test_safe_coercions() {
        assert_eq!(safe_float(Some(&json!("1.5"))), Some(1.5));
        assert_eq!(safe_float(Some(&json!("n/a"))), None);
        assert_eq!(safe_float(Some(&json!(null))), None);
        assert_eq!(safe_int(Some(&json!(12.9))), Some(12));
        assert_eq!(safe_int(Some(&json!({}))), None);
    }

    #[test]
    fn test_non_positive_price_is_invalid() {
        let mut raw = bitcoin();
        raw["market_data"]["current_price"]["usd"] = json!(0.0);
        let metrics = CoinMetrics::from_raw(&raw);
        assert_eq!(
            metrics.validate(),
            Err(CoinDataError::InvalidPrice { price: 0.0 })
        );
    }
}
