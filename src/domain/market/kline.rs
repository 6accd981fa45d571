use crate::domain::errors::MarketDataError;

/// One raw exchange kline, positional and untyped.
///
/// Binance serves prices and volumes as JSON strings and times as integers,
/// so every cell stays a `serde_json::Value` until normalization.
pub type RawKline = Vec<serde_json::Value>;

/// Number of positional fields in a kline record.
pub const KLINE_FIELD_COUNT: usize = 12;

/// Positional layout of a kline record.
///
/// `open_time` becomes the table index and `ignore` is discarded; every other
/// field is a numeric column.
pub const KLINE_FIELDS: [&str; KLINE_FIELD_COUNT] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trades",
    "taker_buy_base",
    "taker_buy_quote",
    "ignore",
];

pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const QUOTE_VOLUME: &str = "quote_volume";
pub const TAKER_BUY_QUOTE: &str = "taker_buy_quote";

/// Numeric columns produced by the normalizer, in table order.
pub fn numeric_fields() -> impl Iterator<Item = (usize, &'static str)> {
    KLINE_FIELDS
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, name)| *name != "open_time" && *name != "ignore")
}

/// Validates an exchange symbol and returns it in API form.
///
/// Accepts the slash form used for display (`BTC/USDT`) and strips it.
///
/// # Example
/// ```
/// use klinelab::domain::market::kline::validate_symbol;
///
/// assert_eq!(validate_symbol("BTCUSDT").unwrap(), "BTCUSDT");
/// assert_eq!(validate_symbol("ETH/USDT").unwrap(), "ETHUSDT");
/// assert!(validate_symbol("btcusdt").is_err());
/// ```
pub fn validate_symbol(symbol: &str) -> Result<String, MarketDataError> {
    let api_symbol: String = symbol.chars().filter(|c| *c != '/').collect();

    let valid = !api_symbol.is_empty()
        && api_symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if valid {
        Ok(api_symbol)
    } else {
        Err(MarketDataError::InvalidSymbol {
            symbol: symbol.to_string(),
        })
    }
}
