use crate::domain::market::candle_table::CandleTable;

pub const LOG_RETURN: &str = "log_return";
pub const TAKER_BUY_RATIO: &str = "taker_buy_ratio";
pub const LIQUIDITY_GAP: &str = "liquidity_gap";
pub const PRICE_SPREAD: &str = "price_spread";
pub const SMA_20: &str = "sma_20";
pub const EMA_12: &str = "ema_12";
pub const EMA_26: &str = "ema_26";
pub const MACD: &str = "macd";
pub const GARCH_VOLATILITY: &str = "garch_volatility";

/// Columns attached by the feature deriver, in attachment order.
pub const DERIVED_FEATURES: &[&str] = &[
    LOG_RETURN,
    TAKER_BUY_RATIO,
    LIQUIDITY_GAP,
    PRICE_SPREAD,
    SMA_20,
    EMA_12,
    EMA_26,
    MACD,
];

/// Ordered list of training matrix columns.
/// Any change here is a breaking change for models trained on earlier datasets.
pub const FEATURE_NAMES: &[&str] = &[
    LOG_RETURN,
    TAKER_BUY_RATIO,
    LIQUIDITY_GAP,
    GARCH_VOLATILITY,
    MACD,
    SMA_20,
];

/// Reads one row of the training features in `FEATURE_NAMES` order.
///
/// Returns `None` if any feature is missing for that row; rows are never
/// filled with defaults.
pub fn row_features(table: &CandleTable, row: usize) -> Option<Vec<f64>> {
    FEATURE_NAMES
        .iter()
        .map(|name| table.value(name, row))
        .collect()
}
