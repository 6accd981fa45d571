use crate::application::market_data::indicators::{ema_column, sma_column};
use crate::domain::errors::FeatureComputationError;
use crate::domain::market::candle_table::CandleTable;
use crate::domain::market::kline::{
    CLOSE, HIGH, LOW, OPEN, QUOTE_VOLUME, TAKER_BUY_QUOTE, VOLUME,
};
use crate::domain::ml::feature_registry::{
    DERIVED_FEATURES, EMA_12, EMA_26, LIQUIDITY_GAP, LOG_RETURN, MACD, PRICE_SPREAD, SMA_20,
    TAKER_BUY_RATIO,
};
use tracing::{debug, info};

/// Columns the deriver reads.
pub const REQUIRED_COLUMNS: &[&str] = &[OPEN, HIGH, LOW, CLOSE, VOLUME, QUOTE_VOLUME, TAKER_BUY_QUOTE];

/// Indicator windows used by [`FeatureDeriver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureWindows {
    pub sma_period: usize,
    pub ema_fast_span: usize,
    pub ema_slow_span: usize,
}

impl Default for FeatureWindows {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_fast_span: 12,
            ema_slow_span: 26,
        }
    }
}

/// Feature columns computed for every row of a table, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFeatures {
    pub log_return: Vec<Option<f64>>,
    pub taker_buy_ratio: Vec<Option<f64>>,
    pub liquidity_gap: Vec<Option<f64>>,
    pub price_spread: Vec<Option<f64>>,
    pub sma_20: Vec<Option<f64>>,
    pub ema_12: Vec<Option<f64>>,
    pub ema_26: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
}

impl DerivedFeatures {
    fn into_columns(self) -> [(&'static str, Vec<Option<f64>>); 8] {
        [
            (LOG_RETURN, self.log_return),
            (TAKER_BUY_RATIO, self.taker_buy_ratio),
            (LIQUIDITY_GAP, self.liquidity_gap),
            (PRICE_SPREAD, self.price_spread),
            (SMA_20, self.sma_20),
            (EMA_12, self.ema_12),
            (EMA_26, self.ema_26),
            (MACD, self.macd),
        ]
    }
}

/// Computes return, liquidity, spread and moving-average features.
///
/// Stateless: every call works only on the table it is given.
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    windows: FeatureWindows,
}

impl FeatureDeriver {
    pub fn new(windows: FeatureWindows) -> Self {
        Self { windows }
    }

    /// Computes all feature columns without touching the table.
    pub fn compute(&self, table: &CandleTable) -> Result<DerivedFeatures, FeatureComputationError> {
        if let Some(column) = table.first_missing(REQUIRED_COLUMNS) {
            return Err(FeatureComputationError::MissingColumn {
                column: column.to_string(),
            });
        }
        let col = |name: &str| table.column(name).unwrap_or_default();

        let open = col(OPEN);
        let high = col(HIGH);
        let low = col(LOW);
        let close = col(CLOSE);
        let quote_volume = col(QUOTE_VOLUME);
        let taker_buy_quote = col(TAKER_BUY_QUOTE);

        let log_return: Vec<Option<f64>> = (0..close.len())
            .map(|t| {
                let prev = close.get(t.checked_sub(1)?).copied().flatten()?;
                let ratio = close[t]? / prev;
                (ratio > 0.0 && ratio.is_finite()).then(|| ratio.ln())
            })
            .collect();

        let taker_buy_ratio = zip_with(taker_buy_quote, quote_volume, safe_div);
        let liquidity_gap: Vec<Option<f64>> = (0..close.len())
            .map(|t| safe_div(high[t]? - low[t]?, close[t]?))
            .collect();
        let price_spread = zip_with(close, open, |c, o| Some(c - o));

        let sma_20 = sma_column(close, self.windows.sma_period);
        let ema_12 = ema_column(close, self.windows.ema_fast_span);
        let ema_26 = ema_column(close, self.windows.ema_slow_span);
        let macd = zip_with(&ema_12, &ema_26, |fast, slow| Some(fast - slow));

        Ok(DerivedFeatures {
            log_return,
            taker_buy_ratio,
            liquidity_gap,
            price_spread,
            sma_20,
            ema_12,
            ema_26,
            macd,
        })
    }

    /// Attaches the feature columns and drops rows lacking any of them.
    ///
    /// On error the table is left exactly as it was passed in.
    pub fn derive(&self, table: &mut CandleTable) -> Result<(), FeatureComputationError> {
        let features = self.compute(table)?;

        for (name, values) in features.into_columns() {
            table
                .set_column(name, values)
                .map_err(|e| FeatureComputationError::LengthMismatch {
                    column: name.to_string(),
                    expected: e.expected,
                    found: e.found,
                })?;
        }

        let before = table.len();
        let dropped = table.drop_missing(DERIVED_FEATURES);
        debug!(
            "FeatureDeriver: dropped {} of {} rows lacking feature history",
            dropped, before
        );
        info!("Feature table ready: {} rows", table.len());
        Ok(())
    }
}

fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

fn zip_with(
    left: &[Option<f64>],
    right: &[Option<f64>],
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Vec<Option<f64>> {
    left.iter()
        .zip(right)
        .map(|(l, r)| f((*l)?, (*r)?))
        .collect()
}
