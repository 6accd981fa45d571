//! Raw kline rows -> typed `CandleTable`.

use crate::domain::errors::NormalizationError;
use crate::domain::market::candle_table::CandleTable;
use crate::domain::market::kline::{KLINE_FIELD_COUNT, RawKline, numeric_fields};
use serde_json::Value;
use tracing::{debug, warn};

/// Converts positional kline records into a timestamp-indexed table.
///
/// The shape of every row is checked before any column is built, so a
/// malformed batch is rejected as a whole. Individual numeric cells that
/// cannot be coerced become missing markers instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowNormalizer;

impl RowNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, klines: &[RawKline]) -> Result<CandleTable, NormalizationError> {
        let mut index = Vec::with_capacity(klines.len());

        for (row, kline) in klines.iter().enumerate() {
            if kline.len() != KLINE_FIELD_COUNT {
                return Err(NormalizationError::FieldCount {
                    row,
                    expected: KLINE_FIELD_COUNT,
                    found: kline.len(),
                });
            }
            let open_time =
                coerce_epoch_ms(&kline[0]).ok_or(NormalizationError::InvalidTimestamp { row })?;
            index.push(open_time);
        }

        let mut table = CandleTable::new(index);
        let mut coerced_missing = 0usize;

        for (position, name) in numeric_fields() {
            let values: Vec<Option<f64>> = klines
                .iter()
                .map(|kline| coerce_f64(&kline[position]))
                .collect();
            coerced_missing += values.iter().filter(|v| v.is_none()).count();

            // Length always matches: one value per validated row.
            if let Err(e) = table.set_column(name, values) {
                warn!("Normalizer column {} length mismatch: {:?}", name, e);
            }
        }

        if coerced_missing > 0 {
            warn!(
                "Normalizer: {} numeric cells across {} rows were not coercible and are missing",
                coerced_missing,
                table.len()
            );
        }
        for (column, pct) in table.missing_percentages() {
            if pct > 0.0 {
                debug!("Column {}: {:.2}% missing", column, pct);
            }
        }

        Ok(table)
    }
}

/// Numbers and numeric strings become finite floats; anything else is missing.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Integers, integral floats (`1.7e12`) and integer strings are epoch milliseconds.
fn coerce_epoch_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_ms)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_ms))
        }
        _ => None,
    }
}

fn integral_ms(v: f64) -> Option<i64> {
    // i64::MAX is not exactly representable; stay strictly below 2^63.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (v.is_finite() && v.fract() == 0.0 && v >= -LIMIT && v < LIMIT).then_some(v as i64)
}
