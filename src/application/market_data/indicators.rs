//! Column-wise moving averages over series with missing values.

use ta::indicators::SimpleMovingAverage;
use ta::{Next, Reset};

/// Exponentially weighted mean over all available history.
///
/// Uses the adjusted form: the output is `Σ wᵢ·xᵢ / Σ wᵢ` with weights
/// decaying by `1 - α` per row, `α = 2 / (span + 1)`. Unlike the recursive
/// form in `ta::ExponentialMovingAverage`, the first value is not used as a
/// seed, so early outputs are not biased towards it.
///
/// A missing input still ages the accumulated weights but contributes
/// nothing; the output repeats the previous mean.
pub struct AdjustedEma {
    decay: f64,
    weighted_sum: f64,
    weight_total: f64,
}

impl AdjustedEma {
    /// # Panics
    /// Panics if `span` is zero.
    pub fn new(span: usize) -> Self {
        assert!(span > 0, "EMA span must be > 0");
        let alpha = 2.0 / (span as f64 + 1.0);
        Self {
            decay: 1.0 - alpha,
            weighted_sum: 0.0,
            weight_total: 0.0,
        }
    }

    pub fn next(&mut self, value: Option<f64>) -> Option<f64> {
        self.weighted_sum *= self.decay;
        self.weight_total *= self.decay;

        if let Some(v) = value {
            self.weighted_sum += v;
            self.weight_total += 1.0;
        }

        if self.weight_total > 0.0 {
            Some(self.weighted_sum / self.weight_total)
        } else {
            None
        }
    }
}

/// Trailing simple moving average that is only defined on full windows.
///
/// A missing input invalidates every window that contains it, so the
/// underlying `ta` SMA is reset and must see `period` fresh values again.
pub struct WindowedSma {
    period: usize,
    sma: SimpleMovingAverage,
    filled: usize,
}

impl WindowedSma {
    /// # Panics
    /// Panics if `period` is zero.
    pub fn new(period: usize) -> Self {
        Self {
            period,
            sma: SimpleMovingAverage::new(period).expect("SMA period must be > 0"),
            filled: 0,
        }
    }

    pub fn next(&mut self, value: Option<f64>) -> Option<f64> {
        match value {
            Some(v) => {
                let mean = self.sma.next(v);
                self.filled = (self.filled + 1).min(self.period);
                (self.filled == self.period).then_some(mean)
            }
            None => {
                self.sma.reset();
                self.filled = 0;
                None
            }
        }
    }
}

/// Runs an indicator over a whole column.
pub fn ema_column(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let mut ema = AdjustedEma::new(span);
    values.iter().map(|v| ema.next(*v)).collect()
}

pub fn sma_column(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut sma = WindowedSma::new(period);
    values.iter().map(|v| sma.next(*v)).collect()
}
