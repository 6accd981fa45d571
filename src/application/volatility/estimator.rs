use crate::application::volatility::garch;
use crate::application::volatility::nelder_mead::NelderMeadOptions;
use crate::domain::errors::VolatilityFitWarning;
use crate::domain::market::candle_table::CandleTable;
use crate::domain::ml::feature_registry::{GARCH_VOLATILITY, LOG_RETURN};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct VolatilityConfig {
    /// Returns are multiplied by this before fitting and volatility divided by it after
    pub scale: f64,
    pub min_observations: usize,
    pub max_iterations: usize,
    pub max_fit_duration: Duration,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            scale: 1_000.0,
            min_observations: 10,
            max_iterations: 5_000,
            max_fit_duration: Duration::from_secs(5),
        }
    }
}

/// Outcome of a volatility estimate. Both variants carry a usable table.
#[derive(Debug, Clone)]
pub enum VolatilityEstimate {
    Fitted(CandleTable),
    /// `garch_volatility` is entirely missing
    Degraded(CandleTable, VolatilityFitWarning),
}

impl VolatilityEstimate {
    pub fn table(&self) -> &CandleTable {
        match self {
            VolatilityEstimate::Fitted(table) | VolatilityEstimate::Degraded(table, _) => table,
        }
    }

    pub fn warning(&self) -> Option<&VolatilityFitWarning> {
        match self {
            VolatilityEstimate::Fitted(_) => None,
            VolatilityEstimate::Degraded(_, warning) => Some(warning),
        }
    }

    pub fn into_parts(self) -> (CandleTable, Option<VolatilityFitWarning>) {
        match self {
            VolatilityEstimate::Fitted(table) => (table, None),
            VolatilityEstimate::Degraded(table, warning) => (table, Some(warning)),
        }
    }
}

/// Attaches a GARCH(1,1) conditional volatility column to a feature table.
///
/// Best effort: every failure yields a degraded table, never an error.
#[derive(Debug, Clone, Default)]
pub struct VolatilityEstimator {
    config: VolatilityConfig,
}

impl VolatilityEstimator {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    pub fn estimate(&self, mut table: CandleTable) -> VolatilityEstimate {
        let (rows, returns): (Vec<usize>, Vec<f64>) = table
            .column(LOG_RETURN)
            .unwrap_or_default()
            .iter()
            .enumerate()
            .filter_map(|(row, r)| r.map(|r| (row, r)))
            .unzip();

        if returns.len() < self.config.min_observations {
            let reason = VolatilityFitWarning::InsufficientObservations {
                found: returns.len(),
                required: self.config.min_observations,
            };
            info!("Skipping GARCH fit: {}", reason);
            return degrade(table, reason);
        }

        let scaled: Vec<f64> = returns.iter().map(|r| r * self.config.scale).collect();
        let options = NelderMeadOptions {
            max_iterations: self.config.max_iterations,
            max_duration: self.config.max_fit_duration,
            ..Default::default()
        };

        let fit = match garch::fit(&scaled, &options) {
            Ok(fit) => fit,
            Err(reason) => {
                warn!("GARCH fit failed, volatility left missing: {}", reason);
                return degrade(table, reason);
            }
        };
        debug!(
            "GARCH(1,1) fitted in {} iterations: omega={:.6} alpha={:.4} beta={:.4} ll={:.2}",
            fit.iterations,
            fit.params.omega,
            fit.params.alpha,
            fit.params.beta,
            fit.log_likelihood
        );

        let mut volatility = vec![None; table.len()];
        for (row, sigma) in rows.into_iter().zip(fit.conditional_volatility) {
            volatility[row] = Some(sigma / self.config.scale);
        }

        match table.set_column(GARCH_VOLATILITY, volatility) {
            Ok(()) => VolatilityEstimate::Fitted(table),
            Err(e) => {
                warn!("GARCH volatility column rejected: {:?}", e);
                degrade(table, VolatilityFitWarning::NonFiniteLikelihood)
            }
        }
    }
}

fn degrade(mut table: CandleTable, reason: VolatilityFitWarning) -> VolatilityEstimate {
    let missing = vec![None; table.len()];
    // Cannot fail: the column is built from the table's own length.
    let _ = table.set_column(GARCH_VOLATILITY, missing);
    VolatilityEstimate::Degraded(table, reason)
}
