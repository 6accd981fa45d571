//! Feature Pipeline
//!
//! Sequences the processing stages for one instrument's klines:
//! 1. **Normalization** - raw rows into a typed `CandleTable`
//! 2. **Feature derivation** - returns, liquidity, spread, moving averages
//! 3. **Volatility estimation** - GARCH(1,1) conditional volatility (best effort)
//! 4. **Persistence** - optional CSV snapshot of the enriched table
//!
//! Stages run strictly in order on one table. Independent instruments may
//! run in parallel through [`FeaturePipeline::run_batch`].

use crate::application::market_data::feature_engineering_service::FeatureDeriver;
use crate::application::market_data::normalizer::RowNormalizer;
use crate::application::ml::training_set::TrainingSetBuilder;
use crate::application::volatility::estimator::VolatilityEstimator;
use crate::domain::errors::{DatasetError, PersistenceError, PipelineError, VolatilityFitWarning};
use crate::domain::market::candle_table::CandleTable;
use crate::domain::market::kline::RawKline;
use crate::domain::ml::dataset::TrainingDataset;
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::persistence::ProcessedDataStore;
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    RawInput,
    Normalized,
    FeatureEnriched,
    VolatilityEstimated,
    Persisted,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub table: CandleTable,
    /// Last stage reached
    pub stage: PipelineStage,
    /// Set when the volatility column was left missing
    pub volatility_warning: Option<VolatilityFitWarning>,
    /// `None` when no destination was requested
    pub persisted: Option<Result<PathBuf, PersistenceError>>,
}

/// One instrument's input to a batch run.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub symbol: String,
    pub klines: Vec<RawKline>,
    /// Persistence destination for this instrument, if any
    pub save_as: Option<String>,
}

/// Result of one instrument in a batch run.
#[derive(Debug)]
pub struct BatchRunResult {
    pub symbol: String,
    pub report: Option<PipelineReport>,
}

/// Stateless orchestrator over the processing stages.
///
/// Holds configuration only, so one instance can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    normalizer: RowNormalizer,
    deriver: FeatureDeriver,
    estimator: VolatilityEstimator,
    training: TrainingSetBuilder,
    store: Option<ProcessedDataStore>,
}

impl FeaturePipeline {
    pub fn new(
        deriver: FeatureDeriver,
        estimator: VolatilityEstimator,
        training: TrainingSetBuilder,
        store: Option<ProcessedDataStore>,
    ) -> Self {
        Self {
            normalizer: RowNormalizer::new(),
            deriver,
            estimator,
            training,
            store,
        }
    }

    /// Runs every stage, stopping at the first halting failure.
    pub fn execute(
        &self,
        klines: &[RawKline],
        save_as: Option<&str>,
    ) -> Result<PipelineReport, PipelineError> {
        debug!("Pipeline stage {}: {} rows", PipelineStage::RawInput, klines.len());

        let mut table = self.normalizer.normalize(klines)?;
        debug!("Pipeline stage {}: {} rows", PipelineStage::Normalized, table.len());

        self.deriver.derive(&mut table)?;
        debug!("Pipeline stage {}: {} rows", PipelineStage::FeatureEnriched, table.len());

        let (table, volatility_warning) = self.estimator.estimate(table).into_parts();
        let mut stage = PipelineStage::VolatilityEstimated;
        debug!("Pipeline stage {}: {} rows", stage, table.len());

        let persisted = save_as.map(|filename| self.persist(&table, filename));
        if matches!(persisted, Some(Ok(_))) {
            stage = PipelineStage::Persisted;
        }

        Ok(PipelineReport {
            table,
            stage,
            volatility_warning,
            persisted,
        })
    }

    /// Like [`execute`](Self::execute), but logs the cause and returns `None` on failure.
    pub fn run(&self, klines: &[RawKline], save_as: Option<&str>) -> Option<PipelineReport> {
        match self.execute(klines, save_as) {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Pipeline halted: {}", e);
                None
            }
        }
    }

    /// Runs independent instruments in parallel; each run stays sequential.
    pub fn run_batch(&self, batches: Vec<BatchInput>) -> Vec<BatchRunResult> {
        batches
            .into_par_iter()
            .map(|input| {
                let BatchInput {
                    symbol,
                    klines,
                    save_as,
                } = input;
                let report = self.run(&klines, save_as.as_deref());
                if report.is_none() {
                    warn!("No result for {}", symbol);
                }
                BatchRunResult { symbol, report }
            })
            .collect()
    }

    /// Fetches klines from `source` and runs the pipeline on them.
    pub async fn process_symbol(
        &self,
        source: &dyn MarketDataSource,
        symbol: &str,
        interval: &str,
        days: u32,
        save_as: Option<&str>,
    ) -> Result<PipelineReport, PipelineError> {
        let klines = source
            .fetch_klines(symbol, interval, days)
            .await
            .map_err(PipelineError::Source)?;
        info!("Fetched {} klines for {} ({})", klines.len(), symbol, interval);
        self.execute(&klines, save_as)
    }

    /// Runs every stage and builds the training set from the result.
    ///
    /// Unlike [`prepare_training_data`](Self::prepare_training_data), an
    /// unusable dataset halts the run.
    pub fn execute_for_training(
        &self,
        klines: &[RawKline],
        save_as: Option<&str>,
    ) -> Result<(PipelineReport, TrainingDataset), PipelineError> {
        let report = self.execute(klines, save_as)?;
        let dataset = self.prepare_training_data(&report)?;
        Ok((report, dataset))
    }

    /// Labels and scales a finished table for training.
    pub fn prepare_training_data(
        &self,
        report: &PipelineReport,
    ) -> Result<TrainingDataset, DatasetError> {
        self.training.build(&report.table)
    }

    fn persist(&self, table: &CandleTable, filename: &str) -> Result<PathBuf, PersistenceError> {
        let Some(store) = &self.store else {
            return Err(PersistenceError::NotConfigured {
                filename: filename.to_string(),
            });
        };

        match store.save(table, filename) {
            Ok(path) => Ok(path),
            Err(e) => {
                error!("Failed to save processed data: {}", e);
                Err(e)
            }
        }
    }
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new(
            FeatureDeriver::default(),
            VolatilityEstimator::default(),
            TrainingSetBuilder::default(),
            None,
        )
    }
}
