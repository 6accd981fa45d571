use crate::domain::errors::DatasetError;
use crate::domain::market::candle_table::CandleTable;
use crate::domain::market::kline::CLOSE;
use crate::domain::ml::dataset::TrainingDataset;
use crate::domain::ml::feature_registry::{FEATURE_NAMES, row_features};
use crate::domain::ml::scaler::MinMaxScaler;
use ndarray::{Array1, Array2};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelConfig {
    /// Periods ahead the label looks
    pub forecast_horizon: usize,
    /// A future close below `close * decline_ratio` is a decline (label 0)
    pub decline_ratio: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            forecast_horizon: 3,
            decline_ratio: 0.95,
        }
    }
}

/// Builds forward-looking binary labels and the scaled training matrix.
#[derive(Debug, Clone, Default)]
pub struct TrainingSetBuilder {
    config: LabelConfig,
}

impl TrainingSetBuilder {
    pub fn new(config: LabelConfig) -> Self {
        Self { config }
    }

    /// `target[t]` is 0 when the close `h` rows later is below
    /// `close[t] * decline_ratio`, 1 otherwise, and `None` when there is no
    /// such row or either close is missing.
    pub fn targets(&self, table: &CandleTable) -> Result<Vec<Option<u8>>, DatasetError> {
        let horizon = self.config.forecast_horizon;
        if horizon == 0 {
            return Err(DatasetError::InvalidHorizon { horizon });
        }
        let close = table.column(CLOSE).ok_or_else(|| DatasetError::MissingColumn {
            column: CLOSE.to_string(),
        })?;

        Ok((0..close.len())
            .map(|t| {
                let now = close[t]?;
                let future = close.get(t + horizon).copied().flatten()?;
                Some(if future < now * self.config.decline_ratio { 0 } else { 1 })
            })
            .collect())
    }

    /// Assembles the `(features, labels)` pair, keeping only rows with a
    /// defined label and every feature present, and min-max scales each
    /// feature column on this batch.
    pub fn build(&self, table: &CandleTable) -> Result<TrainingDataset, DatasetError> {
        if let Some(column) = table.first_missing(FEATURE_NAMES) {
            return Err(DatasetError::MissingColumn {
                column: column.to_string(),
            });
        }
        let targets = self.targets(table)?;

        let mut values = Vec::with_capacity(table.len() * FEATURE_NAMES.len());
        let mut labels = Vec::with_capacity(table.len());
        let mut index = Vec::with_capacity(table.len());

        for (row, target) in targets.iter().enumerate() {
            let (Some(target), Some(features)) = (target, row_features(table, row)) else {
                continue;
            };
            values.extend(features);
            labels.push(*target);
            index.push(table.index()[row]);
        }

        if labels.is_empty() {
            return Err(DatasetError::Empty {
                input_rows: table.len(),
            });
        }
        debug!(
            "TrainingSetBuilder: kept {} of {} rows",
            labels.len(),
            table.len()
        );

        let raw = Array2::from_shape_vec((labels.len(), FEATURE_NAMES.len()), values).map_err(
            |e| DatasetError::Shape {
                reason: e.to_string(),
            },
        )?;
        let (scaler, features) = MinMaxScaler::fit_transform(&raw);

        let dataset = TrainingDataset {
            features,
            labels: Array1::from_vec(labels),
            index,
            scaler,
        };
        info!(
            "Training set: {} rows x {} features, {:.1}% without decline",
            dataset.len(),
            FEATURE_NAMES.len(),
            dataset.positive_ratio() * 100.0
        );
        Ok(dataset)
    }
}
