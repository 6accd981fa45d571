use crate::domain::ml::feature_registry::FEATURE_NAMES;
use crate::domain::ml::scaler::MinMaxScaler;
use ndarray::{Array1, Array2};

/// Model-ready feature matrix and binary labels.
///
/// Row `i` of `features`, `labels[i]` and `index[i]` describe the same candle.
/// Matrix columns follow [`FEATURE_NAMES`].
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    pub features: Array2<f64>,
    pub labels: Array1<u8>,
    /// Open times (epoch ms) of the kept rows
    pub index: Vec<i64>,
    /// Scaling bounds fitted on this batch
    pub scaler: MinMaxScaler,
}

impl TrainingDataset {
    pub fn feature_names(&self) -> &'static [&'static str] {
        FEATURE_NAMES
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Share of rows labelled 1 (no horizon decline).
    pub fn positive_ratio(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&y| y == 1).count() as f64 / self.len() as f64
    }
}
