use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning raw kline rows into a `CandleTable`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("Malformed kline at row {row}: expected {expected} fields, found {found}")]
    FieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Malformed kline at row {row}: open time is not an epoch-millisecond integer")]
    InvalidTimestamp { row: usize },
}

/// Errors raised by the feature deriver before any column is attached
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureComputationError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Column {column} has {found} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Reasons a volatility fit degraded to an all-missing column.
///
/// Never fatal: the estimator converts every variant into a degraded table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VolatilityFitWarning {
    #[error("Only {found} return observations, need at least {required}")]
    InsufficientObservations { found: usize, required: usize },

    #[error("Return series contains non-finite values")]
    NonFiniteReturns,

    #[error("Return series has zero variance")]
    DegenerateSeries,

    #[error("Likelihood is not finite at the starting point")]
    NonFiniteLikelihood,

    #[error("Optimizer did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("Optimizer exceeded its time budget of {budget_ms}ms")]
    TimedOut { budget_ms: u64 },
}

/// Errors raised while building labels and the training matrix
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    #[error("Forecast horizon must be at least 1, got {horizon}")]
    InvalidHorizon { horizon: usize },

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("No complete rows left after filtering ({input_rows} input rows)")]
    Empty { input_rows: usize },

    #[error("Failed to assemble feature matrix: {reason}")]
    Shape { reason: String },
}

/// Errors raised while writing or reading a processed table
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Filename {filename:?} has no usable base name")]
    InvalidFilename { filename: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed processed file {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("No output directory configured for {filename:?}")]
    NotConfigured { filename: String },
}

/// Errors related to the market data and metadata collaborators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Symbol must be upper case (e.g. BTCUSDT), got {symbol:?}")]
    InvalidSymbol { symbol: String },

    #[error("Invalid market data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },
}

/// Errors raised by coin metadata validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoinDataError {
    #[error("Required field missing: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid current price: {price}")]
    InvalidPrice { price: f64 },
}

/// Halting failures of the feature pipeline.
///
/// Volatility degradation is not part of this enum because it never halts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Market data fetch failed: {0:#}")]
    Source(anyhow::Error),

    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Feature computation failed: {0}")]
    Features(#[from] FeatureComputationError),

    #[error("Dataset preparation failed: {0}")]
    Dataset(#[from] DatasetError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_error_formatting() {
        let error = NormalizationError::FieldCount {
            row: 4,
            expected: 12,
            found: 6,
        };

        let msg = error.to_string();
        assert!(msg.contains("row 4"));
        assert!(msg.contains("12"));
        assert!(msg.contains("6"));
    }

    #[test]
    fn test_volatility_warning_formatting() {
        let warning = VolatilityFitWarning::InsufficientObservations {
            found: 7,
            required: 10,
        };

        let msg = warning.to_string();
        assert!(msg.contains("7"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_pipeline_error_wraps_stage_error() {
        let error: PipelineError = FeatureComputationError::MissingColumn {
            column: "close".to_string(),
        }
        .into();

        assert!(error.to_string().contains("close"));
        assert!(matches!(error, PipelineError::Features(_)));
    }
}
