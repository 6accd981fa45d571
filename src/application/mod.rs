// Raw klines to typed, feature-enriched tables
pub mod market_data;

// GARCH(1,1) conditional volatility
pub mod volatility;

// Labels and scaled training matrices
pub mod ml;

// Stage orchestrator
pub mod pipeline;

pub use pipeline::{BatchInput, FeaturePipeline, PipelineReport, PipelineStage};
