// Market data processing modules
pub mod feature_engineering_service;
pub mod indicators;
pub mod normalizer;
