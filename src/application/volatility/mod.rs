// Conditional volatility modelling
pub mod estimator;
pub mod garch;
pub mod nelder_mead;
