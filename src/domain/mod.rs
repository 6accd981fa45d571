// Candle data model
pub mod market;

// Coin metadata snapshots
pub mod coin;

// Model-facing feature layout
pub mod ml;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
