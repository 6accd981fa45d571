pub mod binance;
pub mod coingecko;
pub mod core;
pub mod persistence;

pub use binance::BinanceKlineSource;
pub use coingecko::CoinGeckoClient;
pub use persistence::ProcessedDataStore;
