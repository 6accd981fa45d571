pub mod market_data;

pub use market_data::BinanceKlineSource;
