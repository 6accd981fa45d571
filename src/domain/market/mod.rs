// Candle data model
pub mod candle_table;
pub mod kline;
