pub mod candles;
pub mod health;
pub mod tickers;
