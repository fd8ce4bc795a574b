pub mod api;
pub mod klines;
pub mod schema;
pub mod store;
pub mod tickers;
pub mod trades;
pub mod utils;
pub mod workers;
