pub mod anchor;
pub mod builder;
pub mod db_types;
pub mod merger;
pub mod ohlc;
pub mod padding;
pub mod queries;
pub mod resolution;
