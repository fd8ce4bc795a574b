pub mod config;
pub mod context;
pub mod retention;
pub mod scheduler;
