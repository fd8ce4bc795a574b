pub mod cache;
pub mod db_types;
pub mod refresher;
