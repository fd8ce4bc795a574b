pub mod commit;
pub mod db_types;
