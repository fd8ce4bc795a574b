use anyhow::Result;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use dotenvy::dotenv;

use crate::utils::db::PgPool;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pool: PgPool,
}

impl AppConfig {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variables");
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::new(manager)?;

        Ok(Self::new(pool))
    }
}
