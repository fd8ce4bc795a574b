use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;

use crate::utils::errors::MarketDataError;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConn = PooledConnection<ConnectionManager<PgConnection>>;

pub fn get_conn(pool: &PgPool) -> Result<PgPooledConn, MarketDataError> {
    let conn = pool.get()?;

    Ok(conn)
}
