use diesel_async::pooled_connection::deadpool::{BuildError, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncPgConnection>;

/// Connections the gateway may hold open at once.
const MAX_CONNECTIONS: usize = 20;

/// Build the Postgres pool. Connections are opened lazily, on first use.
pub async fn connect(database_url: &str) -> Result<DbPool, BuildError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager).max_size(MAX_CONNECTIONS).build()?;

    tracing::info!(max_connections = MAX_CONNECTIONS, "database pool created");
    Ok(pool)
}
