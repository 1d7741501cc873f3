//! Store connection handling.
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use url::Url;

use crate::config;

/// Startup failures while reaching the store.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid connection string: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("cannot reach {host} after {attempts} attempt(s): {source}")]
    Unreachable {
        host: String,
        attempts: u32,
        source: sqlx::Error,
    },

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Pooled PostgreSQL handle.
#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Init database connections.
    ///
    /// The first connection is tried `connect_attempts` times before
    /// giving up; nothing else in the service may start before it
    /// succeeds.
    pub async fn connect(
        url: &str,
        options: &config::Database,
    ) -> Result<Self, ConnectionError> {
        let host = host_of(url)?;
        let attempts = options.connect_attempts.max(1);
        let pool = PgPoolOptions::new()
            .max_connections(options.pool_size)
            .acquire_timeout(options.acquire_timeout());

        let mut attempt = 1;
        let postgres = loop {
            match pool.clone().connect(url).await {
                Ok(postgres) => break postgres,
                Err(source) if attempt >= attempts => {
                    return Err(ConnectionError::Unreachable {
                        host,
                        attempts,
                        source,
                    });
                },
                Err(err) => {
                    tracing::warn!(%host, attempt, error = %err, "postgres connection failed, retrying");
                    tokio::time::sleep(options.retry_delay()).await;
                    attempt += 1;
                },
            }
        };

        tracing::info!(%host, "postgres connected");

        Ok(Self { postgres })
    }

    /// Execute migrations scripts.
    pub async fn migrate(&self) -> Result<(), ConnectionError> {
        sqlx::migrate!().run(&self.postgres).await?;
        Ok(())
    }
}

/// Host and port of a connection string, without credentials.
pub fn host_of(url: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(url)?;
    let host = url.host_str().unwrap_or("localhost");

    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}
