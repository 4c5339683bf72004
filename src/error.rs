use std::path::PathBuf;

use thiserror::Error;

#[cfg(feature = "postgres")]
use deadpool_postgres::PoolError;

#[derive(Debug, Error)]
pub enum PgUtilError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("unknown query: {0}")]
    UnknownQuery(String),

    #[error("named queries are unavailable: no query directory configured")]
    NoQueryRegistry,

    #[error("failed to load query files from {}: {source}", path.display())]
    QueryLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl PgUtilError {
    /// The SQLSTATE code reported by the server, if this error came from one.
    ///
    /// The code is handed back as-is; nothing in this crate branches on it.
    #[must_use]
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            #[cfg(feature = "postgres")]
            PgUtilError::Postgres(err) => err.code().map(tokio_postgres::error::SqlState::code),
            #[cfg(feature = "postgres")]
            PgUtilError::Pool(PoolError::Backend(err)) => {
                err.code().map(tokio_postgres::error::SqlState::code)
            }
            _ => None,
        }
    }
}
