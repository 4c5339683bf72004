//! Collaborator contracts for the connection pool driver.
//!
//! A [`ConnectionProvider`] hands out leased connections; a connection is anything
//! [`Queryable`]. The executor, the named-query resolver and the transaction
//! coordinator are written against these two traits only.

mod connection;

pub use connection::PooledConnection;

use async_trait::async_trait;

use crate::error::PgUtilError;
use crate::results::RowSet;
use crate::types::RowValues;

/// A live database session that can run statements.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// Run `sql` with positional `params` and collect the returned rows.
    ///
    /// # Errors
    /// Returns the driver's error unchanged.
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<RowSet, PgUtilError>;

    /// Run a parameterless statement whose rows, if any, are discarded.
    ///
    /// # Errors
    /// Returns the driver's error unchanged.
    async fn execute_batch(&self, sql: &str) -> Result<(), PgUtilError> {
        self.query(sql, &[]).await.map(|_| ())
    }
}

/// Source of connections, usually a pool.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: Queryable + 'static;

    /// Acquire a connection together with its release hook.
    ///
    /// # Errors
    /// Returns the pool's error unchanged; no retry is attempted.
    async fn acquire(&self) -> Result<PooledConnection<Self::Connection>, PgUtilError>;
}

#[async_trait]
impl<C: Queryable> Queryable for PooledConnection<C> {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<RowSet, PgUtilError> {
        (**self).query(sql, params).await
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), PgUtilError> {
        (**self).execute_batch(sql).await
    }
}
