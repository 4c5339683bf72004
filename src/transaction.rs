use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::error::PgUtilError;
use crate::executor::{Db, query_on};
use crate::named::{QueryRegistry, resolve_named};
use crate::pool::{ConnectionProvider, PooledConnection, Queryable};
use crate::results::{Row, RowSet};
use crate::types::RowValues;

const BEGIN: &str = "BEGIN";
const COMMIT: &str = "COMMIT";
const ROLLBACK: &str = "ROLLBACK";

/// Executor surface bound to the one connection of a running transaction.
///
/// Handed to the closure given to [`Db::run_in_transaction`]; it cannot outlive that call.
pub struct TxContext<'t, C> {
    conn: &'t C,
    registry: Option<&'t QueryRegistry>,
}

impl<C: Queryable> TxContext<'_, C> {
    /// The transaction's connection, for code written against [`Queryable`] directly.
    #[must_use]
    pub fn connection(&self) -> &C {
        self.conn
    }

    /// # Errors
    /// Returns the driver's error unchanged.
    pub async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<RowSet, PgUtilError> {
        query_on(self.conn, sql, params).await
    }

    /// # Errors
    /// Returns the driver's error unchanged.
    pub async fn fetch_first(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Row>, PgUtilError> {
        Ok(self.execute(sql, params).await?.into_first())
    }

    /// # Errors
    /// Returns `PgUtilError::NoQueryRegistry`, `PgUtilError::UnknownQuery`, or the driver's error.
    pub async fn run(&self, name: &str, params: &[RowValues]) -> Result<RowSet, PgUtilError> {
        let sql = resolve_named(self.registry, name)?;
        query_on(self.conn, sql, params).await
    }

    /// # Errors
    /// See [`TxContext::run`].
    pub async fn first(&self, name: &str, params: &[RowValues]) -> Result<Option<Row>, PgUtilError> {
        Ok(self.run(name, params).await?.into_first())
    }
}

impl<P: ConnectionProvider> Db<P> {
    /// Run `work` inside a single transaction on one connection.
    ///
    /// The connection is acquired, `BEGIN` is issued, and `work` receives a [`TxContext`]
    /// bound to that connection. If `work` succeeds the transaction is committed; if it
    /// fails the transaction is rolled back and the error from `work` is returned as-is,
    /// whatever the rollback did. The connection is released on every path.
    ///
    /// If the returned future is dropped or `work` panics while the transaction is open,
    /// a `ROLLBACK` is spawned on the current tokio runtime and the connection is released
    /// only once it has run, so the pool never hands out a connection mid-transaction.
    ///
    /// ```rust,no_run
    /// use pg_util::prelude::*;
    ///
    /// # async fn demo(db: &Db<PgProvider>) -> Result<(), PgUtilError> {
    /// let count = db
    ///     .run_in_transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.execute("INSERT INTO audit (msg) VALUES ($1)", &[RowValues::from("hello")])
    ///                 .await?;
    ///             let rows = tx.execute("SELECT count(*) AS n FROM audit", &[]).await?;
    ///             Ok::<_, PgUtilError>(rows.len())
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = count;
    /// # Ok(()) }
    /// ```
    ///
    /// # Errors
    /// Returns acquisition, `BEGIN` or `COMMIT` errors converted into `E`, or the error
    /// returned by `work`.
    pub async fn run_in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t TxContext<'t, P::Connection>) -> BoxFuture<'t, Result<T, E>>,
        E: From<PgUtilError>,
    {
        let conn = self.provider().acquire().await?;
        trace!("acquired connection for transaction");
        let mut guard = TxGuard::new(conn);
        let outcome = transact(&mut guard, self.registry(), work).await;
        drop(guard);
        outcome
    }
}

/// Owns the transaction's lease and rolls back on drop while the transaction is open.
struct TxGuard<C: Queryable + 'static> {
    conn: Option<PooledConnection<C>>,
    open: bool,
}

impl<C: Queryable + 'static> TxGuard<C> {
    fn new(conn: PooledConnection<C>) -> Self {
        Self {
            conn: Some(conn),
            open: false,
        }
    }

    fn conn(&self) -> Result<&C, PgUtilError> {
        self.conn.as_deref().ok_or_else(|| {
            PgUtilError::ConnectionError("transaction connection already released".into())
        })
    }
}

impl<C: Queryable + 'static> Drop for TxGuard<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !self.open {
            conn.release();
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                warn!("transaction abandoned while open; rolling back before release");
                handle.spawn(async move {
                    rollback(&*conn).await;
                    conn.release();
                });
            }
            Err(_) => {
                warn!("transaction abandoned outside a tokio runtime; released without rollback");
            }
        }
    }
}

async fn transact<C, T, E, F>(
    guard: &mut TxGuard<C>,
    registry: Option<&QueryRegistry>,
    work: F,
) -> Result<T, E>
where
    C: Queryable + 'static,
    F: for<'t> FnOnce(&'t TxContext<'t, C>) -> BoxFuture<'t, Result<T, E>>,
    E: From<PgUtilError>,
{
    // Armed before BEGIN: a BEGIN cancelled in flight may still have reached the server.
    guard.open = true;
    if let Err(err) = guard.conn()?.execute_batch(BEGIN).await {
        guard.open = false;
        return Err(err.into());
    }
    debug!("transaction started");

    let ctx = TxContext {
        conn: guard.conn()?,
        registry,
    };
    let outcome = work(&ctx).await;

    let result = match outcome {
        Ok(value) => match guard.conn()?.execute_batch(COMMIT).await {
            Ok(()) => {
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "commit failed; rolling back");
                rollback(guard.conn()?).await;
                Err(err.into())
            }
        },
        Err(err) => {
            rollback(guard.conn()?).await;
            Err(err)
        }
    };
    guard.open = false;
    result
}

async fn rollback<C: Queryable + ?Sized>(conn: &C) {
    match conn.execute_batch(ROLLBACK).await {
        Ok(()) => debug!("transaction rolled back"),
        Err(err) => warn!(error = %err, "rollback failed"),
    }
}
