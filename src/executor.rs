use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::PgUtilError;
use crate::named::QueryRegistry;
use crate::pool::{ConnectionProvider, PooledConnection, Queryable};
use crate::results::{Row, RowSet};
use crate::target::ConnectionTarget;
use crate::types::RowValues;

/// Entry point for running SQL against a connection provider.
///
/// Raw SQL is always available. Named queries ([`Db::run`], [`Db::first`]) need a
/// [`QueryRegistry`], attached with [`Db::with_registry`] or [`Db::with_query_dir`].
#[derive(Debug, Clone)]
pub struct Db<P> {
    provider: P,
    registry: Option<Arc<QueryRegistry>>,
}

impl<P: ConnectionProvider> Db<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            registry: None,
        }
    }

    /// Attach a named-query registry.
    #[must_use]
    pub fn with_registry(mut self, registry: QueryRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Load every query file under `root` and attach the resulting registry.
    ///
    /// # Errors
    /// Returns `PgUtilError::QueryLoad` if the directory or any query file cannot be read.
    pub fn with_query_dir(self, root: impl AsRef<Path>) -> Result<Self, PgUtilError> {
        let registry = QueryRegistry::load(root)?;
        Ok(self.with_registry(registry))
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn registry(&self) -> Option<&QueryRegistry> {
        self.registry.as_deref()
    }

    /// Acquire a connection the caller owns until it calls
    /// [`PooledConnection::release`] or drops it.
    ///
    /// # Errors
    /// Returns the provider's acquisition error unchanged.
    pub async fn get_connection(&self) -> Result<PooledConnection<P::Connection>, PgUtilError> {
        self.provider.acquire().await
    }

    /// Run `sql` with positional `params` and return every row.
    ///
    /// With [`Implicit`](ConnectionTarget::Implicit) a connection is acquired for this call
    /// and released before the result or error is returned. An explicit connection is
    /// left to its owner.
    ///
    /// # Errors
    /// Returns acquisition or driver errors unchanged.
    pub async fn execute<'c>(
        &self,
        target: impl Into<ConnectionTarget<'c, P::Connection>>,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RowSet, PgUtilError> {
        self.dispatch(target.into(), sql, params).await
    }

    /// Like [`Db::execute`] but keep only the first row; an empty result yields `None`.
    ///
    /// # Errors
    /// Returns acquisition or driver errors unchanged.
    pub async fn fetch_first<'c>(
        &self,
        target: impl Into<ConnectionTarget<'c, P::Connection>>,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Row>, PgUtilError> {
        Ok(self.execute(target, sql, params).await?.into_first())
    }

    pub(crate) async fn dispatch(
        &self,
        target: ConnectionTarget<'_, P::Connection>,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RowSet, PgUtilError> {
        match target {
            ConnectionTarget::Explicit(conn) => query_on(conn, sql, params).await,
            ConnectionTarget::Implicit => {
                let conn = self.provider.acquire().await?;
                trace!("acquired connection for a single statement");
                let result = query_on(&*conn, sql, params).await;
                conn.release();
                result
            }
        }
    }
}

/// Run one statement on an already-bound connection.
pub(crate) async fn query_on<C: Queryable + ?Sized>(
    conn: &C,
    sql: &str,
    params: &[RowValues],
) -> Result<RowSet, PgUtilError> {
    debug!(sql, params = params.len(), "executing statement");
    let result = conn.query(sql, params).await;
    if let Err(err) = &result {
        debug!(error = %err, "statement failed");
    }
    result
}
