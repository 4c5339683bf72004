use crate::pool::PooledConnection;

/// Which connection an executor-shaped operation should run on.
///
/// Every operation of [`Db`] accepts `impl Into<ConnectionTarget>`, so the same call works
/// with a connection the caller already holds or with [`Implicit`], in which case the
/// operation acquires a connection and releases it before returning:
/// ```rust,no_run
/// use pg_util::prelude::*;
///
/// # async fn demo(db: &Db<PgProvider>) -> Result<(), PgUtilError> {
/// let rows = db.execute(Implicit, "SELECT 1 AS one", &[]).await?;
///
/// let conn = db.get_connection().await?;
/// let more = db.execute(&conn, "SELECT 2 AS two", &[]).await?;
/// conn.release();
/// # let _ = (rows, more);
/// # Ok(()) }
/// ```
///
/// [`Db`]: crate::Db
/// [`Implicit`]: ConnectionTarget::Implicit
#[derive(Debug)]
pub enum ConnectionTarget<'c, C> {
    /// A connection owned by the caller. It is used as-is and never released by this crate.
    Explicit(&'c C),
    /// No connection supplied; one is acquired for the call and released afterwards.
    Implicit,
}

impl<C> ConnectionTarget<'_, C> {
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        matches!(self, ConnectionTarget::Explicit(_))
    }
}

impl<C> Clone for ConnectionTarget<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ConnectionTarget<'_, C> {}

impl<'c, C> From<&'c C> for ConnectionTarget<'c, C> {
    fn from(conn: &'c C) -> Self {
        ConnectionTarget::Explicit(conn)
    }
}

impl<'c, C> From<&'c PooledConnection<C>> for ConnectionTarget<'c, C> {
    fn from(conn: &'c PooledConnection<C>) -> Self {
        ConnectionTarget::Explicit(&**conn)
    }
}

impl<'c, C> From<Option<&'c C>> for ConnectionTarget<'c, C> {
    fn from(conn: Option<&'c C>) -> Self {
        conn.map_or(ConnectionTarget::Implicit, ConnectionTarget::Explicit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_classify_as_explicit() {
        let conn = 1_u8;
        assert!(ConnectionTarget::from(&conn).is_explicit());
        let lease = PooledConnection::new(2_u8, |_| {});
        assert!(ConnectionTarget::<u8>::from(&lease).is_explicit());
        assert!(ConnectionTarget::from(Some(&conn)).is_explicit());
    }

    #[test]
    fn absence_classifies_as_implicit() {
        assert!(!ConnectionTarget::<u8>::Implicit.is_explicit());
        assert!(!ConnectionTarget::<u8>::from(None).is_explicit());
    }
}
