use std::fmt;
use std::ops::Deref;

type ReleaseFn<C> = Box<dyn FnOnce(&C) + Send + Sync>;

/// A connection leased from a [`ConnectionProvider`] plus the hook that gives it back.
///
/// The hook runs exactly once: either through [`PooledConnection::release`], which consumes
/// the lease, or from `Drop` when the lease goes out of scope on an early return, a
/// cancelled future, or a panic.
///
/// [`ConnectionProvider`]: super::ConnectionProvider
pub struct PooledConnection<C> {
    conn: C,
    release: Option<ReleaseFn<C>>,
}

impl<C> PooledConnection<C> {
    /// Wrap `conn`; `release` is called with the connection right before it is dropped.
    pub fn new(conn: C, release: impl FnOnce(&C) + Send + Sync + 'static) -> Self {
        Self {
            conn,
            release: Some(Box::new(release)),
        }
    }

    /// Release the connection now.
    pub fn release(mut self) {
        self.fire_release();
    }

    fn fire_release(&mut self) {
        if let Some(release) = self.release.take() {
            release(&self.conn);
        }
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.fire_release();
    }
}

impl<C: fmt::Debug> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("released", &self.release.is_none())
            .finish()
    }
}
