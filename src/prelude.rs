//! Convenient imports for common functionality.

pub use crate::config::DbConfig;
pub use crate::error::PgUtilError;
pub use crate::executor::Db;
pub use crate::named::QueryRegistry;
pub use crate::pool::{ConnectionProvider, PooledConnection, Queryable};
pub use crate::results::{Row, RowSet};
pub use crate::target::ConnectionTarget::{self, Implicit};
pub use crate::transaction::TxContext;
pub use crate::types::RowValues;

#[cfg(feature = "postgres")]
pub use crate::postgres::PgProvider;
