//! Run ad hoc or file-resident SQL against a connection pool.
//!
//! Every operation either runs on a connection the caller already holds or acquires one
//! for the call and releases it before returning, whatever the outcome. Transactions run
//! caller logic on one fixed connection between `BEGIN` and `COMMIT`/`ROLLBACK`.

pub mod config;
pub mod error;
pub mod executor;
pub mod named;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod target;
pub mod transaction;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::DbConfig;
pub use error::PgUtilError;
pub use executor::Db;
pub use named::QueryRegistry;
pub use pool::{ConnectionProvider, PooledConnection, Queryable};
pub use results::{Row, RowSet};
pub use target::ConnectionTarget;
pub use target::ConnectionTarget::Implicit;
pub use transaction::TxContext;
pub use types::RowValues;

#[cfg(feature = "postgres")]
pub use postgres::PgProvider;
