// PostgreSQL backend: the pool driver behind `ConnectionProvider`.
//
// - config: pool construction from a connection string, libpq environment, or `DbConfig`
// - params: `RowValues` as tokio-postgres parameters
// - query: statement execution and row extraction

pub mod config;
pub mod params;
pub mod query;

pub use config::{PgProvider, pg_config_from_env};
pub use params::Params;
pub use query::build_row_set;
