use async_trait::async_trait;
use deadpool_postgres::{Config as PgConfig, Object, Pool, Runtime};
use tokio_postgres::NoTls;
use tracing::trace;

use crate::config::DbConfig;
use crate::error::PgUtilError;
use crate::executor::Db;
use crate::pool::{ConnectionProvider, PooledConnection};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// Connection provider backed by a `deadpool-postgres` pool.
///
/// Releasing a lease hands the `Object` back to the pool.
#[derive(Clone, Debug)]
pub struct PgProvider {
    pool: Pool,
}

impl PgProvider {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from a `deadpool_postgres::Config`.
    ///
    /// Either `url` or `host` must be set.
    ///
    /// # Errors
    /// Returns `PgUtilError::ConfigError` if neither is set, or
    /// `PgUtilError::ConnectionError` if pool creation fails.
    pub fn from_pg_config(pg_config: PgConfig) -> Result<Self, PgUtilError> {
        if pg_config.url.is_none() && pg_config.host.is_none() && pg_config.hosts.is_none() {
            return Err(PgUtilError::ConfigError(
                "either a connection url or a host is required".to_string(),
            ));
        }

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                PgUtilError::ConnectionError(format!("Failed to create Postgres pool: {e}"))
            })?;
        Ok(Self::new(pool))
    }

    /// Build a pool from a libpq-style connection string or URL.
    ///
    /// With `None`, settings come from the standard `PG*` environment variables.
    ///
    /// # Errors
    /// See [`PgProvider::from_pg_config`].
    pub fn from_connection_string(connection_string: Option<&str>) -> Result<Self, PgUtilError> {
        let pg_config = match connection_string {
            Some(url) => {
                let mut cfg = PgConfig::new();
                cfg.url = Some(url.to_string());
                cfg
            }
            None => pg_config_from_env(),
        };
        Self::from_pg_config(pg_config)
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PgProvider {
    type Connection = Object;

    async fn acquire(&self) -> Result<PooledConnection<Object>, PgUtilError> {
        let conn = self.pool.get().await?;
        trace!(status = ?self.pool.status(), "checked out postgres connection");
        Ok(PooledConnection::new(conn, |_| {
            trace!("returning postgres connection to pool");
        }))
    }
}

impl Db<PgProvider> {
    /// Build the provider from `config.database_url` and load `config.query_dir` if set.
    ///
    /// # Errors
    /// Returns pool construction errors or `PgUtilError::QueryLoad`.
    pub fn from_config(config: &DbConfig) -> Result<Self, PgUtilError> {
        let provider = PgProvider::from_connection_string(config.database_url.as_deref())?;
        let db = Db::new(provider);
        match &config.query_dir {
            Some(dir) => db.with_query_dir(dir),
            None => Ok(db),
        }
    }
}

/// Pool settings from the libpq environment (`PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`,
/// `PGDATABASE`), falling back to `localhost:5432` and the login user.
#[must_use]
pub fn pg_config_from_env() -> PgConfig {
    pg_config_from_vars(|key| std::env::var(key).ok())
}

fn pg_config_from_vars(var: impl Fn(&str) -> Option<String>) -> PgConfig {
    let mut cfg = PgConfig::new();
    cfg.host = Some(var("PGHOST").unwrap_or_else(|| DEFAULT_HOST.to_string()));
    cfg.port = Some(
        var("PGPORT")
            .and_then(|port| port.parse().ok())
            .unwrap_or(DEFAULT_PORT),
    );
    cfg.user = var("PGUSER").or_else(|| var("USER"));
    cfg.password = var("PGPASSWORD");
    cfg.dbname = var("PGDATABASE");
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_defaults_to_localhost() {
        let cfg = pg_config_from_vars(vars(&[("USER", "alice")]));
        assert_eq!(cfg.host.as_deref(), Some("localhost"));
        assert_eq!(cfg.port, Some(5432));
        assert_eq!(cfg.user.as_deref(), Some("alice"));
        assert!(cfg.password.is_none());
        assert!(cfg.dbname.is_none());
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = pg_config_from_vars(vars(&[
            ("PGHOST", "db.internal"),
            ("PGPORT", "6543"),
            ("PGUSER", "app"),
            ("USER", "alice"),
            ("PGPASSWORD", "secret"),
            ("PGDATABASE", "testing"),
        ]));
        assert_eq!(cfg.host.as_deref(), Some("db.internal"));
        assert_eq!(cfg.port, Some(6543));
        assert_eq!(cfg.user.as_deref(), Some("app"));
        assert_eq!(cfg.password.as_deref(), Some("secret"));
        assert_eq!(cfg.dbname.as_deref(), Some("testing"));
    }

    #[test]
    fn unparsable_port_falls_back() {
        let cfg = pg_config_from_vars(vars(&[("PGPORT", "not-a-port")]));
        assert_eq!(cfg.port, Some(5432));
    }

    #[test]
    fn config_without_host_or_url_is_rejected() {
        assert!(matches!(
            PgProvider::from_pg_config(PgConfig::new()),
            Err(PgUtilError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn pool_creation_does_not_connect() {
        let provider =
            PgProvider::from_connection_string(Some("postgres://nobody@127.0.0.1:1/none"))
                .expect("pool builds lazily");
        assert_eq!(provider.pool().status().size, 0);
    }
}
