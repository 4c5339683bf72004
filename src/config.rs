use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable holding the connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable holding the query directory.
pub const QUERY_DIR_ENV: &str = "PG_UTIL_QUERY_DIR";

/// Process-level settings.
///
/// Both fields are optional: without a `database_url` the driver falls back to the libpq
/// environment, and without a `query_dir` only raw SQL can be executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub database_url: Option<String>,
    pub query_dir: Option<PathBuf>,
}

impl DbConfig {
    #[must_use]
    pub fn new(database_url: Option<String>, query_dir: Option<PathBuf>) -> Self {
        Self {
            database_url,
            query_dir,
        }
    }

    /// Read `DATABASE_URL` and `PG_UTIL_QUERY_DIR`; unset or empty variables stay `None`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());
        Self {
            database_url: non_empty(DATABASE_URL_ENV),
            query_dir: non_empty(QUERY_DIR_ENV).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vars_are_absent() {
        let cfg = DbConfig::from_vars(|key| match key {
            DATABASE_URL_ENV => Some(String::new()),
            QUERY_DIR_ENV => Some("sql".to_string()),
            _ => None,
        });
        assert_eq!(cfg, DbConfig::new(None, Some(PathBuf::from("sql"))));
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let cfg: DbConfig = serde_json::from_str(r#"{"database_url": "postgres://localhost/app"}"#)
            .expect("valid config");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/app"));
        assert!(cfg.query_dir.is_none());
    }
}
