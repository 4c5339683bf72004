//! File-resident queries addressed by logical name.
//!
//! A registry is built once from a directory of `.sql` files and never changes afterwards,
//! so it is shared between concurrent calls without locking.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PgUtilError;
use crate::executor::Db;
use crate::pool::ConnectionProvider;
use crate::results::{Row, RowSet};
use crate::target::ConnectionTarget;
use crate::types::RowValues;

const QUERY_EXTENSION: &str = "sql";

/// Immutable map from logical query name to SQL text.
///
/// `select.sql` at the root is named `select`; `users/by-id.sql` is named `users/by-id`.
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    root: Option<PathBuf>,
    queries: HashMap<String, String>,
}

impl QueryRegistry {
    /// Read every `.sql` file below `root`.
    ///
    /// # Errors
    /// Returns `PgUtilError::QueryLoad` naming the offending path if the directory cannot be
    /// listed or a file cannot be read as UTF-8 text.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PgUtilError> {
        let root = root.as_ref();
        let mut queries = HashMap::new();
        collect_queries(root, root, &mut queries)?;
        debug!(root = %root.display(), count = queries.len(), "loaded named queries");
        Ok(Self {
            root: Some(root.to_path_buf()),
            queries,
        })
    }

    /// Build a registry from in-memory `(name, sql)` pairs.
    pub fn from_queries<N, S>(queries: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            root: None,
            queries: queries
                .into_iter()
                .map(|(name, sql)| (name.into(), sql.into()))
                .collect(),
        }
    }

    /// Directory the registry was loaded from, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.queries.get(name).map(String::as_str)
    }

    /// Look up the SQL text for `name`.
    ///
    /// # Errors
    /// Returns `PgUtilError::UnknownQuery` if no query has that name.
    pub fn resolve(&self, name: &str) -> Result<&str, PgUtilError> {
        self.get(name)
            .ok_or_else(|| PgUtilError::UnknownQuery(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    /// All query names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

fn collect_queries(
    root: &Path,
    dir: &Path,
    queries: &mut HashMap<String, String>,
) -> Result<(), PgUtilError> {
    let load_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PgUtilError::QueryLoad { path, source }
    };

    for entry in fs::read_dir(dir).map_err(load_err(dir))? {
        let path = entry.map_err(load_err(dir))?.path();
        if path.is_dir() {
            collect_queries(root, &path, queries)?;
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(QUERY_EXTENSION) {
            continue;
        }
        let Some(name) = query_name(root, &path) else {
            continue;
        };
        let sql = fs::read_to_string(&path).map_err(load_err(&path))?;
        queries.insert(name, sql);
    }
    Ok(())
}

fn query_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Option<Vec<&str>> = relative.iter().map(|part| part.to_str()).collect();
    Some(parts?.join("/"))
}

impl<P: ConnectionProvider> Db<P> {
    /// Run the named query with positional `params`.
    ///
    /// The name is resolved before any connection is acquired, so an unknown name never
    /// touches the pool. Connection ownership follows [`Db::execute`].
    ///
    /// # Errors
    /// Returns `PgUtilError::NoQueryRegistry` without a registry,
    /// `PgUtilError::UnknownQuery` for an unknown name, or acquisition and driver errors.
    pub async fn run<'c>(
        &self,
        target: impl Into<ConnectionTarget<'c, P::Connection>>,
        name: &str,
        params: &[RowValues],
    ) -> Result<RowSet, PgUtilError> {
        let sql = resolve_named(self.registry(), name)?;
        debug!(query = name, "running named query");
        self.dispatch(target.into(), sql, params).await
    }

    /// Like [`Db::run`] but keep only the first row; an empty result yields `None`.
    ///
    /// # Errors
    /// See [`Db::run`].
    pub async fn first<'c>(
        &self,
        target: impl Into<ConnectionTarget<'c, P::Connection>>,
        name: &str,
        params: &[RowValues],
    ) -> Result<Option<Row>, PgUtilError> {
        Ok(self.run(target, name, params).await?.into_first())
    }
}

pub(crate) fn resolve_named<'r>(
    registry: Option<&'r QueryRegistry>,
    name: &str,
) -> Result<&'r str, PgUtilError> {
    registry.ok_or(PgUtilError::NoQueryRegistry)?.resolve(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create query dir");
        }
        fs::write(path, body).expect("write query file");
    }

    #[test]
    fn loads_sql_files_by_base_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "select.sql", "SELECT 'John Doe'::text AS name\n");
        write(dir.path(), "select-param.sql", "SELECT $1::text AS name\n");
        write(dir.path(), "README.md", "not a query");

        let registry = QueryRegistry::load(dir.path()).expect("load registry");
        assert_eq!(registry.names(), vec!["select", "select-param"]);
        assert_eq!(
            registry.get("select-param"),
            Some("SELECT $1::text AS name\n")
        );
        assert_eq!(registry.root(), Some(dir.path()));
    }

    #[test]
    fn nested_files_are_named_by_relative_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "users/by-id.sql", "SELECT * FROM users WHERE id = $1");

        let registry = QueryRegistry::load(dir.path()).expect("load registry");
        assert!(registry.contains("users/by-id"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_directory_fails_loudly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        match QueryRegistry::load(&missing) {
            Err(PgUtilError::QueryLoad { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected QueryLoad, got {other:?}"),
        }
    }

    #[test]
    fn non_utf8_query_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("bad.sql"), [0xff, 0xfe, 0x00]).expect("write");
        assert!(matches!(
            QueryRegistry::load(dir.path()),
            Err(PgUtilError::QueryLoad { .. })
        ));
    }

    #[test]
    fn resolve_reports_unknown_names() {
        let registry = QueryRegistry::from_queries([("select", "SELECT 1")]);
        assert_eq!(registry.resolve("select").ok(), Some("SELECT 1"));
        assert!(matches!(
            registry.resolve("missing"),
            Err(PgUtilError::UnknownQuery(name)) if name == "missing"
        ));
        assert!(matches!(
            resolve_named(None, "select"),
            Err(PgUtilError::NoQueryRegistry)
        ));
    }
}
