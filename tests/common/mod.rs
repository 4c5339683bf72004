#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pg_util::prelude::*;

/// Shared bookkeeping for every connection handed out by a `CountingProvider`.
#[derive(Default)]
pub struct Stats {
    acquired: AtomicUsize,
    released: AtomicUsize,
    statements: Mutex<Vec<(usize, String)>>,
    fail_on: Mutex<Vec<String>>,
    stall_on: Mutex<Vec<String>>,
    fail_connect: Mutex<bool>,
}

impl Stats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Statements in execution order, without the connection id.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .expect("statements lock")
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    /// Connection ids in execution order.
    pub fn connection_ids(&self) -> Vec<usize> {
        self.statements
            .lock()
            .expect("statements lock")
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    /// Any statement starting with `prefix` fails from now on.
    pub fn fail_on(&self, prefix: &str) {
        self.fail_on
            .lock()
            .expect("fail_on lock")
            .push(prefix.to_string());
    }

    /// Any statement starting with `prefix` never completes from now on.
    pub fn stall_on(&self, prefix: &str) {
        self.stall_on
            .lock()
            .expect("stall_on lock")
            .push(prefix.to_string());
    }

    /// Yield until `released` reaches `expected`, for releases that happen on a spawned task.
    pub async fn wait_for_released(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.released() < expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("connection released in time");
    }

    pub fn fail_connect(&self) {
        *self.fail_connect.lock().expect("fail_connect lock") = true;
    }
}

/// Test double for the pool driver: counts acquisitions and releases and records statements.
#[derive(Clone, Default)]
pub struct CountingProvider {
    pub stats: Arc<Stats>,
}

pub struct FakeConnection {
    id: usize,
    stats: Arc<Stats>,
}

#[async_trait]
impl ConnectionProvider for CountingProvider {
    type Connection = FakeConnection;

    async fn acquire(&self) -> Result<PooledConnection<FakeConnection>, PgUtilError> {
        if *self.stats.fail_connect.lock().expect("fail_connect lock") {
            return Err(PgUtilError::ConnectionError("pool exhausted".into()));
        }
        let id = self.stats.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        let stats = Arc::clone(&self.stats);
        let conn = FakeConnection {
            id,
            stats: Arc::clone(&self.stats),
        };
        Ok(PooledConnection::new(conn, move |_| {
            stats.released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[async_trait]
impl Queryable for FakeConnection {
    /// Echoes the statement back: one row whose `name` column holds the first parameter,
    /// or the SQL text when there are no parameters. SQL containing `WHERE false` returns
    /// no rows. Stalled statements sleep until the caller gives up on them.
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<RowSet, PgUtilError> {
        self.stats
            .statements
            .lock()
            .expect("statements lock")
            .push((self.id, sql.to_string()));

        let failing = self
            .stats
            .fail_on
            .lock()
            .expect("fail_on lock")
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()));
        if failing {
            return Err(PgUtilError::ExecutionError(format!("rejected: {sql}")));
        }

        let stalled = self
            .stats
            .stall_on
            .lock()
            .expect("stall_on lock")
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()));
        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut rows = RowSet::with_columns(vec!["name".to_string()], 1);
        if !sql.contains("WHERE false") {
            let value = params
                .first()
                .cloned()
                .unwrap_or_else(|| RowValues::Text(sql.to_string()));
            rows.add_row_values(vec![value]);
        }
        Ok(rows)
    }
}

pub fn db() -> (Db<CountingProvider>, Arc<Stats>) {
    let provider = CountingProvider::default();
    let stats = Arc::clone(&provider.stats);
    (Db::new(provider), stats)
}

pub fn db_with_queries() -> (Db<CountingProvider>, Arc<Stats>) {
    let (db, stats) = db();
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/sql");
    (db.with_query_dir(dir).expect("load test queries"), stats)
}
