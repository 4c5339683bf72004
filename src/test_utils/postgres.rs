use postgresql_embedded::PostgreSQL;

use super::SHARED_RUNTIME;
use crate::executor::Db;
use crate::postgres::PgProvider;

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
}

/// Start an embedded `PostgreSQL`, create `db_name`, and check that it accepts queries.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, the database cannot be
/// created, or the post-start connectivity check fails.
pub fn setup_postgres_embedded(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();
        postgresql.setup().await?;
        postgresql.start().await?;
        postgresql.create_database(db_name).await?;

        let port = postgresql.settings().port;
        let database_url = postgresql.settings().url(db_name);
        println!("PostgreSQL started on port {port}");

        let db = Db::new(PgProvider::from_connection_string(Some(&database_url))?);
        db.execute(crate::Implicit, "SELECT 1", &[]).await?;

        Ok(EmbeddedPostgres {
            postgresql,
            port,
            database_url,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}
