//! Schema migrations.
//!
//! Each step is a SQL batch under `crates/core/migrations/`. The highest
//! applied step is recorded in `_migrations`; a step and its bookkeeping row
//! commit together.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Ordered schema steps: (version, SQL). `entries` references `generations`.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_generations.sql")),
    (2, include_str!("../../migrations/002_entries.sql")),
];

/// Bring the schema up to date. Safe to call on every open.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    let applied = conn
        .call(|conn| -> Result<Vec<i64>, Error> {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                )",
            )?;
            let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })?;

            let mut applied = Vec::new();
            for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
                apply(conn, version, sql).map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
                applied.push(version);
            }
            Ok(applied)
        })
        .await
        .map_err(Error::from)?;

    if !applied.is_empty() {
        tracing::debug!(?applied, "applied schema migrations");
    }
    Ok(())
}

fn apply(conn: &mut rusqlite::Connection, version: i64, sql: &str) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.execute(
        "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()
}
