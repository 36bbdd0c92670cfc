//! Schema migrations.
//!
//! The schema version lives in SQLite's `user_version` header field: version
//! `n` means the first `n` steps of [`MIGRATIONS`] have been applied. Each
//! step and its version bump commit in one transaction.

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "initial",
        sql: include_str!("migrations/001_initial.sql"),
    },
    Migration {
        name: "messages",
        sql: include_str!("migrations/002_messages.sql"),
    },
];

pub fn run_migrations(conn: &Connection) -> Result<()> {
    migrate_to_latest(conn, MIGRATIONS)
}

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("Failed to read schema version")?;
    Ok(usize::try_from(version).unwrap_or(0))
}

fn migrate_to_latest(conn: &Connection, migrations: &[Migration]) -> Result<()> {
    let current = schema_version(conn)?;
    if current > migrations.len() {
        bail!(
            "Database schema version {} is newer than this build supports ({})",
            current,
            migrations.len()
        );
    }

    for (index, migration) in migrations.iter().enumerate().skip(current) {
        let version = index + 1;
        tracing::info!("Applying migration {:03}: {}", version, migration.name);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .and_then(|_| tx.pragma_update(None, "user_version", version as i64))
            .with_context(|| format!("Failed to apply migration {:03}: {}", version, migration.name))?;
        tx.commit()?;
    }

    Ok(())
}
