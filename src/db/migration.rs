use rusqlite::Connection;
use time::OffsetDateTime;
use tracing::info;

use super::schema::{ATTACHMENTS_SCHEMA, INITIAL_SCHEMA, LINK_TYPE_INDEX};
use crate::Result;

/// Individual migration with version metadata.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

impl Migration {
    /// Creates a new migration.
    pub const fn new(version: u32, description: &'static str, up: &'static str) -> Self {
        Self {
            version,
            description,
            up,
        }
    }

    /// Checks if this migration has been applied to the database.
    pub fn is_applied(&self, conn: &Connection) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
            [self.version],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Applies this migration and records it in schema_migrations, atomically.
    pub fn apply(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;

        tx.execute_batch(self.up)?;

        let applied_at = OffsetDateTime::now_utc().unix_timestamp();
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![self.version, applied_at, self.description],
        )?;

        tx.commit()?;
        Ok(())
    }
}

/// Registry of all migrations in version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "Initial schema: note_groups, notes, tags, note_tags, note_links",
        INITIAL_SCHEMA,
    ),
    Migration::new(2, "Add note_attachments table", ATTACHMENTS_SCHEMA),
    Migration::new(3, "Index note_links by link_type", LINK_TYPE_INDEX),
];

/// Applies all pending migrations to the database.
/// Migrations are applied in version order and are additive-only.
pub fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migration_table_exists(conn)?;

    for migration in MIGRATIONS {
        if !migration.is_applied(conn)? {
            migration.apply(conn)?;
            info!(
                version = migration.version,
                "applied migration: {}", migration.description
            );
        }
    }

    Ok(())
}

/// Returns (version, description, applied_at) for every applied migration.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<(u32, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT version, description, applied_at FROM schema_migrations ORDER BY version",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut applied = Vec::new();
    for row in rows {
        applied.push(row?);
    }
    Ok(applied)
}

/// Creates the schema_migrations table if it doesn't exist.
fn ensure_migration_table_exists(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        );
        "#,
    )?;
    Ok(())
}
