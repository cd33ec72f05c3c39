//! Embedded schema migrations.
//!
//! Applied versions are tracked in `_linkme_migrations`; each pending migration
//! runs in its own transaction together with its tracking row.

use tokio_postgres::Client;
use tracing::info;

use crate::StoreError;

/// One embedded SQL migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Sortable version key.
    pub version: &'static str,
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001",
        name: "create_linkme_orders",
        sql: include_str!("../migrations/0001_create_linkme_orders.sql"),
    },
    Migration {
        version: "0002",
        name: "create_status_history",
        sql: include_str!("../migrations/0002_create_status_history.sql"),
    },
];

/// Applies every pending migration and returns the versions that ran.
pub async fn migrate(client: &mut Client) -> Result<Vec<&'static str>, StoreError> {
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS _linkme_migrations (
                version TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

    let applied: Vec<String> = client
        .query("SELECT version FROM _linkme_migrations ORDER BY version", &[])
        .await?
        .iter()
        .map(|r| r.get(0))
        .collect();

    let mut ran = Vec::new();
    for migration in MIGRATIONS {
        if applied.iter().any(|v| v == migration.version) {
            continue;
        }
        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql)
            .await
            .map_err(|source| StoreError::Migration {
                version: migration.version,
                source,
            })?;
        tx.execute(
            "INSERT INTO _linkme_migrations (version, name) VALUES ($1, $2)",
            &[&migration.version, &migration.name],
        )
        .await?;
        tx.commit().await?;

        info!(version = migration.version, name = migration.name, "migration applied");
        ran.push(migration.version);
    }
    Ok(ran)
}
