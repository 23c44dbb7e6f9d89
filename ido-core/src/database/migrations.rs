//! Additive column migrations.
//!
//! The registry is executed on every open. SQLite reports an existing
//! column as an error, which is the expected steady state: those log at
//! debug. Anything else is a warning, never an abort.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "actions.extract_knowledge",
        "ALTER TABLE actions ADD COLUMN extract_knowledge INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "actions.knowledge_extracted",
        "ALTER TABLE actions ADD COLUMN knowledge_extracted INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "knowledge.source_action_id",
        "ALTER TABLE knowledge ADD COLUMN source_action_id TEXT",
    ),
    (
        "pomodoro_sessions.linked_activity_id",
        "ALTER TABLE pomodoro_sessions ADD COLUMN linked_activity_id TEXT",
    ),
];

pub async fn run(pool: &SqlitePool) {
    for (description, sql) in MIGRATIONS {
        match sqlx::query(sql).execute(pool).await {
            Ok(_) => info!(migration = description, "migration applied"),
            Err(e) => {
                let message = e.to_string().to_lowercase();
                if message.contains("duplicate column")
                    || message.contains("already exists")
                {
                    debug!(migration = description, "column already present");
                } else {
                    warn!(migration = description, "migration failed: {e}");
                }
            }
        }
    }
}
