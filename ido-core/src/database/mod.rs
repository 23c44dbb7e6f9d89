//! Repository-pattern SQLite store.
//!
//! One pool per installation; each repository exclusively owns writes to
//! its table. Soft delete (`deleted = 1`) is the only delete exposed on
//! content tables. The exceptions are `session_preferences` (hard by
//! design) and the retention sweep, which hard-prunes events and their
//! image join rows while soft-deleting activities. That asymmetry is
//! intentional policy: events are append-only and safe to prune.

pub mod actions;
pub mod activities;
pub mod events;
pub mod insights;
mod migrations;
pub mod preferences;
mod schema;
pub mod settings;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error};

use crate::error::{IdoError, Result};

pub use actions::ActionRepository;
pub use activities::ActivityRepository;
pub use events::EventRepository;
pub use insights::{DiaryRepository, KnowledgeRepository, TodoRepository};
pub use preferences::PreferenceRepository;
pub use settings::SettingRepository;

/// Serialize a timestamp for storage. All columns hold RFC 3339 text in
/// UTC-offset form.
pub(crate) fn to_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a stored timestamp, tolerating both RFC 3339 and the space
/// separated form SQLite's `CURRENT_TIMESTAMP` emits.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
    {
        return Ok(naive.and_utc());
    }
    Err(IdoError::InvalidRecord(format!("unparseable timestamp: {raw}")))
}

/// Row counts touched by one retention sweep, keyed by table grouping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionCounts {
    pub events: u64,
    pub action_images: u64,
    pub activities: u64,
    pub knowledge: u64,
    pub todos: u64,
    pub diaries: u64,
}

impl RetentionCounts {
    pub fn total(&self) -> u64 {
        self.events
            + self.action_images
            + self.activities
            + self.knowledge
            + self.todos
            + self.diaries
    }
}

/// Bundle of per-entity repositories over one shared pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
    pub actions: ActionRepository,
    pub events: EventRepository,
    pub activities: ActivityRepository,
    pub preferences: PreferenceRepository,
    pub settings: SettingRepository,
    pub diaries: DiaryRepository,
    pub todos: TodoRepository,
    pub knowledge: KnowledgeRepository,
}

impl Database {
    /// Opens (creating if needed) the SQLite file and brings the schema up
    /// to date. Failure here aborts startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        for table_sql in schema::ALL_TABLES {
            sqlx::query(table_sql).execute(&pool).await.map_err(|e| {
                error!("schema initialisation failed: {e}");
                IdoError::Database(e)
            })?;
        }
        for index_sql in schema::ALL_INDEXES {
            sqlx::query(index_sql).execute(&pool).await?;
        }
        migrations::run(&pool).await;

        debug!(path = %path.display(), "database ready");

        Ok(Self {
            actions: ActionRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            activities: ActivityRepository::new(pool.clone()),
            preferences: PreferenceRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            diaries: DiaryRepository::new(pool.clone()),
            todos: TodoRepository::new(pool.clone()),
            knowledge: KnowledgeRepository::new(pool.clone()),
            pool,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Batch retention sweep. `cutoff` bounds timestamp columns; its date
    /// component bounds the diary table. Events older than the cutoff are
    /// hard-deleted together with the image join rows of the actions they
    /// aggregate; everything else is a soft delete. Returns the per-table
    /// counts of rows whose state changed.
    pub async fn delete_old_data(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<RetentionCounts> {
        let cutoff_iso = to_ts(cutoff);
        let cutoff_date: NaiveDate = cutoff.date_naive();
        let mut counts = RetentionCounts::default();

        let mut tx = self.pool.begin().await?;

        counts.action_images = sqlx::query(
            r#"
            DELETE FROM action_images
            WHERE action_id IN (
                SELECT a.id
                FROM actions a
                JOIN events e ON a.aggregated_into_event_id = e.id
                WHERE e.start_time < ?1
            )
            "#,
        )
        .bind(&cutoff_iso)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        counts.events =
            sqlx::query("DELETE FROM events WHERE start_time < ?1")
                .bind(&cutoff_iso)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        counts.activities = sqlx::query(
            "UPDATE activities SET deleted = 1
             WHERE deleted = 0 AND start_time < ?1",
        )
        .bind(&cutoff_iso)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        counts.knowledge = sqlx::query(
            "UPDATE knowledge SET deleted = 1
             WHERE deleted = 0 AND created_at < ?1",
        )
        .bind(&cutoff_iso)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        counts.todos = sqlx::query(
            "UPDATE todos SET deleted = 1
             WHERE deleted = 0 AND created_at < ?1",
        )
        .bind(&cutoff_iso)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        counts.diaries = sqlx::query(
            "UPDATE diaries SET deleted = 1
             WHERE deleted = 0 AND date < ?1",
        )
        .bind(cutoff_date.format("%Y-%m-%d").to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        debug!(?counts, "retention sweep complete");
        Ok(counts)
    }
}
