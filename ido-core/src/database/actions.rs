//! Actions repository plus the `action_images` join it owns.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ido_model::{Action, ActionId, EventId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::Result;

use super::{parse_ts, to_ts};

#[derive(Debug, Clone)]
pub struct ActionRepository {
    pool: SqlitePool,
}

impl ActionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert by primary key.
    pub async fn save(&self, action: &Action) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO actions (
                id, title, description, keywords, timestamp,
                aggregated_into_event_id, extract_knowledge,
                knowledge_extracted, deleted, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(action.id.to_string())
        .bind(&action.title)
        .bind(&action.description)
        .bind(serde_json::to_string(&action.keywords)?)
        .bind(to_ts(action.timestamp))
        .bind(action.aggregated_into_event_id.map(|id| id.to_string()))
        .bind(action.extract_knowledge as i64)
        .bind(action.knowledge_extracted as i64)
        .bind(action.deleted as i64)
        .bind(to_ts(action.created_at))
        .execute(&self.pool)
        .await?;
        debug!(action = %action.id, "saved action");
        Ok(())
    }

    pub async fn get(&self, id: ActionId) -> Result<Option<Action>> {
        let row = sqlx::query(
            "SELECT * FROM actions WHERE id = ?1 AND deleted = 0",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_action(&r)).transpose()
    }

    pub async fn get_by_ids(&self, ids: &[ActionId]) -> Result<Vec<Action>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(action) = self.get(*id).await? {
                out.push(action);
            }
        }
        Ok(out)
    }

    /// Non-deleted actions in `[start, end]` not yet folded into an event,
    /// ordered by timestamp.
    pub async fn get_unaggregated_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM actions
            WHERE deleted = 0
              AND aggregated_into_event_id IS NULL
              AND timestamp >= ?1 AND timestamp <= ?2
            ORDER BY timestamp ASC
            "#,
        )
        .bind(to_ts(start))
        .bind(to_ts(end))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_action).collect()
    }

    pub async fn mark_as_aggregated(
        &self,
        action_ids: &[ActionId],
        event_id: EventId,
    ) -> Result<()> {
        for id in action_ids {
            sqlx::query(
                "UPDATE actions SET aggregated_into_event_id = ?1
                 WHERE id = ?2",
            )
            .bind(event_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn set_knowledge_flags(
        &self,
        id: ActionId,
        extract_knowledge: bool,
        knowledge_extracted: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE actions
             SET extract_knowledge = ?1, knowledge_extracted = ?2
             WHERE id = ?3",
        )
        .bind(extract_knowledge as i64)
        .bind(knowledge_extracted as i64)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft delete.
    pub async fn delete(&self, id: ActionId) -> Result<()> {
        sqlx::query("UPDATE actions SET deleted = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-deletes actions inside the closed timestamp window. Returns
    /// the number of rows whose `deleted` transitioned 0 -> 1.
    pub async fn delete_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE actions SET deleted = 1
             WHERE deleted = 0 AND timestamp >= ?1 AND timestamp <= ?2",
        )
        .bind(to_ts(start))
        .bind(to_ts(end))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Records one screenshot reference for an action.
    pub async fn add_image(
        &self,
        action_id: ActionId,
        image_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO action_images
             (action_id, image_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(action_id.to_string())
        .bind(image_hash)
        .bind(to_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_image_hashes(
        &self,
        action_id: ActionId,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT image_hash FROM action_images
             WHERE action_id = ?1 ORDER BY created_at",
        )
        .bind(action_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("image_hash")).collect())
    }

    /// The authoritative live-reference set for orphan image GC: every
    /// hash referenced by a non-deleted action.
    pub async fn get_all_referenced_image_hashes(
        &self,
    ) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ai.image_hash
            FROM action_images ai
            JOIN actions a ON a.id = ai.action_id
            WHERE a.deleted = 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("image_hash")).collect())
    }
}

fn row_to_action(row: &SqliteRow) -> Result<Action> {
    let keywords: Vec<String> = row
        .get::<Option<String>, _>("keywords")
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?
        .unwrap_or_default();

    Ok(Action {
        id: row.get::<String, _>("id").parse().map_err(|e| {
            crate::error::IdoError::InvalidRecord(format!("action id: {e}"))
        })?,
        title: row.get("title"),
        description: row.get("description"),
        keywords,
        timestamp: parse_ts(&row.get::<String, _>("timestamp"))?,
        aggregated_into_event_id: row
            .get::<Option<String>, _>("aggregated_into_event_id")
            .and_then(|raw| raw.parse().ok()),
        extract_knowledge: row.get::<i64, _>("extract_knowledge") != 0,
        knowledge_extracted: row.get::<i64, _>("knowledge_extracted") != 0,
        deleted: row.get::<i64, _>("deleted") != 0,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}
