//! Activities repository. The session agent is the sole writer; user
//! merge/split bookkeeping rides on dedicated columns.

use chrono::{DateTime, Utc};
use ido_model::{Activity, ActivityId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{IdoError, Result};

use super::{parse_ts, to_ts};

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert by primary key; refreshes `updated_at`.
    pub async fn save(&self, activity: &Activity) -> Result<()> {
        if activity.source_event_ids.is_empty() {
            return Err(IdoError::InvalidRecord(format!(
                "activity {} has no source events",
                activity.id
            )));
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO activities (
                id, title, description, start_time, end_time,
                source_event_ids, session_duration_minutes, topic_tags,
                user_merged_from_ids, user_split_into_ids,
                deleted, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(activity.id.to_string())
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(to_ts(activity.start_time))
        .bind(to_ts(activity.end_time))
        .bind(serde_json::to_string(&activity.source_event_ids)?)
        .bind(activity.session_duration_minutes)
        .bind(serde_json::to_string(&activity.topic_tags)?)
        .bind(
            activity
                .user_merged_from_ids
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(
            activity
                .user_split_into_ids
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(activity.deleted as i64)
        .bind(to_ts(activity.created_at))
        .bind(to_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        debug!(activity = %activity.id, "saved activity");
        Ok(())
    }

    pub async fn get(&self, id: ActivityId) -> Result<Option<Activity>> {
        let row = sqlx::query(
            "SELECT * FROM activities WHERE id = ?1 AND deleted = 0",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_activity(&r)).transpose()
    }

    pub async fn get_by_ids(
        &self,
        ids: &[ActivityId],
    ) -> Result<Vec<Activity>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(activity) = self.get(*id).await? {
                out.push(activity);
            }
        }
        Ok(out)
    }

    /// Non-deleted activities ending at or after `since`, ordered by end
    /// time. The merge-with-existing pass consumes this.
    pub async fn get_ending_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM activities
            WHERE deleted = 0 AND end_time >= ?1
            ORDER BY end_time ASC
            "#,
        )
        .bind(to_ts(since))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_activity).collect()
    }

    pub async fn get_recent(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM activities
            WHERE deleted = 0
            ORDER BY start_time DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_activity).collect()
    }

    pub async fn record_user_merge(
        &self,
        id: ActivityId,
        merged_from_ids: &[ActivityId],
    ) -> Result<()> {
        sqlx::query(
            "UPDATE activities
             SET user_merged_from_ids = ?1, updated_at = ?2
             WHERE id = ?3",
        )
        .bind(serde_json::to_string(merged_from_ids)?)
        .bind(to_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_user_split(
        &self,
        id: ActivityId,
        split_into_ids: &[ActivityId],
    ) -> Result<()> {
        sqlx::query(
            "UPDATE activities
             SET user_split_into_ids = ?1, updated_at = ?2
             WHERE id = ?3",
        )
        .bind(serde_json::to_string(split_into_ids)?)
        .bind(to_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft delete.
    pub async fn delete(&self, id: ActivityId) -> Result<()> {
        sqlx::query("UPDATE activities SET deleted = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-deletes activities starting inside the closed window; returns
    /// the number of rows whose `deleted` transitioned 0 -> 1.
    pub async fn delete_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE activities SET deleted = 1
             WHERE deleted = 0 AND start_time >= ?1 AND start_time <= ?2",
        )
        .bind(to_ts(start))
        .bind(to_ts(end))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_activity(row: &SqliteRow) -> Result<Activity> {
    let parse_list = |raw: Option<String>| -> Result<Option<Vec<ActivityId>>> {
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(Into::into)
    };

    Ok(Activity {
        id: row.get::<String, _>("id").parse().map_err(|e| {
            IdoError::InvalidRecord(format!("activity id: {e}"))
        })?,
        title: row.get("title"),
        description: row.get("description"),
        start_time: parse_ts(&row.get::<String, _>("start_time"))?,
        end_time: parse_ts(&row.get::<String, _>("end_time"))?,
        source_event_ids: serde_json::from_str(
            &row.get::<String, _>("source_event_ids"),
        )?,
        session_duration_minutes: row
            .get::<Option<i64>, _>("session_duration_minutes")
            .unwrap_or(0),
        topic_tags: row
            .get::<Option<String>, _>("topic_tags")
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?
            .unwrap_or_default(),
        user_merged_from_ids: parse_list(
            row.get::<Option<String>, _>("user_merged_from_ids"),
        )?,
        user_split_into_ids: parse_list(
            row.get::<Option<String>, _>("user_split_into_ids"),
        )?,
        deleted: row.get::<i64, _>("deleted") != 0,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        updated_at: parse_ts(&row.get::<String, _>("updated_at"))?,
    })
}
