//! Events repository. The session agent is the sole writer.

use chrono::{DateTime, Utc};
use ido_model::{ActivityId, Event, EventId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{IdoError, Result};

use super::{parse_ts, to_ts};

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert by primary key. Rejects rows violating the event
    /// invariants rather than persisting bad data.
    pub async fn save(&self, event: &Event) -> Result<()> {
        if event.start_time > event.end_time {
            return Err(IdoError::InvalidRecord(format!(
                "event {} has start_time after end_time",
                event.id
            )));
        }
        if event.source_action_ids.is_empty() {
            return Err(IdoError::InvalidRecord(format!(
                "event {} has no source actions",
                event.id
            )));
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO events (
                id, title, description, start_time, end_time,
                source_action_ids, aggregated_into_activity_id, version,
                deleted, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.title)
        .bind(&event.description)
        .bind(to_ts(event.start_time))
        .bind(to_ts(event.end_time))
        .bind(serde_json::to_string(&event.source_action_ids)?)
        .bind(event.aggregated_into_activity_id.map(|id| id.to_string()))
        .bind(event.version)
        .bind(event.deleted as i64)
        .bind(to_ts(event.created_at))
        .execute(&self.pool)
        .await?;
        debug!(event = %event.id, "saved event");
        Ok(())
    }

    pub async fn get(&self, id: EventId) -> Result<Option<Event>> {
        let row =
            sqlx::query("SELECT * FROM events WHERE id = ?1 AND deleted = 0")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| row_to_event(&r)).transpose()
    }

    pub async fn get_by_ids(&self, ids: &[EventId]) -> Result<Vec<Event>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(event) = self.get(*id).await? {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// Non-deleted events whose start time falls in the closed range,
    /// ordered by start time.
    pub async fn get_in_timeframe(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM events
            WHERE deleted = 0
              AND start_time >= ?1 AND start_time <= ?2
            ORDER BY start_time ASC
            "#,
        )
        .bind(to_ts(start))
        .bind(to_ts(end))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn mark_as_aggregated(
        &self,
        event_ids: &[EventId],
        activity_id: ActivityId,
    ) -> Result<()> {
        for id in event_ids {
            sqlx::query(
                "UPDATE events SET aggregated_into_activity_id = ?1
                 WHERE id = ?2",
            )
            .bind(activity_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Soft delete.
    pub async fn delete(&self, id: EventId) -> Result<()> {
        sqlx::query("UPDATE events SET deleted = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_event(row: &SqliteRow) -> Result<Event> {
    let source_action_ids = serde_json::from_str(
        &row.get::<String, _>("source_action_ids"),
    )?;

    Ok(Event {
        id: row.get::<String, _>("id").parse().map_err(|e| {
            IdoError::InvalidRecord(format!("event id: {e}"))
        })?,
        title: row.get("title"),
        description: row.get("description"),
        start_time: parse_ts(&row.get::<String, _>("start_time"))?,
        end_time: parse_ts(&row.get::<String, _>("end_time"))?,
        source_action_ids,
        aggregated_into_activity_id: row
            .get::<Option<String>, _>("aggregated_into_activity_id")
            .and_then(|raw| raw.parse().ok()),
        version: row.get("version"),
        deleted: row.get::<i64, _>("deleted") != 0,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}
