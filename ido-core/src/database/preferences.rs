//! Learned session preferences. The one repository whose delete is hard:
//! preferences are derived data and safe to drop outright.

use chrono::{DateTime, Utc};
use ido_model::{PreferenceId, PreferenceKind, SessionPreference};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{IdoError, Result};

use super::{parse_ts, to_ts};

#[derive(Debug, Clone)]
pub struct PreferenceRepository {
    pool: SqlitePool,
}

impl PreferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, preference: &SessionPreference) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO session_preferences (
                id, preference_type, pattern_description, confidence_score,
                times_observed, last_observed, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(preference.id.to_string())
        .bind(preference.kind.as_str())
        .bind(&preference.description)
        .bind(preference.confidence)
        .bind(preference.times_observed)
        .bind(to_ts(preference.last_observed))
        .bind(to_ts(preference.created_at))
        .execute(&self.pool)
        .await?;
        debug!(preference = %preference.id, kind = %preference.kind, "saved preference");
        Ok(())
    }

    /// Reinforcement: bump the observation count and move the
    /// last-observed marker.
    pub async fn increment_observation(
        &self,
        id: PreferenceId,
        last_observed: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE session_preferences
             SET times_observed = times_observed + 1, last_observed = ?1
             WHERE id = ?2",
        )
        .bind(to_ts(last_observed))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_confidence(
        &self,
        id: PreferenceId,
        confidence: f64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE session_preferences SET confidence_score = ?1
             WHERE id = ?2",
        )
        .bind(confidence.clamp(0.0, 1.0))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        id: PreferenceId,
    ) -> Result<Option<SessionPreference>> {
        let row =
            sqlx::query("SELECT * FROM session_preferences WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| row_to_preference(&r)).transpose()
    }

    pub async fn get_by_kind(
        &self,
        kind: PreferenceKind,
    ) -> Result<Vec<SessionPreference>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM session_preferences
            WHERE preference_type = ?1
            ORDER BY confidence_score DESC, times_observed DESC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_preference).collect()
    }

    pub async fn get_all(
        &self,
        min_confidence: f64,
    ) -> Result<Vec<SessionPreference>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM session_preferences
            WHERE confidence_score >= ?1
            ORDER BY preference_type, confidence_score DESC
            "#,
        )
        .bind(min_confidence)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_preference).collect()
    }

    /// Hard delete.
    pub async fn delete(&self, id: PreferenceId) -> Result<()> {
        sqlx::query("DELETE FROM session_preferences WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_by_kind(&self, kind: PreferenceKind) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM session_preferences WHERE preference_type = ?1",
        )
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_preference(row: &SqliteRow) -> Result<SessionPreference> {
    let kind: PreferenceKind = row
        .get::<String, _>("preference_type")
        .parse()
        .map_err(IdoError::InvalidRecord)?;

    Ok(SessionPreference {
        id: row.get::<String, _>("id").parse().map_err(|e| {
            IdoError::InvalidRecord(format!("preference id: {e}"))
        })?,
        kind,
        description: row.get("pattern_description"),
        confidence: row.get("confidence_score"),
        times_observed: row.get("times_observed"),
        last_observed: row
            .get::<Option<String>, _>("last_observed")
            .as_deref()
            .map(parse_ts)
            .transpose()?
            .unwrap_or_else(Utc::now),
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}
