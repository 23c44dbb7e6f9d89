//! Insight repositories: diaries, todos, knowledge. These tables are
//! written by higher-order prompt chains outside the core; the core owns
//! their persistence, soft deletion, and retention.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

use super::to_ts;

#[derive(Debug, Clone)]
pub struct DiaryRepository {
    pool: SqlitePool,
}

impl DiaryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert by id; `date` is a `YYYY-MM-DD` day key.
    pub async fn save(
        &self,
        id: Uuid,
        date: &str,
        content: &str,
    ) -> Result<()> {
        let now = to_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO diaries
                (id, date, content, deleted, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0,
                COALESCE((SELECT created_at FROM diaries WHERE id = ?1), ?4),
                ?4)
            "#,
        )
        .bind(id.to_string())
        .bind(date)
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-deletes diaries whose day key falls in the closed range of
    /// `YYYY-MM-DD` strings. Returns the 0 -> 1 transition count.
    pub async fn delete_by_date_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE diaries SET deleted = 1
             WHERE deleted = 0 AND date >= ?1 AND date <= ?2",
        )
        .bind(start_date)
        .bind(end_date)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct TodoRepository {
    pool: SqlitePool,
}

impl TodoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(
        &self,
        id: Uuid,
        content: &str,
        status: &str,
        source_activity_id: Option<Uuid>,
    ) -> Result<()> {
        let now = to_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO todos
                (id, content, status, source_activity_id, deleted,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0,
                COALESCE((SELECT created_at FROM todos WHERE id = ?1), ?5),
                ?5)
            "#,
        )
        .bind(id.to_string())
        .bind(content)
        .bind(status)
        .bind(source_activity_id.map(|v| v.to_string()))
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-deletes todos created inside the closed timestamp window.
    pub async fn delete_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE todos SET deleted = 1
             WHERE deleted = 0 AND created_at >= ?1 AND created_at <= ?2",
        )
        .bind(to_ts(start))
        .bind(to_ts(end))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct KnowledgeRepository {
    pool: SqlitePool,
}

impl KnowledgeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        category: Option<&str>,
        source_action_id: Option<Uuid>,
    ) -> Result<()> {
        let now = to_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO knowledge
                (id, title, content, category, source_action_id, deleted,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0,
                COALESCE((SELECT created_at FROM knowledge WHERE id = ?1), ?6),
                ?6)
            "#,
        )
        .bind(id.to_string())
        .bind(title)
        .bind(content)
        .bind(category)
        .bind(source_action_id.map(|v| v.to_string()))
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-deletes knowledge created inside the closed timestamp window.
    pub async fn delete_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE knowledge SET deleted = 1
             WHERE deleted = 0 AND created_at >= ?1 AND created_at <= ?2",
        )
        .bind(to_ts(start))
        .bind(to_ts(end))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
