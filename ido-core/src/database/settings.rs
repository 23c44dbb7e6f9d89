//! Typed key/value settings store.

use ido_model::{Setting, SettingKind, SettingValue};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SettingRepository {
    pool: SqlitePool,
}

impl SettingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn set(
        &self,
        key: &str,
        value: &SettingValue,
        description: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO settings (key, value, type, description)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(value.kind().as_str())
        .bind(description)
        .execute(&self.pool)
        .await?;
        debug!(key, "setting updated");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingValue>> {
        let row =
            sqlx::query("SELECT value, type FROM settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| {
            let kind = r
                .get::<String, _>("type")
                .parse::<SettingKind>()
                .unwrap_or(SettingKind::String);
            SettingValue::parse(kind, &r.get::<String, _>("value"))
        }))
    }

    pub async fn get_string(
        &self,
        key: &str,
        default: &str,
    ) -> Result<String> {
        Ok(self
            .get(key)
            .await?
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string()))
    }

    pub async fn get_all(&self) -> Result<Vec<Setting>> {
        let rows = sqlx::query(
            "SELECT key, value, type, description FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let kind = r
                    .get::<String, _>("type")
                    .parse::<SettingKind>()
                    .unwrap_or(SettingKind::String);
                Setting {
                    key: r.get("key"),
                    value: SettingValue::parse(
                        kind,
                        &r.get::<String, _>("value"),
                    ),
                    description: r.get("description"),
                }
            })
            .collect())
    }

    pub async fn delete(&self, key: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
