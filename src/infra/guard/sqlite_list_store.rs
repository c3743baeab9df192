// SQLite-backed allow/deny list store.
//
// Tables:
// - allowlist: actors exempt from every sanction
// - denylist: flagged actors, banned on their next monitored action
//
// Upserts use INSERT OR IGNORE so re-adding an actor keeps the original
// row and its added_at.

use crate::core::guard::{ActorId, GuardError, ListEntry, ListStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteListStore {
    pool: Pool<Sqlite>,
}

impl SqliteListStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), GuardError> {
        for table in ["allowlist", "denylist"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    user_id INTEGER PRIMARY KEY,
                    added_by INTEGER NOT NULL,
                    added_at TEXT NOT NULL,
                    reason TEXT
                );
                "#,
                table
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| GuardError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn contains(&self, table: &str, actor: ActorId) -> Result<bool, GuardError> {
        let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE user_id = ?", table))
            .bind(actor as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GuardError::Storage(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn upsert(
        &self,
        table: &str,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError> {
        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (user_id, added_by, added_at, reason) VALUES (?, ?, ?, ?)",
            table
        ))
        .bind(actor as i64)
        .bind(added_by as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| GuardError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, table: &str, actor: ActorId) -> Result<bool, GuardError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table))
            .bind(actor as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| GuardError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, table: &str) -> Result<Vec<ListEntry>, GuardError> {
        let rows = sqlx::query(&format!(
            "SELECT user_id, added_by, added_at, reason FROM {} ORDER BY added_at",
            table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GuardError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let added_at_str: String = row.get("added_at");
            let added_at = DateTime::parse_from_rfc3339(&added_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            entries.push(ListEntry {
                actor: row.get::<i64, _>("user_id") as u64,
                added_by: row.get::<i64, _>("added_by") as u64,
                added_at,
                reason: row.get("reason"),
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl ListStore for SqliteListStore {
    async fn is_allowed(&self, actor: ActorId) -> Result<bool, GuardError> {
        self.contains("allowlist", actor).await
    }

    async fn is_denied(&self, actor: ActorId) -> Result<bool, GuardError> {
        self.contains("denylist", actor).await
    }

    async fn upsert_allow(
        &self,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError> {
        self.upsert("allowlist", actor, added_by, reason).await
    }

    async fn upsert_deny(
        &self,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError> {
        self.upsert("denylist", actor, added_by, reason).await
    }

    async fn remove_allow(&self, actor: ActorId) -> Result<bool, GuardError> {
        self.remove("allowlist", actor).await
    }

    async fn remove_deny(&self, actor: ActorId) -> Result<bool, GuardError> {
        self.remove("denylist", actor).await
    }

    async fn list_allow(&self) -> Result<Vec<ListEntry>, GuardError> {
        self.list("allowlist").await
    }

    async fn list_deny(&self) -> Result<Vec<ListEntry>, GuardError> {
        self.list("denylist").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteListStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteListStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_deny_is_idempotent_and_keeps_added_at() {
        let store = store().await;

        assert!(store.upsert_deny(42, 1, Some("raider")).await.unwrap());
        let first = store.list_deny().await.unwrap();
        assert_eq!(first.len(), 1);

        // Second upsert is ignored: same row, same added_at, same reason.
        assert!(!store.upsert_deny(42, 99, Some("again")).await.unwrap());
        let second = store.list_deny().await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn lists_are_independent() {
        let store = store().await;

        store.upsert_allow(1, 10, None).await.unwrap();
        store.upsert_deny(2, 10, None).await.unwrap();

        assert!(store.is_allowed(1).await.unwrap());
        assert!(!store.is_denied(1).await.unwrap());
        assert!(store.is_denied(2).await.unwrap());
        assert!(!store.is_allowed(2).await.unwrap());
    }

    #[tokio::test]
    async fn remove_reports_whether_an_entry_existed() {
        let store = store().await;

        store.upsert_allow(1, 10, None).await.unwrap();
        assert!(store.remove_allow(1).await.unwrap());
        assert!(!store.remove_allow(1).await.unwrap());
        assert!(!store.is_allowed(1).await.unwrap());
    }

    #[tokio::test]
    async fn entries_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("guard.db").display()
        );

        {
            let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
            let store = SqliteListStore::new(pool);
            store.migrate().await.unwrap();
            store.upsert_deny(7, 1, Some("nuker")).await.unwrap();
        }

        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        let store = SqliteListStore::new(pool);
        store.migrate().await.unwrap();
        assert!(store.is_denied(7).await.unwrap());
        let entries = store.list_deny().await.unwrap();
        assert_eq!(entries[0].reason.as_deref(), Some("nuker"));
    }
}
