// SQLite-backed per-guild settings store.
//
// One row per guild, created lazily on first reference with every
// protection toggle enabled and no log channel.

use crate::core::guard::{GuardError, GuildId, GuildSettings, SettingsStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), GuardError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER PRIMARY KEY,
                anti_role_delete BOOLEAN NOT NULL DEFAULT 1,
                anti_guild_rename BOOLEAN NOT NULL DEFAULT 1,
                anti_channel_delete BOOLEAN NOT NULL DEFAULT 1,
                anti_channel_create BOOLEAN NOT NULL DEFAULT 1,
                log_channel INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GuardError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get(&self, guild: GuildId) -> Result<GuildSettings, GuardError> {
        // Lazily materialize the default row so later field updates have
        // something to land on.
        sqlx::query("INSERT OR IGNORE INTO guild_settings (guild_id) VALUES (?)")
            .bind(guild as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| GuardError::Storage(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM guild_settings WHERE guild_id = ?")
            .bind(guild as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GuardError::Storage(e.to_string()))?;

        Ok(GuildSettings {
            anti_role_delete: row.get("anti_role_delete"),
            anti_guild_rename: row.get("anti_guild_rename"),
            anti_channel_delete: row.get("anti_channel_delete"),
            anti_channel_create: row.get("anti_channel_create"),
            log_channel: row
                .get::<Option<i64>, _>("log_channel")
                .map(|id| id as u64),
        })
    }

    async fn set(&self, guild: GuildId, settings: GuildSettings) -> Result<(), GuardError> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (
                guild_id, anti_role_delete, anti_guild_rename,
                anti_channel_delete, anti_channel_create, log_channel
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                anti_role_delete = excluded.anti_role_delete,
                anti_guild_rename = excluded.anti_guild_rename,
                anti_channel_delete = excluded.anti_channel_delete,
                anti_channel_create = excluded.anti_channel_create,
                log_channel = excluded.log_channel
            "#,
        )
        .bind(guild as i64)
        .bind(settings.anti_role_delete)
        .bind(settings.anti_guild_rename)
        .bind(settings.anti_channel_delete)
        .bind(settings.anti_channel_create)
        .bind(settings.log_channel.map(|id| id as i64))
        .execute(&self.pool)
        .await
        .map_err(|e| GuardError::Storage(e.to_string()))?;
        Ok(())
    }
}
