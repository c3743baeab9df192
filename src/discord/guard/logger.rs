// Sends guard notifications to the per-guild log channel, when one is
// configured. Unset channel means silence, not failure.

use crate::core::guard::{GuardLogger, GuardService, GuildId};
use crate::infra::guard::{SqliteListStore, SqliteSettingsStore};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub struct ChannelLogger {
    http: Arc<serenity::Http>,
    guard: Arc<GuardService<SqliteListStore, SqliteSettingsStore>>,
}

impl ChannelLogger {
    pub fn new(
        http: Arc<serenity::Http>,
        guard: Arc<GuardService<SqliteListStore, SqliteSettingsStore>>,
    ) -> Self {
        Self { http, guard }
    }
}

#[async_trait]
impl GuardLogger for ChannelLogger {
    async fn log_event(&self, guild: GuildId, text: &str) {
        let channel = match self.guard.settings_for(guild).await {
            Ok(settings) => settings.log_channel,
            Err(e) => {
                tracing::warn!(guild, "Failed to load settings for log channel: {}", e);
                None
            }
        };
        let Some(channel) = channel else {
            return;
        };

        let message = serenity::CreateMessage::new().content(text);
        if let Err(e) = serenity::ChannelId::new(channel)
            .send_message(&self.http, message)
            .await
        {
            tracing::warn!(guild, channel, "Failed to send guard log message: {}", e);
        }
    }
}
