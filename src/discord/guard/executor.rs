// Serenity-backed ActionExecutor - the only place the guard mutates the
// platform. Each method maps serenity errors onto the core taxonomy; the
// caller (apply_verdict) logs and discards them.

use crate::core::guard::{
    ActionExecutor, ActorId, ChannelSpec, ExecError, GuildId, MessageRef, RoleSpec,
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub struct SerenityExecutor {
    http: Arc<serenity::Http>,
}

impl SerenityExecutor {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn map_err(context: &str, e: serenity::Error) -> ExecError {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(ref resp)) = e {
        return match resp.status_code.as_u16() {
            403 => ExecError::PermissionDenied(format!("{}: {}", context, e)),
            404 => ExecError::EntityNotFound(format!("{}: {}", context, e)),
            429 => ExecError::RateLimited(format!("{}: {}", context, e)),
            _ => ExecError::Platform(format!("{}: {}", context, e)),
        };
    }
    ExecError::Platform(format!("{}: {}", context, e))
}

#[async_trait]
impl ActionExecutor for SerenityExecutor {
    async fn timeout(
        &self,
        guild: GuildId,
        actor: ActorId,
        duration_secs: u64,
        reason: &str,
    ) -> Result<(), ExecError> {
        let until = serenity::Timestamp::from_unix_timestamp(
            chrono::Utc::now().timestamp() + duration_secs as i64,
        )
        .map_err(|e| ExecError::Platform(format!("timeout timestamp: {}", e)))?;

        serenity::GuildId::new(guild)
            .edit_member(
                &self.http,
                serenity::UserId::new(actor),
                serenity::EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(reason),
            )
            .await
            .map(|_| ())
            .map_err(|e| map_err("timeout", e))
    }

    async fn kick(&self, guild: GuildId, actor: ActorId, reason: &str) -> Result<(), ExecError> {
        serenity::GuildId::new(guild)
            .kick_with_reason(&self.http, serenity::UserId::new(actor), reason)
            .await
            .map_err(|e| map_err("kick", e))
    }

    async fn ban(&self, guild: GuildId, actor: ActorId, reason: &str) -> Result<(), ExecError> {
        serenity::GuildId::new(guild)
            .ban_with_reason(&self.http, serenity::UserId::new(actor), 0, reason)
            .await
            .map_err(|e| map_err("ban", e))
    }

    async fn apply_mute_role(
        &self,
        guild: GuildId,
        actor: ActorId,
        reason: &str,
    ) -> Result<(), ExecError> {
        let guild_id = serenity::GuildId::new(guild);
        let roles = guild_id
            .roles(&self.http)
            .await
            .map_err(|e| map_err("fetch roles", e))?;
        let muted = roles
            .values()
            .find(|role| role.name.eq_ignore_ascii_case("muted"))
            .ok_or_else(|| ExecError::EntityNotFound("no Muted role in guild".to_string()))?;

        self.http
            .add_member_role(guild_id, serenity::UserId::new(actor), muted.id, Some(reason))
            .await
            .map_err(|e| map_err("apply mute role", e))
    }

    async fn delete_message(
        &self,
        _guild: GuildId,
        message: &MessageRef,
        reason: &str,
    ) -> Result<(), ExecError> {
        self.http
            .delete_message(
                serenity::ChannelId::new(message.channel_id),
                serenity::MessageId::new(message.message_id),
                Some(reason),
            )
            .await
            .map_err(|e| map_err("delete message", e))
    }

    async fn delete_channel(
        &self,
        _guild: GuildId,
        channel: u64,
        reason: &str,
    ) -> Result<(), ExecError> {
        self.http
            .delete_channel(serenity::ChannelId::new(channel), Some(reason))
            .await
            .map(|_| ())
            .map_err(|e| map_err("delete channel", e))
    }

    async fn recreate_channel(&self, guild: GuildId, spec: &ChannelSpec) -> Result<(), ExecError> {
        let kind = if spec.voice {
            serenity::ChannelType::Voice
        } else {
            serenity::ChannelType::Text
        };
        let mut builder = serenity::CreateChannel::new(&spec.name).kind(kind);
        if let Some(category) = spec.category {
            builder = builder.category(serenity::ChannelId::new(category));
        }

        serenity::GuildId::new(guild)
            .create_channel(&self.http, builder)
            .await
            .map(|_| ())
            .map_err(|e| map_err("recreate channel", e))
    }

    async fn recreate_role(&self, guild: GuildId, spec: &RoleSpec) -> Result<(), ExecError> {
        serenity::GuildId::new(guild)
            .create_role(
                &self.http,
                serenity::EditRole::new()
                    .name(&spec.name)
                    .colour(spec.colour)
                    .hoist(spec.hoist)
                    .mentionable(spec.mentionable)
                    .permissions(serenity::Permissions::from_bits_truncate(spec.permissions)),
            )
            .await
            .map(|_| ())
            .map_err(|e| map_err("recreate role", e))
    }

    async fn rename_channel(
        &self,
        _guild: GuildId,
        channel: u64,
        previous_name: &str,
    ) -> Result<(), ExecError> {
        serenity::ChannelId::new(channel)
            .edit(&self.http, serenity::EditChannel::new().name(previous_name))
            .await
            .map(|_| ())
            .map_err(|e| map_err("rename channel", e))
    }

    async fn rename_guild(&self, guild: GuildId, previous_name: &str) -> Result<(), ExecError> {
        serenity::GuildId::new(guild)
            .edit(&self.http, serenity::EditGuild::new().name(previous_name))
            .await
            .map(|_| ())
            .map_err(|e| map_err("rename guild", e))
    }

    async fn restore_guild_icon(
        &self,
        guild: GuildId,
        previous_icon_url: Option<&str>,
    ) -> Result<(), ExecError> {
        let builder = match previous_icon_url {
            Some(url) => {
                // The platform only hands us the previous icon's URL, so we
                // re-fetch the bytes before re-uploading.
                let bytes = reqwest::get(url)
                    .await
                    .map_err(|e| ExecError::Platform(format!("fetch previous icon: {}", e)))?
                    .bytes()
                    .await
                    .map_err(|e| ExecError::Platform(format!("read previous icon: {}", e)))?;
                let attachment =
                    serenity::CreateAttachment::bytes(bytes.to_vec(), "previous_icon.png");
                serenity::EditGuild::new().icon(Some(&attachment))
            }
            None => serenity::EditGuild::new().icon(None),
        };

        serenity::GuildId::new(guild)
            .edit(&self.http, builder)
            .await
            .map(|_| ())
            .map_err(|e| map_err("restore guild icon", e))
    }

    async fn remove_bot(
        &self,
        guild: GuildId,
        bot: ActorId,
        reason: &str,
    ) -> Result<(), ExecError> {
        serenity::GuildId::new(guild)
            .kick_with_reason(&self.http, serenity::UserId::new(bot), reason)
            .await
            .map_err(|e| map_err("remove bot", e))
    }

    async fn lock_server(&self, guild: GuildId, reason: &str) -> Result<(), ExecError> {
        let guild_id = serenity::GuildId::new(guild);
        let channels = guild_id
            .channels(&self.http)
            .await
            .map_err(|e| map_err("fetch channels", e))?;

        // The default role's id equals the guild id. Only text channels are
        // touched; voice and existing overwrites stay as they are.
        let deny = serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: serenity::Permissions::SEND_MESSAGES,
            kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild)),
        };

        let mut locked = 0usize;
        let mut last_err = None;
        for channel in channels.values() {
            if channel.kind != serenity::ChannelType::Text {
                continue;
            }
            match channel.id.create_permission(&self.http, deny.clone()).await {
                Ok(()) => locked += 1,
                Err(e) => {
                    tracing::warn!(
                        channel = channel.id.get(),
                        "Failed to lock channel ({}): {}",
                        reason,
                        e
                    );
                    last_err = Some(map_err("lock channel", e));
                }
            }
        }

        // Partial locks still count as applied.
        match last_err {
            Some(e) if locked == 0 => Err(e),
            _ => Ok(()),
        }
    }
}
