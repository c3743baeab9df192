// Event classifier - turns raw serenity events into core GuardEvents.
//
// Structural events (channel/role/guild changes) don't carry the acting
// user, so the classifier resolves them from the newest matching audit-log
// entry, the same way the platform UI attributes such changes.

use crate::core::guard::{
    ChannelSpec, EventKind, EventPayload, GuardEvent, MessageRef, RoleSpec,
};
use ::serenity::model::guild::audit_log::Action;
use poise::serenity_prelude as serenity;

/// Count literal `@everyone` occurrences in a message. The raw content is
/// authoritative; `mention_everyone` only tells us the ping resolved, so it
/// contributes at least one when the content somehow hides the literal.
pub fn count_everyone_mentions(content: &str, mention_everyone: bool) -> u32 {
    let literal = content.matches("@everyone").count() as u32;
    if literal == 0 && mention_everyone {
        1
    } else {
        literal
    }
}

/// Classify an incoming message. Returns `None` for bots and DMs.
pub fn classify_message(msg: &serenity::Message) -> Option<GuardEvent> {
    if msg.author.bot {
        return None;
    }
    let guild_id = msg.guild_id?;

    let everyone_mentions = count_everyone_mentions(&msg.content, msg.mention_everyone);
    let kind = if everyone_mentions > 0 {
        EventKind::MassMention
    } else {
        EventKind::Message
    };

    Some(GuardEvent {
        actor: msg.author.id.get(),
        guild: guild_id.get(),
        kind,
        timestamp: chrono::Utc::now(),
        payload: EventPayload::Message {
            message: MessageRef {
                channel_id: msg.channel_id.get(),
                message_id: msg.id.get(),
            },
            everyone_mentions,
        },
    })
}

/// Resolve who performed a structural change from the newest audit-log
/// entry matching `action`. Returns `None` when the log is unavailable or
/// the actor is the bot itself (our own reverts must not re-trigger).
pub async fn resolve_audit_actor(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    action: Action,
) -> Option<serenity::UserId> {
    let logs = guild_id
        .audit_logs(&ctx.http, Some(action), None, None, Some(1))
        .await
        .ok()?;
    let actor = logs.entries.first().map(|entry| entry.user_id)?;
    if actor == ctx.cache.current_user().id {
        return None;
    }
    Some(actor)
}

pub fn channel_spec(channel: &serenity::GuildChannel) -> ChannelSpec {
    ChannelSpec {
        name: channel.name.clone(),
        voice: channel.kind == serenity::ChannelType::Voice,
        category: channel.parent_id.map(|id| id.get()),
    }
}

pub fn role_spec(role: &serenity::Role) -> RoleSpec {
    RoleSpec {
        name: role.name.clone(),
        colour: role.colour.0,
        hoist: role.hoist,
        mentionable: role.mentionable,
        permissions: role.permissions.bits(),
    }
}
