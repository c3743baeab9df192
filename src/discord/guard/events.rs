// Event adapters - one thin handler per gateway event. Each one classifies
// the raw event into a core GuardEvent, runs it through the pipeline and
// applies whatever came back. Handlers never return errors to the gateway
// loop; a guard that crashes on a malformed event is worse than useless.

use super::classifier;
use super::executor::SerenityExecutor;
use super::logger::ChannelLogger;
use crate::core::guard::{
    apply_verdict, EventKind, EventPayload, GuardEvent,
};
use crate::discord::commands::Data;
use ::serenity::model::guild::audit_log::{Action, ChannelAction, MemberAction, RoleAction};
use poise::serenity_prelude as serenity;
use std::time::Instant;

/// Run a classified event through the pipeline and apply the outcome.
async fn process_and_apply(ctx: &serenity::Context, data: &Data, event: GuardEvent) {
    let verdict = match data.guard.process_event(&event, Instant::now()).await {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::error!(
                guild = event.guild,
                actor = event.actor,
                "Guard pipeline failed for {}: {}",
                event.kind,
                e
            );
            return;
        }
    };

    if !verdict.triggered() {
        return;
    }
    tracing::info!(
        guild = event.guild,
        actor = event.actor,
        "Guard triggered on {}: {}",
        event.kind,
        verdict.reason
    );

    let executor = SerenityExecutor::new(ctx.http.clone());
    let logger = ChannelLogger::new(ctx.http.clone(), data.guard.clone());
    apply_verdict(&executor, &logger, &data.stats, &event, &verdict).await;
}

pub async fn handle_message(ctx: &serenity::Context, data: &Data, msg: &serenity::Message) {
    if let Some(event) = classifier::classify_message(msg) {
        process_and_apply(ctx, data, event).await;
    }
}

pub async fn handle_channel_create(
    ctx: &serenity::Context,
    data: &Data,
    channel: &serenity::GuildChannel,
) {
    let Some(actor) = classifier::resolve_audit_actor(
        ctx,
        channel.guild_id,
        Action::Channel(ChannelAction::Create),
    )
    .await
    else {
        return;
    };

    let event = GuardEvent {
        actor: actor.get(),
        guild: channel.guild_id.get(),
        kind: EventKind::ChannelCreate,
        timestamp: chrono::Utc::now(),
        payload: EventPayload::ChannelCreated {
            channel: channel.id.get(),
            name: channel.name.clone(),
        },
    };
    process_and_apply(ctx, data, event).await;
}

pub async fn handle_channel_delete(
    ctx: &serenity::Context,
    data: &Data,
    channel: &serenity::GuildChannel,
) {
    let Some(actor) = classifier::resolve_audit_actor(
        ctx,
        channel.guild_id,
        Action::Channel(ChannelAction::Delete),
    )
    .await
    else {
        return;
    };

    let event = GuardEvent {
        actor: actor.get(),
        guild: channel.guild_id.get(),
        kind: EventKind::ChannelDelete,
        timestamp: chrono::Utc::now(),
        payload: EventPayload::ChannelDeleted {
            spec: classifier::channel_spec(channel),
        },
    };
    process_and_apply(ctx, data, event).await;
}

/// Only renames matter here; other channel edits pass through untouched.
pub async fn handle_channel_update(
    ctx: &serenity::Context,
    data: &Data,
    old: &Option<serenity::GuildChannel>,
    new: &serenity::GuildChannel,
) {
    let Some(old) = old else {
        // Without the cached previous state there is nothing to compare or
        // restore.
        return;
    };
    if old.name == new.name {
        return;
    }

    let Some(actor) = classifier::resolve_audit_actor(
        ctx,
        new.guild_id,
        Action::Channel(ChannelAction::Update),
    )
    .await
    else {
        return;
    };

    let event = GuardEvent {
        actor: actor.get(),
        guild: new.guild_id.get(),
        kind: EventKind::ChannelRename,
        timestamp: chrono::Utc::now(),
        payload: EventPayload::ChannelRenamed {
            channel: new.id.get(),
            old_name: old.name.clone(),
            new_name: new.name.clone(),
        },
    };
    process_and_apply(ctx, data, event).await;
}

pub async fn handle_role_delete(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    removed: &Option<serenity::Role>,
) {
    let Some(role) = removed else {
        // Role wasn't cached; we can't recreate what we never saw.
        return;
    };
    let Some(actor) =
        classifier::resolve_audit_actor(ctx, guild_id, Action::Role(RoleAction::Delete)).await
    else {
        return;
    };

    let event = GuardEvent {
        actor: actor.get(),
        guild: guild_id.get(),
        kind: EventKind::RoleDelete,
        timestamp: chrono::Utc::now(),
        payload: EventPayload::RoleDeleted {
            spec: classifier::role_spec(role),
        },
    };
    process_and_apply(ctx, data, event).await;
}

/// Guild rename and icon change both arrive as one update event.
pub async fn handle_guild_update(
    ctx: &serenity::Context,
    data: &Data,
    old: &Option<serenity::Guild>,
    new: &serenity::PartialGuild,
) {
    let Some(old) = old else {
        return;
    };

    let renamed = old.name != new.name;
    let icon_changed = old.icon != new.icon;
    if !renamed && !icon_changed {
        return;
    }

    let Some(actor) = classifier::resolve_audit_actor(ctx, new.id, Action::GuildUpdate).await
    else {
        return;
    };

    if renamed {
        let event = GuardEvent {
            actor: actor.get(),
            guild: new.id.get(),
            kind: EventKind::GuildRename,
            timestamp: chrono::Utc::now(),
            payload: EventPayload::GuildRenamed {
                old_name: old.name.clone(),
                new_name: new.name.clone(),
            },
        };
        process_and_apply(ctx, data, event).await;
    }

    if icon_changed {
        let event = GuardEvent {
            actor: actor.get(),
            guild: new.id.get(),
            kind: EventKind::GuildIconChange,
            timestamp: chrono::Utc::now(),
            payload: EventPayload::GuildIconChanged {
                old_icon_url: old.icon_url(),
            },
        };
        process_and_apply(ctx, data, event).await;
    }
}

/// A bot joining is attributed to whoever invited it; human joins feed the
/// raid window under the joiner's own id.
pub async fn handle_member_join(ctx: &serenity::Context, data: &Data, member: &serenity::Member) {
    if member.user.bot {
        let Some(actor) = classifier::resolve_audit_actor(
            ctx,
            member.guild_id,
            Action::Member(MemberAction::BotAdd),
        )
        .await
        else {
            return;
        };

        let event = GuardEvent {
            actor: actor.get(),
            guild: member.guild_id.get(),
            kind: EventKind::BotAdded,
            timestamp: chrono::Utc::now(),
            payload: EventPayload::BotAdded {
                bot: member.user.id.get(),
            },
        };
        process_and_apply(ctx, data, event).await;
        return;
    }

    let event = GuardEvent {
        actor: member.user.id.get(),
        guild: member.guild_id.get(),
        kind: EventKind::MemberJoin,
        timestamp: chrono::Utc::now(),
        payload: EventPayload::MemberJoined,
    };
    process_and_apply(ctx, data, event).await;
}
