// Admin slash commands for the guard: allow/deny list management,
// protection toggles, log channel and status.
//
// This layer is THIN - extract ids, call the core service, format the
// response. Validation failures reply with a clear rejection instead of
// erroring.

use crate::core::guard::AUTOMATED;
use crate::discord::commands::{Context, Error};
use poise::serenity_prelude as serenity;

/// Manage the allow list (actors exempt from every sanction).
#[poise::command(
    slash_command,
    subcommands("allow_add", "allow_remove", "allow_list"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn allowlist(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Add a member to the allow list.
#[poise::command(
    slash_command,
    rename = "add",
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn allow_add(
    ctx: Context<'_>,
    #[description = "Member to exempt from moderation"] member: serenity::User,
    #[description = "Why they are trusted"] reason: Option<String>,
) -> Result<(), Error> {
    let inserted = ctx
        .data()
        .guard
        .allow_actor(member.id.get(), ctx.author().id.get(), reason.as_deref())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if inserted {
        ctx.say(format!("✅ <@{}> added to the allow list.", member.id))
            .await?;
    } else {
        ctx.say(format!("<@{}> is already on the allow list.", member.id))
            .await?;
    }
    Ok(())
}

/// Remove a member from the allow list.
#[poise::command(
    slash_command,
    rename = "remove",
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn allow_remove(
    ctx: Context<'_>,
    #[description = "Member to remove"] member: serenity::User,
) -> Result<(), Error> {
    let removed = ctx
        .data()
        .guard
        .unallow_actor(member.id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if removed {
        ctx.say(format!("✅ <@{}> removed from the allow list.", member.id))
            .await?;
    } else {
        ctx.say(format!("<@{}> is not on the allow list.", member.id))
            .await?;
    }
    Ok(())
}

/// Show the allow list.
#[poise::command(slash_command, rename = "list", guild_only)]
pub async fn allow_list(ctx: Context<'_>) -> Result<(), Error> {
    let entries = ctx
        .data()
        .guard
        .allow_entries()
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format_entries("📜 Allow list", &entries)).await?;
    Ok(())
}

/// Manage the deny list (flagged actors, banned on their next offense).
#[poise::command(
    slash_command,
    subcommands("deny_add", "deny_remove", "deny_list"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn denylist(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Add a member to the deny list.
#[poise::command(
    slash_command,
    rename = "add",
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn deny_add(
    ctx: Context<'_>,
    #[description = "Member to flag"] member: serenity::User,
    #[description = "Why they are flagged"] reason: Option<String>,
) -> Result<(), Error> {
    let inserted = ctx
        .data()
        .guard
        .deny_actor(member.id.get(), ctx.author().id.get(), reason.as_deref())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if inserted {
        ctx.say(format!("⛔ <@{}> added to the deny list.", member.id))
            .await?;
    } else {
        ctx.say(format!("<@{}> is already on the deny list.", member.id))
            .await?;
    }
    Ok(())
}

/// Remove a member from the deny list.
#[poise::command(
    slash_command,
    rename = "remove",
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn deny_remove(
    ctx: Context<'_>,
    #[description = "Member to unflag"] member: serenity::User,
) -> Result<(), Error> {
    let removed = ctx
        .data()
        .guard
        .undeny_actor(member.id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if removed {
        ctx.say(format!("✅ <@{}> removed from the deny list.", member.id))
            .await?;
    } else {
        ctx.say(format!("<@{}> is not on the deny list.", member.id))
            .await?;
    }
    Ok(())
}

/// Show the deny list.
#[poise::command(slash_command, rename = "list", guild_only)]
pub async fn deny_list(ctx: Context<'_>) -> Result<(), Error> {
    let entries = ctx
        .data()
        .guard
        .deny_entries()
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format_entries("⛔ Deny list", &entries)).await?;
    Ok(())
}

fn format_entries(title: &str, entries: &[crate::core::guard::ListEntry]) -> String {
    if entries.is_empty() {
        return format!("{}: empty", title);
    }
    let lines: Vec<String> = entries
        .iter()
        .map(|e| {
            let by = if e.added_by == AUTOMATED {
                "automatic".to_string()
            } else {
                format!("<@{}>", e.added_by)
            };
            let reason = e.reason.as_deref().unwrap_or("no reason given");
            format!(
                "• <@{}> — added by {} on {} ({})",
                e.actor,
                by,
                e.added_at.format("%Y-%m-%d %H:%M"),
                reason
            )
        })
        .collect();
    format!("{}:\n{}", title, lines.join("\n"))
}

/// Which protection a toggle command targets.
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum GuardFeature {
    #[name = "Role delete protection"]
    RoleDelete,
    #[name = "Guild rename/icon protection"]
    GuildRename,
    #[name = "Channel delete protection"]
    ChannelDelete,
    #[name = "Channel create protection"]
    ChannelCreate,
}

/// Guard configuration and status commands.
#[poise::command(
    slash_command,
    subcommands("status", "logchannel", "protect"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn guard(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Show guard status: toggles, thresholds and action counters.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let settings = ctx
        .data()
        .guard
        .settings_for(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;
    let stats = ctx.data().stats.snapshot();
    let config = ctx.data().guard.config();

    let toggle = |on: bool| if on { "✅" } else { "❌" };

    let embed = serenity::CreateEmbed::new()
        .title("🛡️ Guard Status")
        .color(0x00FF00)
        .field(
            "Protections",
            format!(
                "{} Role delete\n{} Guild rename/icon\n{} Channel delete\n{} Channel create",
                toggle(settings.anti_role_delete),
                toggle(settings.anti_guild_rename),
                toggle(settings.anti_channel_delete),
                toggle(settings.anti_channel_create),
            ),
            true,
        )
        .field(
            "Thresholds",
            format!(
                "Messages: {}/{}s\nMentions: {}/{}s\nChannels: {}/{}s\nJoins: {}/{}s",
                config.message_flood.threshold,
                config.message_flood.window_secs,
                config.mention_flood.threshold,
                config.mention_flood.window_secs,
                config.channel_create_flood.threshold,
                config.channel_create_flood.window_secs,
                config.join_flood.threshold,
                config.join_flood.window_secs,
            ),
            true,
        )
        .field(
            "Actions taken",
            format!(
                "Bans: {} | Kicks: {} | Timeouts: {}\nMutes: {} | Channels restored: {} | Locks: {}",
                stats.bans,
                stats.kicks,
                stats.timeouts,
                stats.mutes,
                stats.channel_restores,
                stats.locks,
            ),
            false,
        )
        .field(
            "Log channel",
            settings
                .log_channel
                .map(|id| format!("<#{}>", id))
                .unwrap_or_else(|| "not set".to_string()),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Set the channel that receives guard notifications.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn logchannel(
    ctx: Context<'_>,
    #[description = "Channel for guard notifications"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let mut settings = ctx
        .data()
        .guard
        .settings_for(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;
    settings.log_channel = Some(channel.id.get());
    ctx.data()
        .guard
        .update_settings(guild_id.get(), settings)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!("✅ Guard log channel set to <#{}>.", channel.id))
        .await?;
    Ok(())
}

/// Enable or disable one protection for this guild.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn protect(
    ctx: Context<'_>,
    #[description = "Which protection to toggle"] feature: GuardFeature,
    #[description = "Enable or disable it"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let mut settings = ctx
        .data()
        .guard
        .settings_for(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;
    match feature {
        GuardFeature::RoleDelete => settings.anti_role_delete = enabled,
        GuardFeature::GuildRename => settings.anti_guild_rename = enabled,
        GuardFeature::ChannelDelete => settings.anti_channel_delete = enabled,
        GuardFeature::ChannelCreate => settings.anti_channel_create = enabled,
    }
    ctx.data()
        .guard
        .update_settings(guild_id.get(), settings)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let label = match feature {
        GuardFeature::RoleDelete => "Role delete protection",
        GuardFeature::GuildRename => "Guild rename/icon protection",
        GuardFeature::ChannelDelete => "Channel delete protection",
        GuardFeature::ChannelCreate => "Channel create protection",
    };
    ctx.say(format!(
        "{} **{}** is now {}.",
        if enabled { "✅" } else { "❌" },
        label,
        if enabled { "enabled" } else { "disabled" }
    ))
    .await?;
    Ok(())
}
