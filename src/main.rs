// This is the entry point of the guard bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::guard::{GuardConfig, GuardService, GuardStats};
use crate::discord::guard::events as guard_events;
use crate::discord::{Data, Error};
use crate::infra::guard::{SqliteListStore, SqliteSettingsStore};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// Every guild event the guard watches funnels through here into the
/// moderation pipeline.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            guard_events::handle_message(ctx, data, new_message).await;
        }

        serenity::FullEvent::ChannelCreate { channel } => {
            guard_events::handle_channel_create(ctx, data, channel).await;
        }

        serenity::FullEvent::ChannelDelete { channel, .. } => {
            guard_events::handle_channel_delete(ctx, data, channel).await;
        }

        serenity::FullEvent::ChannelUpdate { old, new } => {
            guard_events::handle_channel_update(ctx, data, old, new).await;
        }

        serenity::FullEvent::GuildRoleDelete {
            guild_id,
            removed_role_data_if_available,
            ..
        } => {
            guard_events::handle_role_delete(ctx, data, *guild_id, removed_role_data_if_available)
                .await;
        }

        serenity::FullEvent::GuildUpdate {
            old_data_if_available,
            new_data,
        } => {
            guard_events::handle_guild_update(ctx, data, old_data_if_available, new_data).await;
        }

        serenity::FullEvent::GuildMemberAddition { new_member } => {
            guard_events::handle_member_join(ctx, data, new_member).await;
        }

        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep the runtime database in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory for SQLite files");
    let guard_db_path = format!("{}/guard.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", guard_db_path))
        .await
        .expect("Failed to connect to guard DB");

    let list_store = SqliteListStore::new(pool.clone());
    list_store
        .migrate()
        .await
        .expect("Failed to migrate list tables");
    let settings_store = SqliteSettingsStore::new(pool);
    settings_store
        .migrate()
        .await
        .expect("Failed to migrate settings table");

    let guard_service = Arc::new(GuardService::new(
        list_store,
        settings_store,
        GuardConfig::default(),
    ));
    let stats = Arc::new(GuardStats::default());

    // Create the data structure that will be shared across all commands
    let data = Data {
        guard: Arc::clone(&guard_service),
        stats: Arc::clone(&stats),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::guard::allowlist(),
                discord::commands::guard::denylist(),
                discord::commands::guard::guard(),
            ],
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                println!("🛡️ Guard bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                println!("✅ Commands registered!");
                println!("🚀 Bot is ready!");

                // Background sweep so windows for quiet actors don't pile up.
                let sweeper = Arc::clone(&guard_service);
                tokio::spawn(async move {
                    use std::time::{Duration, Instant};
                    use tokio::time::sleep;

                    loop {
                        sleep(Duration::from_secs(60)).await;
                        sweeper.sweep_windows(Instant::now());
                        tracing::debug!("Swept stale rate windows");
                    }
                });

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot. The cache must hold enough state
    // to hand us pre-change snapshots for channel and guild updates.
    let mut settings = serenity::cache::Settings::default();
    settings.max_messages = 10000;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .cache_settings(settings)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
