// Discord commands module and shared framework types.

pub mod guard;

use crate::core::guard::{GuardService, GuardStats};
use crate::infra::guard::{SqliteListStore, SqliteSettingsStore};
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands and event handlers.
pub struct Data {
    pub guard: Arc<GuardService<SqliteListStore, SqliteSettingsStore>>,
    pub stats: Arc<GuardStats>,
}
