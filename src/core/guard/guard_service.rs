// Guard service - core decision pipeline for the moderation add-on.
//
// One ordered evaluator instead of per-handler checks scattered around:
// allow-list first, then the per-guild feature toggle, then deny-list,
// then structural reverts and rate windows. Every event kind feeds the
// same pipeline through a thin adapter in the discord layer.
//
// NO Discord dependencies here - just pure domain logic.

use super::guard_models::{
    ActorId, Decision, EventKind, EventPayload, GuardConfig, GuardEvent, GuildId, GuildSettings,
    ListEntry, RevertAction, RuleKind, SanctionKind, Verdict, AUTOMATED,
};
use super::window::RuleWindows;
use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Storage error: {0}")]
    Storage(String),
}

// ============================================================================
// STORAGE TRAITS (PORTS)
// ============================================================================

/// Persistent allow/deny list membership.
///
/// Upserts are insert-if-absent: re-adding an existing actor keeps the
/// original entry (and its `added_at`) and reports `false`.
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn is_allowed(&self, actor: ActorId) -> Result<bool, GuardError>;

    async fn is_denied(&self, actor: ActorId) -> Result<bool, GuardError>;

    /// Returns `true` if the actor was newly inserted.
    async fn upsert_allow(
        &self,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError>;

    /// Returns `true` if the actor was newly inserted.
    async fn upsert_deny(
        &self,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError>;

    /// Returns `true` if an entry existed and was removed.
    async fn remove_allow(&self, actor: ActorId) -> Result<bool, GuardError>;

    /// Returns `true` if an entry existed and was removed.
    async fn remove_deny(&self, actor: ActorId) -> Result<bool, GuardError>;

    async fn list_allow(&self) -> Result<Vec<ListEntry>, GuardError>;

    async fn list_deny(&self) -> Result<Vec<ListEntry>, GuardError>;
}

/// Per-guild settings. `get` lazily materializes the default row.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, guild: GuildId) -> Result<GuildSettings, GuardError>;

    async fn set(&self, guild: GuildId, settings: GuildSettings) -> Result<(), GuardError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The moderation decision pipeline. Owns the sliding windows; list and
/// settings storage are injected.
pub struct GuardService<L: ListStore, S: SettingsStore> {
    lists: L,
    settings: S,
    windows: RuleWindows,
    config: GuardConfig,
}

impl<L: ListStore, S: SettingsStore> GuardService<L, S> {
    pub fn new(lists: L, settings: S, config: GuardConfig) -> Self {
        let windows = RuleWindows::new(&config);
        Self {
            lists,
            settings,
            windows,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Evaluate one classified event. `at` is the monotonic receipt time
    /// used for window arithmetic; callers pass `Instant::now()`, tests a
    /// synthetic base.
    ///
    /// Any sanction-bearing verdict also upserts the actor onto the
    /// deny-list here, so the bookkeeping holds even when the platform
    /// mutation later fails.
    pub async fn process_event(
        &self,
        event: &GuardEvent,
        at: Instant,
    ) -> Result<Verdict, GuardError> {
        // Allow-list dominates everything, including counts far above any
        // threshold. Windows for the actor keep accumulating but are never
        // consulted, so removal mid-burst sees the real count.
        if self.lists.is_allowed(event.actor).await? {
            self.record_only(event, at);
            return Ok(Verdict::clean());
        }

        let settings = self.settings.get(event.guild).await?;
        if !kind_enabled(event.kind, &settings) {
            return Ok(Verdict::clean());
        }

        let denied = self.lists.is_denied(event.actor).await?;
        if denied && event.kind.is_monitored_action() {
            let reason = format!("deny-listed actor performed {}", event.kind);
            return Ok(Verdict::flagged(
                RuleKind::DenyListed,
                vec![Decision::Sanction {
                    kind: SanctionKind::Ban,
                    reason: reason.clone(),
                }],
                reason,
            ));
        }

        let verdict = match event.kind {
            EventKind::Message | EventKind::MassMention => self.check_message(event, at, denied),
            EventKind::ChannelCreate => self.check_channel_create(event, at),
            EventKind::ChannelRename => self.check_channel_rename(event),
            EventKind::ChannelDelete => self.check_channel_delete(event),
            EventKind::RoleDelete => self.check_role_delete(event),
            EventKind::GuildRename | EventKind::GuildIconChange => self.check_guild_change(event),
            EventKind::MemberJoin => self.check_member_join(event, at),
            EventKind::BotAdded => self.check_bot_added(event),
            EventKind::ChannelUpdate => Verdict::clean(),
        };

        if verdict.decisions.iter().any(carries_sanction) {
            self.lists
                .upsert_deny(event.actor, AUTOMATED, Some(&verdict.reason))
                .await?;
        }

        Ok(verdict)
    }

    /// Feeds the event into its rule window without evaluating anything.
    /// Mirrors the recording the checks below would do.
    fn record_only(&self, event: &GuardEvent, at: Instant) {
        let key = (event.guild, event.actor);
        match event.kind {
            EventKind::Message | EventKind::MassMention => {
                if let EventPayload::Message {
                    everyone_mentions, ..
                } = &event.payload
                {
                    if *everyone_mentions > 0 {
                        self.windows.mention_flood.record(key, at);
                    }
                }
                self.windows.message_flood.record(key, at);
            }
            EventKind::ChannelCreate => {
                self.windows.channel_create_flood.record(key, at);
            }
            EventKind::MemberJoin => {
                self.windows.join_flood.record(event.guild, at);
            }
            _ => {}
        }
    }

    /// A rate breach by an actor who is already deny-listed is a repeat
    /// offense and escalates straight to ban (when configured).
    fn escalated(&self, denied: bool, base: SanctionKind) -> SanctionKind {
        if denied && self.config.escalate_repeat_to_ban {
            SanctionKind::Ban
        } else {
            base
        }
    }

    fn check_message(&self, event: &GuardEvent, at: Instant, denied: bool) -> Verdict {
        let everyone_mentions = match &event.payload {
            EventPayload::Message {
                everyone_mentions, ..
            } => *everyone_mentions,
            _ => 0,
        };
        let key = (event.guild, event.actor);

        // Single-message check: strictly more than the cap triggers.
        if everyone_mentions > self.config.max_everyone_per_message {
            let reason = format!(
                "{} @everyone mentions in one message",
                everyone_mentions
            );
            let kind = self.escalated(
                denied,
                SanctionKind::Timeout {
                    duration_secs: self.config.mention_timeout_secs,
                },
            );
            return Verdict::flagged(
                RuleKind::MentionFlood,
                vec![Decision::Sanction {
                    kind,
                    reason: reason.clone(),
                }],
                reason,
            );
        }

        // Windowed mass-mention check: a mention-bearing message still has
        // its own window, separate from the plain flood window.
        if everyone_mentions > 0 {
            let count = self.windows.mention_flood.record(key, at);
            if count >= self.config.mention_flood.threshold as usize {
                self.windows.mention_flood.clear(&key);
                let reason = format!(
                    "{} @everyone messages within {}s",
                    count, self.config.mention_flood.window_secs
                );
                let kind = self.escalated(denied, SanctionKind::MuteRole);
                return Verdict::flagged(
                    RuleKind::MentionFlood,
                    vec![Decision::Sanction {
                        kind,
                        reason: reason.clone(),
                    }],
                    reason,
                );
            }
        }

        let count = self.windows.message_flood.record(key, at);
        if count >= self.config.message_flood.threshold as usize {
            self.windows.message_flood.clear(&key);
            let reason = format!(
                "{} messages within {}s",
                count, self.config.message_flood.window_secs
            );
            let kind = self.escalated(
                denied,
                SanctionKind::Timeout {
                    duration_secs: self.config.flood_timeout_secs,
                },
            );
            return Verdict::flagged(
                RuleKind::MessageFlood,
                vec![Decision::Sanction {
                    kind,
                    reason: reason.clone(),
                }],
                reason,
            );
        }

        Verdict::clean()
    }

    fn check_channel_create(&self, event: &GuardEvent, at: Instant) -> Verdict {
        let (channel, name) = match &event.payload {
            EventPayload::ChannelCreated { channel, name } => (*channel, name.as_str()),
            _ => return Verdict::clean(),
        };

        // Content filter on the create path, independent of rate.
        if name.to_lowercase().contains("nuked") {
            let reason = format!("created channel with forbidden name \"{}\"", name);
            return Verdict::flagged(
                RuleKind::NukedName,
                vec![Decision::RevertAndSanction {
                    revert: RevertAction::DeleteChannel { channel },
                    sanction: SanctionKind::Ban,
                    reason: reason.clone(),
                }],
                reason,
            );
        }

        let key = (event.guild, event.actor);
        let count = self.windows.channel_create_flood.record(key, at);
        if count >= self.config.channel_create_flood.threshold as usize {
            self.windows.channel_create_flood.clear(&key);
            let reason = format!(
                "{} channels created within {}s",
                count, self.config.channel_create_flood.window_secs
            );
            return Verdict::flagged(
                RuleKind::ChannelCreateFlood,
                vec![
                    Decision::LockServer {
                        reason: reason.clone(),
                    },
                    Decision::Sanction {
                        kind: SanctionKind::Ban,
                        reason: reason.clone(),
                    },
                ],
                reason,
            );
        }

        Verdict::clean()
    }

    fn check_channel_rename(&self, event: &GuardEvent) -> Verdict {
        let (channel, old_name, new_name) = match &event.payload {
            EventPayload::ChannelRenamed {
                channel,
                old_name,
                new_name,
            } => (*channel, old_name, new_name),
            _ => return Verdict::clean(),
        };

        if new_name.to_lowercase().contains("nuked") {
            let reason = format!("renamed channel to forbidden name \"{}\"", new_name);
            return Verdict::flagged(
                RuleKind::NukedName,
                vec![Decision::RevertAndSanction {
                    revert: RevertAction::RenameChannel {
                        channel,
                        previous_name: old_name.clone(),
                    },
                    sanction: SanctionKind::Ban,
                    reason: reason.clone(),
                }],
                reason,
            );
        }

        Verdict::clean()
    }

    fn check_channel_delete(&self, event: &GuardEvent) -> Verdict {
        let spec = match &event.payload {
            EventPayload::ChannelDeleted { spec } => spec.clone(),
            _ => return Verdict::clean(),
        };
        let reason = format!("deleted channel \"{}\"", spec.name);
        self.structural(RevertAction::RecreateChannel { spec }, reason)
    }

    fn check_role_delete(&self, event: &GuardEvent) -> Verdict {
        let spec = match &event.payload {
            EventPayload::RoleDeleted { spec } => spec.clone(),
            _ => return Verdict::clean(),
        };
        let reason = format!("deleted role \"{}\"", spec.name);
        self.structural(RevertAction::RecreateRole { spec }, reason)
    }

    fn check_guild_change(&self, event: &GuardEvent) -> Verdict {
        match &event.payload {
            EventPayload::GuildRenamed { old_name, new_name } => {
                let reason = format!("renamed guild \"{}\" to \"{}\"", old_name, new_name);
                self.structural(
                    RevertAction::RenameGuild {
                        previous_name: old_name.clone(),
                    },
                    reason,
                )
            }
            EventPayload::GuildIconChanged { old_icon_url } => self.structural(
                RevertAction::RestoreGuildIcon {
                    previous_icon_url: old_icon_url.clone(),
                },
                "changed the guild icon".to_string(),
            ),
            _ => Verdict::clean(),
        }
    }

    fn check_member_join(&self, event: &GuardEvent, at: Instant) -> Verdict {
        let count = self.windows.join_flood.record(event.guild, at);
        if count >= self.config.join_flood.threshold as usize {
            self.windows.join_flood.clear(&event.guild);
            let reason = format!(
                "{} members joined within {}s",
                count, self.config.join_flood.window_secs
            );
            // A raid lock punishes nobody in particular; the joiners are
            // not sanctioned.
            return Verdict::flagged(
                RuleKind::JoinFlood,
                vec![Decision::LockServer {
                    reason: reason.clone(),
                }],
                reason,
            );
        }
        Verdict::clean()
    }

    fn check_bot_added(&self, event: &GuardEvent) -> Verdict {
        let bot = match &event.payload {
            EventPayload::BotAdded { bot } => *bot,
            _ => return Verdict::clean(),
        };
        self.structural(
            RevertAction::RemoveBot { bot },
            "added an unauthorized bot".to_string(),
        )
    }

    fn structural(&self, revert: RevertAction, reason: String) -> Verdict {
        Verdict::flagged(
            RuleKind::StructuralChange,
            vec![Decision::RevertAndSanction {
                revert,
                sanction: self.config.structural_sanction(),
                reason: reason.clone(),
            }],
            reason,
        )
    }

    /// Drops stale window keys; called from a periodic background task.
    pub fn sweep_windows(&self, now: Instant) {
        self.windows.sweep(now);
    }

    // ------------------------------------------------------------------------
    // List and settings passthroughs for the admin commands.
    // ------------------------------------------------------------------------

    pub async fn allow_actor(
        &self,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError> {
        self.lists.upsert_allow(actor, added_by, reason).await
    }

    pub async fn deny_actor(
        &self,
        actor: ActorId,
        added_by: ActorId,
        reason: Option<&str>,
    ) -> Result<bool, GuardError> {
        self.lists.upsert_deny(actor, added_by, reason).await
    }

    pub async fn unallow_actor(&self, actor: ActorId) -> Result<bool, GuardError> {
        self.lists.remove_allow(actor).await
    }

    pub async fn undeny_actor(&self, actor: ActorId) -> Result<bool, GuardError> {
        self.lists.remove_deny(actor).await
    }

    pub async fn allow_entries(&self) -> Result<Vec<ListEntry>, GuardError> {
        self.lists.list_allow().await
    }

    pub async fn deny_entries(&self) -> Result<Vec<ListEntry>, GuardError> {
        self.lists.list_deny().await
    }

    pub async fn settings_for(&self, guild: GuildId) -> Result<GuildSettings, GuardError> {
        self.settings.get(guild).await
    }

    pub async fn update_settings(
        &self,
        guild: GuildId,
        settings: GuildSettings,
    ) -> Result<(), GuardError> {
        self.settings.set(guild, settings).await
    }
}

/// Feature-toggle gate: a disabled toggle makes the detector for that kind
/// inert. Kinds without a toggle are always active.
fn kind_enabled(kind: EventKind, settings: &GuildSettings) -> bool {
    match kind {
        EventKind::RoleDelete => settings.anti_role_delete,
        EventKind::GuildRename | EventKind::GuildIconChange => settings.anti_guild_rename,
        EventKind::ChannelDelete => settings.anti_channel_delete,
        EventKind::ChannelCreate | EventKind::ChannelRename | EventKind::ChannelUpdate => {
            settings.anti_channel_create
        }
        _ => true,
    }
}

fn carries_sanction(decision: &Decision) -> bool {
    matches!(
        decision,
        Decision::Sanction { .. } | Decision::RevertAndSanction { .. }
    )
}

// ============================================================================
// TESTS
// ============================================================================
