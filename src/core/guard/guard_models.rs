// Guard domain models - data structures for the moderation pipeline.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts these to platform-specific actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque platform user id.
pub type ActorId = u64;
/// Opaque platform guild id.
pub type GuildId = u64;

/// `added_by` value for deny-list entries created by the pipeline itself
/// rather than by an admin command.
pub const AUTOMATED: ActorId = 0;

/// Kind of observed platform occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Message,
    MassMention,
    ChannelCreate,
    ChannelDelete,
    ChannelUpdate,
    ChannelRename,
    RoleDelete,
    GuildRename,
    GuildIconChange,
    MemberJoin,
    BotAdded,
}

impl EventKind {
    /// Whether this kind is an active abuse signal on its own. A deny-listed
    /// actor performing one of these is banned outright; ordinary messages
    /// and joins only escalate through a rate breach.
    pub fn is_monitored_action(&self) -> bool {
        !matches!(
            self,
            EventKind::Message | EventKind::MemberJoin | EventKind::ChannelUpdate
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Message => "message",
            EventKind::MassMention => "mass mention",
            EventKind::ChannelCreate => "channel create",
            EventKind::ChannelDelete => "channel delete",
            EventKind::ChannelUpdate => "channel update",
            EventKind::ChannelRename => "channel rename",
            EventKind::RoleDelete => "role delete",
            EventKind::GuildRename => "guild rename",
            EventKind::GuildIconChange => "guild icon change",
            EventKind::MemberJoin => "member join",
            EventKind::BotAdded => "bot added",
        };
        write!(f, "{}", name)
    }
}

/// Reference to a message, enough for the executor to delete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Snapshot of a channel taken before it disappeared, used to recreate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub voice: bool,
    pub category: Option<u64>,
}

/// Snapshot of a role taken before it disappeared, used to recreate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub colour: u32,
    pub hoist: bool,
    pub mentionable: bool,
    pub permissions: u64,
}

/// Kind-specific payload carried by a [`GuardEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// A message was sent. `everyone_mentions` counts `@everyone` occurrences
    /// in the raw content.
    Message {
        message: MessageRef,
        everyone_mentions: u32,
    },
    ChannelCreated { channel: u64, name: String },
    ChannelDeleted { spec: ChannelSpec },
    ChannelRenamed {
        channel: u64,
        old_name: String,
        new_name: String,
    },
    RoleDeleted { spec: RoleSpec },
    GuildRenamed { old_name: String, new_name: String },
    GuildIconChanged { old_icon_url: Option<String> },
    MemberJoined,
    BotAdded { bot: ActorId },
}

/// Immutable record of one observed occurrence. Built by the classifier,
/// consumed by the evaluator, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardEvent {
    pub actor: ActorId,
    pub guild: GuildId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

/// Punitive platform mutation applied to an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanctionKind {
    Timeout { duration_secs: u64 },
    Kick,
    Ban,
    MuteRole,
}

impl std::fmt::Display for SanctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SanctionKind::Timeout { duration_secs } => write!(f, "timeout ({}s)", duration_secs),
            SanctionKind::Kick => write!(f, "kick"),
            SanctionKind::Ban => write!(f, "ban"),
            SanctionKind::MuteRole => write!(f, "mute role"),
        }
    }
}

/// Best-effort restoration of a structural entity to its prior state.
#[derive(Debug, Clone, PartialEq)]
pub enum RevertAction {
    DeleteChannel { channel: u64 },
    RecreateChannel { spec: ChannelSpec },
    RecreateRole { spec: RoleSpec },
    RenameChannel { channel: u64, previous_name: String },
    RenameGuild { previous_name: String },
    RestoreGuildIcon { previous_icon_url: Option<String> },
    RemoveBot { bot: ActorId },
}

/// One action the pipeline decided to take.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Sanction {
        kind: SanctionKind,
        reason: String,
    },
    RevertAndSanction {
        revert: RevertAction,
        sanction: SanctionKind,
        reason: String,
    },
    /// Disable the default role's send permission on every text channel.
    LockServer { reason: String },
}

/// Which detection rule produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    DenyListed,
    StructuralChange,
    NukedName,
    MessageFlood,
    MentionFlood,
    ChannelCreateFlood,
    JoinFlood,
}

impl RuleKind {
    /// Rules whose triggering event is a message the executor should delete.
    pub fn is_message_rule(&self) -> bool {
        matches!(self, RuleKind::MessageFlood | RuleKind::MentionFlood)
    }
}

/// Result of evaluating one event. Zero decisions means "no action".
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub rule: Option<RuleKind>,
    pub decisions: Vec<Decision>,
    pub reason: String,
}

impl Verdict {
    /// A verdict that takes no action.
    pub fn clean() -> Self {
        Self {
            rule: None,
            decisions: Vec::new(),
            reason: String::new(),
        }
    }

    pub fn flagged(rule: RuleKind, decisions: Vec<Decision>, reason: impl Into<String>) -> Self {
        Self {
            rule: Some(rule),
            decisions,
            reason: reason.into(),
        }
    }

    pub fn triggered(&self) -> bool {
        !self.decisions.is_empty()
    }
}

/// Allow-list or deny-list membership record. Permanent until removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub actor: ActorId,
    pub added_by: ActorId,
    pub added_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Per-guild protection toggles. Created lazily on first reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub anti_role_delete: bool,
    pub anti_guild_rename: bool,
    pub anti_channel_delete: bool,
    pub anti_channel_create: bool,
    pub log_channel: Option<u64>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            anti_role_delete: true,
            anti_guild_rename: true,
            anti_channel_delete: true,
            anti_channel_create: true,
            log_channel: None,
        }
    }
}

/// One rate rule: how many events within the trailing window trip it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRule {
    pub window_secs: u64,
    pub threshold: u32,
}

/// Detection thresholds and sanction durations. All parameterized rather
/// than hard-coded; the defaults follow the observed policy family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    pub message_flood: RateRule,
    pub mention_flood: RateRule,
    pub channel_create_flood: RateRule,
    pub join_flood: RateRule,
    /// Strictly-more-than this many `@everyone` in one message sanctions.
    pub max_everyone_per_message: u32,
    pub flood_timeout_secs: u64,
    pub mention_timeout_secs: u64,
    pub structural_timeout_secs: u64,
    /// Kick instead of timeout for structural-integrity violations.
    pub kick_on_structural: bool,
    /// A rate breach by an already deny-listed actor escalates straight to
    /// ban instead of repeating the rule's own sanction.
    pub escalate_repeat_to_ban: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            message_flood: RateRule {
                window_secs: 6,
                threshold: 8,
            },
            mention_flood: RateRule {
                window_secs: 3,
                threshold: 3,
            },
            channel_create_flood: RateRule {
                window_secs: 3,
                threshold: 3,
            },
            join_flood: RateRule {
                window_secs: 10,
                threshold: 5,
            },
            max_everyone_per_message: 2,
            flood_timeout_secs: 60,
            mention_timeout_secs: 120,
            structural_timeout_secs: 120,
            kick_on_structural: false,
            escalate_repeat_to_ban: true,
        }
    }
}

impl GuardConfig {
    /// Sanction applied for structural-integrity violations.
    pub fn structural_sanction(&self) -> SanctionKind {
        if self.kick_on_structural {
            SanctionKind::Kick
        } else {
            SanctionKind::Timeout {
                duration_secs: self.structural_timeout_secs,
            }
        }
    }
}

/// Process-wide action counters, observability only.
#[derive(Debug, Default)]
pub struct GuardStats {
    pub bans: AtomicU64,
    pub kicks: AtomicU64,
    pub timeouts: AtomicU64,
    pub mutes: AtomicU64,
    pub channel_restores: AtomicU64,
    pub locks: AtomicU64,
}

/// Plain-number copy of [`GuardStats`] for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub bans: u64,
    pub kicks: u64,
    pub timeouts: u64,
    pub mutes: u64,
    pub channel_restores: u64,
    pub locks: u64,
}

impl GuardStats {
    pub fn count_sanction(&self, kind: &SanctionKind) {
        match kind {
            SanctionKind::Timeout { .. } => self.timeouts.fetch_add(1, Ordering::Relaxed),
            SanctionKind::Kick => self.kicks.fetch_add(1, Ordering::Relaxed),
            SanctionKind::Ban => self.bans.fetch_add(1, Ordering::Relaxed),
            SanctionKind::MuteRole => self.mutes.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn count_lock(&self) {
        self.locks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_channel_restore(&self) {
        self.channel_restores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bans: self.bans.load(Ordering::Relaxed),
            kicks: self.kicks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            mutes: self.mutes.load(Ordering::Relaxed),
            channel_restores: self.channel_restores.load(Ordering::Relaxed),
            locks: self.locks.load(Ordering::Relaxed),
        }
    }
}
