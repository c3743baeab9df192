// Platform mutation boundary and the single place decisions are applied.
//
// The executor trait abstracts every Discord mutation the pipeline can ask
// for. `apply_verdict` is the one call site where executor failures are
// logged and discarded: moderation is best-effort and must never crash the
// event-processing loop. Bookkeeping (stats, deny-list entries made by the
// service) stands whether or not the platform accepted the mutation.

use super::guard_models::{
    ActorId, ChannelSpec, Decision, EventPayload, GuardEvent, GuardStats, GuildId, MessageRef,
    RevertAction, RoleSpec, SanctionKind, Verdict,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on any single platform mutation. A hung HTTP call must not
/// hold a revert-and-sanction sequence hostage.
const MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure taxonomy for platform mutations. None of these are fatal.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Missing permission: {0}")]
    PermissionDenied(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Rate limited by platform: {0}")]
    RateLimited(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

/// Mutations the pipeline can request from the platform. Every call may
/// fail with a permission or not-found error; callers log and continue.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn timeout(
        &self,
        guild: GuildId,
        actor: ActorId,
        duration_secs: u64,
        reason: &str,
    ) -> Result<(), ExecError>;

    async fn kick(&self, guild: GuildId, actor: ActorId, reason: &str) -> Result<(), ExecError>;

    async fn ban(&self, guild: GuildId, actor: ActorId, reason: &str) -> Result<(), ExecError>;

    async fn apply_mute_role(
        &self,
        guild: GuildId,
        actor: ActorId,
        reason: &str,
    ) -> Result<(), ExecError>;

    async fn delete_message(
        &self,
        guild: GuildId,
        message: &MessageRef,
        reason: &str,
    ) -> Result<(), ExecError>;

    async fn delete_channel(
        &self,
        guild: GuildId,
        channel: u64,
        reason: &str,
    ) -> Result<(), ExecError>;

    async fn recreate_channel(&self, guild: GuildId, spec: &ChannelSpec) -> Result<(), ExecError>;

    async fn recreate_role(&self, guild: GuildId, spec: &RoleSpec) -> Result<(), ExecError>;

    async fn rename_channel(
        &self,
        guild: GuildId,
        channel: u64,
        previous_name: &str,
    ) -> Result<(), ExecError>;

    async fn rename_guild(&self, guild: GuildId, previous_name: &str) -> Result<(), ExecError>;

    async fn restore_guild_icon(
        &self,
        guild: GuildId,
        previous_icon_url: Option<&str>,
    ) -> Result<(), ExecError>;

    async fn remove_bot(&self, guild: GuildId, bot: ActorId, reason: &str)
        -> Result<(), ExecError>;

    /// Disables the default role's send permission on every text channel.
    /// Voice channels and other overwrites are untouched.
    async fn lock_server(&self, guild: GuildId, reason: &str) -> Result<(), ExecError>;
}

/// Best-effort notification to the admin-configured log channel. Absence of
/// configuration is not an error.
#[async_trait]
pub trait GuardLogger: Send + Sync {
    async fn log_event(&self, guild: GuildId, text: &str);
}

async fn with_deadline<F>(fut: F) -> Result<(), ExecError>
where
    F: Future<Output = Result<(), ExecError>>,
{
    match tokio::time::timeout(MUTATION_TIMEOUT, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ExecError::Platform(format!(
            "mutation timed out after {}s",
            MUTATION_TIMEOUT.as_secs()
        ))),
    }
}

/// Applies a verdict's decisions. Mutation failures are logged and
/// discarded; stats count the decision, not the mutation outcome.
pub async fn apply_verdict(
    executor: &dyn ActionExecutor,
    logger: &dyn GuardLogger,
    stats: &GuardStats,
    event: &GuardEvent,
    verdict: &Verdict,
) {
    if !verdict.triggered() {
        return;
    }

    // Message-family rules also remove the triggering message.
    if verdict.rule.is_some_and(|r| r.is_message_rule()) {
        if let EventPayload::Message { message, .. } = &event.payload {
            if let Err(e) =
                with_deadline(executor.delete_message(event.guild, message, &verdict.reason)).await
            {
                tracing::warn!(guild = event.guild, "Failed to delete message: {}", e);
            }
        }
    }

    for decision in &verdict.decisions {
        match decision {
            Decision::Sanction { kind, reason } => {
                apply_sanction(executor, stats, event.guild, event.actor, kind, reason).await;
            }
            Decision::RevertAndSanction {
                revert,
                sanction,
                reason,
            } => {
                // Revert failure does not cancel the sanction.
                let reverted =
                    with_deadline(apply_revert(executor, event.guild, revert, reason)).await;
                if let Err(e) = reverted {
                    tracing::warn!(guild = event.guild, "Revert failed: {}", e);
                }
                if matches!(revert, RevertAction::RecreateChannel { .. }) {
                    stats.count_channel_restore();
                }
                apply_sanction(executor, stats, event.guild, event.actor, sanction, reason).await;
            }
            Decision::LockServer { reason } => {
                if let Err(e) = with_deadline(executor.lock_server(event.guild, reason)).await {
                    tracing::warn!(guild = event.guild, "Failed to lock server: {}", e);
                }
                stats.count_lock();
            }
        }
    }

    logger
        .log_event(event.guild, &summarize(event, verdict))
        .await;
}

async fn apply_sanction(
    executor: &dyn ActionExecutor,
    stats: &GuardStats,
    guild: GuildId,
    actor: ActorId,
    kind: &SanctionKind,
    reason: &str,
) {
    let outcome = with_deadline(async {
        match kind {
            SanctionKind::Timeout { duration_secs } => {
                executor.timeout(guild, actor, *duration_secs, reason).await
            }
            SanctionKind::Kick => executor.kick(guild, actor, reason).await,
            SanctionKind::Ban => executor.ban(guild, actor, reason).await,
            SanctionKind::MuteRole => executor.apply_mute_role(guild, actor, reason).await,
        }
    })
    .await;
    if let Err(e) = outcome {
        tracing::warn!(guild, actor, "Failed to apply {}: {}", kind, e);
    }
    stats.count_sanction(kind);
}

async fn apply_revert(
    executor: &dyn ActionExecutor,
    guild: GuildId,
    revert: &RevertAction,
    reason: &str,
) -> Result<(), ExecError> {
    match revert {
        RevertAction::DeleteChannel { channel } => {
            executor.delete_channel(guild, *channel, reason).await
        }
        RevertAction::RecreateChannel { spec } => executor.recreate_channel(guild, spec).await,
        RevertAction::RecreateRole { spec } => executor.recreate_role(guild, spec).await,
        RevertAction::RenameChannel {
            channel,
            previous_name,
        } => executor.rename_channel(guild, *channel, previous_name).await,
        RevertAction::RenameGuild { previous_name } => {
            executor.rename_guild(guild, previous_name).await
        }
        RevertAction::RestoreGuildIcon { previous_icon_url } => {
            executor
                .restore_guild_icon(guild, previous_icon_url.as_deref())
                .await
        }
        RevertAction::RemoveBot { bot } => executor.remove_bot(guild, *bot, reason).await,
    }
}

fn summarize(event: &GuardEvent, verdict: &Verdict) -> String {
    let actions: Vec<String> = verdict
        .decisions
        .iter()
        .map(|d| match d {
            Decision::Sanction { kind, .. } => kind.to_string(),
            Decision::RevertAndSanction { sanction, .. } => format!("revert + {}", sanction),
            Decision::LockServer { .. } => "server lock".to_string(),
        })
        .collect();
    format!(
        "🚨 <@{}> — {} | {}",
        event.actor,
        actions.join(", "),
        verdict.reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guard::guard_models::{EventKind, RuleKind};
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records calls; optionally fails every mutation, or never returns.
    struct RecordingExecutor {
        calls: Mutex<Vec<String>>,
        fail: bool,
        hang: bool,
    }

    impl RecordingExecutor {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
                hang: false,
            }
        }

        fn hanging() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
                hang: true,
            }
        }

        async fn push(&self, call: impl Into<String>) -> Result<(), ExecError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.calls.lock().unwrap().push(call.into());
            if self.fail {
                Err(ExecError::PermissionDenied("denied".to_string()))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn timeout(
            &self,
            _guild: GuildId,
            actor: ActorId,
            duration_secs: u64,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("timeout {} {}", actor, duration_secs)).await
        }

        async fn kick(
            &self,
            _guild: GuildId,
            actor: ActorId,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("kick {}", actor)).await
        }

        async fn ban(
            &self,
            _guild: GuildId,
            actor: ActorId,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("ban {}", actor)).await
        }

        async fn apply_mute_role(
            &self,
            _guild: GuildId,
            actor: ActorId,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("mute {}", actor)).await
        }

        async fn delete_message(
            &self,
            _guild: GuildId,
            message: &MessageRef,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("delete_message {}", message.message_id)).await
        }

        async fn delete_channel(
            &self,
            _guild: GuildId,
            channel: u64,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("delete_channel {}", channel)).await
        }

        async fn recreate_channel(
            &self,
            _guild: GuildId,
            spec: &ChannelSpec,
        ) -> Result<(), ExecError> {
            self.push(format!("recreate_channel {}", spec.name)).await
        }

        async fn recreate_role(&self, _guild: GuildId, spec: &RoleSpec) -> Result<(), ExecError> {
            self.push(format!("recreate_role {}", spec.name)).await
        }

        async fn rename_channel(
            &self,
            _guild: GuildId,
            channel: u64,
            previous_name: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("rename_channel {} {}", channel, previous_name)).await
        }

        async fn rename_guild(
            &self,
            _guild: GuildId,
            previous_name: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("rename_guild {}", previous_name)).await
        }

        async fn restore_guild_icon(
            &self,
            _guild: GuildId,
            _previous_icon_url: Option<&str>,
        ) -> Result<(), ExecError> {
            self.push("restore_guild_icon").await
        }

        async fn remove_bot(
            &self,
            _guild: GuildId,
            bot: ActorId,
            _reason: &str,
        ) -> Result<(), ExecError> {
            self.push(format!("remove_bot {}", bot)).await
        }

        async fn lock_server(&self, _guild: GuildId, _reason: &str) -> Result<(), ExecError> {
            self.push("lock_server").await
        }
    }

    struct RecordingLogger {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GuardLogger for RecordingLogger {
        async fn log_event(&self, _guild: GuildId, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
    }

    fn logger() -> RecordingLogger {
        RecordingLogger {
            lines: Mutex::new(Vec::new()),
        }
    }

    fn flood_event() -> GuardEvent {
        GuardEvent {
            actor: 42,
            guild: 900,
            kind: EventKind::Message,
            timestamp: Utc::now(),
            payload: EventPayload::Message {
                message: MessageRef {
                    channel_id: 5,
                    message_id: 6,
                },
                everyone_mentions: 0,
            },
        }
    }

    fn flood_verdict() -> Verdict {
        Verdict::flagged(
            RuleKind::MessageFlood,
            vec![Decision::Sanction {
                kind: SanctionKind::Timeout { duration_secs: 60 },
                reason: "8 messages within 6s".to_string(),
            }],
            "8 messages within 6s",
        )
    }

    #[tokio::test]
    async fn message_rule_deletes_the_offending_message() {
        let executor = RecordingExecutor::new(false);
        let logger = logger();
        let stats = GuardStats::default();

        apply_verdict(&executor, &logger, &stats, &flood_event(), &flood_verdict()).await;

        assert_eq!(executor.calls(), vec!["delete_message 6", "timeout 42 60"]);
        assert_eq!(stats.snapshot().timeouts, 1);
        assert_eq!(logger.lines.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mutation_failures_are_swallowed_and_still_counted() {
        let executor = RecordingExecutor::new(true);
        let logger = logger();
        let stats = GuardStats::default();

        apply_verdict(&executor, &logger, &stats, &flood_event(), &flood_verdict()).await;

        // Both calls were attempted, neither error propagated, and the
        // decision still counts for bookkeeping.
        assert_eq!(executor.calls().len(), 2);
        assert_eq!(stats.snapshot().timeouts, 1);
        assert_eq!(logger.lines.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_mutation_is_cut_off_and_still_counted() {
        let executor = RecordingExecutor::hanging();
        let logger = logger();
        let stats = GuardStats::default();

        // Every call never returns; the deadline cuts each one off instead
        // of stalling the pipeline, and bookkeeping still stands.
        apply_verdict(&executor, &logger, &stats, &flood_event(), &flood_verdict()).await;

        assert!(executor.calls().is_empty());
        assert_eq!(stats.snapshot().timeouts, 1);
        assert_eq!(logger.lines.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revert_failure_does_not_cancel_the_sanction() {
        let executor = RecordingExecutor::new(true);
        let logger = logger();
        let stats = GuardStats::default();

        let event = GuardEvent {
            actor: 42,
            guild: 900,
            kind: EventKind::ChannelDelete,
            timestamp: Utc::now(),
            payload: EventPayload::ChannelDeleted {
                spec: ChannelSpec {
                    name: "general".to_string(),
                    voice: false,
                    category: None,
                },
            },
        };
        let verdict = Verdict::flagged(
            RuleKind::StructuralChange,
            vec![Decision::RevertAndSanction {
                revert: RevertAction::RecreateChannel {
                    spec: ChannelSpec {
                        name: "general".to_string(),
                        voice: false,
                        category: None,
                    },
                },
                sanction: SanctionKind::Timeout { duration_secs: 120 },
                reason: "deleted channel".to_string(),
            }],
            "deleted channel",
        );

        apply_verdict(&executor, &logger, &stats, &event, &verdict).await;

        assert_eq!(
            executor.calls(),
            vec!["recreate_channel general", "timeout 42 120"]
        );
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.channel_restores, 1);
        assert_eq!(snapshot.timeouts, 1);
    }

    #[tokio::test]
    async fn lock_and_ban_are_applied_in_order() {
        let executor = RecordingExecutor::new(false);
        let logger = logger();
        let stats = GuardStats::default();

        let event = GuardEvent {
            actor: 42,
            guild: 900,
            kind: EventKind::ChannelCreate,
            timestamp: Utc::now(),
            payload: EventPayload::ChannelCreated {
                channel: 777,
                name: "spam".to_string(),
            },
        };
        let verdict = Verdict::flagged(
            RuleKind::ChannelCreateFlood,
            vec![
                Decision::LockServer {
                    reason: "3 channels within 3s".to_string(),
                },
                Decision::Sanction {
                    kind: SanctionKind::Ban,
                    reason: "3 channels within 3s".to_string(),
                },
            ],
            "3 channels within 3s",
        );

        apply_verdict(&executor, &logger, &stats, &event, &verdict).await;

        assert_eq!(executor.calls(), vec!["lock_server", "ban 42"]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.locks, 1);
        assert_eq!(snapshot.bans, 1);
    }

    #[tokio::test]
    async fn clean_verdict_touches_nothing() {
        let executor = RecordingExecutor::new(false);
        let logger = logger();
        let stats = GuardStats::default();

        apply_verdict(&executor, &logger, &stats, &flood_event(), &Verdict::clean()).await;

        assert!(executor.calls().is_empty());
        assert!(logger.lines.lock().unwrap().is_empty());
    }
}
