// Sliding-window event counters - the rate-detection primitive.
//
// Each rule family owns one `SlidingWindow` with its own trailing interval,
// so a message-flood window never shares state with a channel-creation
// window. Timestamps are monotonic `Instant`s supplied by the caller, which
// keeps the arithmetic immune to wall-clock adjustments and lets tests drive
// a synthetic time base.

use super::guard_models::{ActorId, GuardConfig, GuildId};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Per-key trailing-interval counter with O(1) amortized insert.
pub struct SlidingWindow<K: Eq + Hash> {
    window: Duration,
    entries: DashMap<K, VecDeque<Instant>>,
}

impl<K: Eq + Hash + Clone> SlidingWindow<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    /// Appends `at` to the key's window, prunes everything strictly older
    /// than `at - window`, and returns the resulting count. Timestamps on
    /// the window boundary are retained. Append + prune hold the entry
    /// guard, so concurrent records on the same key cannot lose updates.
    pub fn record(&self, key: K, at: Instant) -> usize {
        let mut entry = self.entries.entry(key).or_default();
        while entry
            .front()
            .is_some_and(|&t| at.saturating_duration_since(t) > self.window)
        {
            entry.pop_front();
        }
        entry.push_back(at);
        entry.len()
    }

    /// Resets the window after a breach, so the count has to climb from
    /// zero before the same rule can trigger again.
    pub fn clear(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drops keys whose windows are empty or contain only stale entries.
    /// Called from a periodic task to bound memory; correctness never
    /// depends on it because `record` prunes lazily.
    pub fn sweep(&self, now: Instant) {
        self.entries.retain(|_, window| {
            window
                .back()
                .is_some_and(|&t| now.saturating_duration_since(t) <= self.window)
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

/// The window set for the whole rule family, one counter per rule.
/// Actor-scoped rules key on (guild, actor); the join-flood rule is
/// guild-scoped because a raid arrives as many distinct actors.
pub struct RuleWindows {
    pub message_flood: SlidingWindow<(GuildId, ActorId)>,
    pub mention_flood: SlidingWindow<(GuildId, ActorId)>,
    pub channel_create_flood: SlidingWindow<(GuildId, ActorId)>,
    pub join_flood: SlidingWindow<GuildId>,
}

impl RuleWindows {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            message_flood: SlidingWindow::new(Duration::from_secs(
                config.message_flood.window_secs,
            )),
            mention_flood: SlidingWindow::new(Duration::from_secs(
                config.mention_flood.window_secs,
            )),
            channel_create_flood: SlidingWindow::new(Duration::from_secs(
                config.channel_create_flood.window_secs,
            )),
            join_flood: SlidingWindow::new(Duration::from_secs(config.join_flood.window_secs)),
        }
    }

    /// Evicts stale keys across every rule window.
    pub fn sweep(&self, now: Instant) {
        self.message_flood.sweep(now);
        self.mention_flood.sweep(now);
        self.channel_create_flood.sweep(now);
        self.join_flood.sweep(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Instant {
        Instant::now()
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn counts_events_within_window() {
        let window = SlidingWindow::new(Duration::from_secs(3));
        let t0 = base();

        assert_eq!(window.record("a", at(t0, 0)), 1);
        assert_eq!(window.record("a", at(t0, 1)), 2);
        assert_eq!(window.record("a", at(t0, 2)), 3);
    }

    #[test]
    fn prunes_entries_older_than_window() {
        let window = SlidingWindow::new(Duration::from_secs(3));
        let t0 = base();

        window.record("a", at(t0, 0));
        window.record("a", at(t0, 1));
        window.record("a", at(t0, 2));

        // At t=4 only t=0 falls outside [1, 4]; t=1 sits on the boundary
        // and stays, so the count is 3 again after appending.
        assert_eq!(window.record("a", at(t0, 4)), 3);
    }

    #[test]
    fn boundary_timestamp_is_retained() {
        let window = SlidingWindow::new(Duration::from_secs(5));
        let t0 = base();

        window.record("a", at(t0, 0));
        assert_eq!(window.record("a", at(t0, 5)), 2);
        // One second later the t=0 entry is strictly older than the window.
        assert_eq!(window.record("a", at(t0, 6)), 2);
    }

    #[test]
    fn keys_do_not_share_state() {
        let window = SlidingWindow::new(Duration::from_secs(10));
        let t0 = base();

        window.record("flood", at(t0, 0));
        window.record("flood", at(t0, 1));
        assert_eq!(window.record("mentions", at(t0, 1)), 1);
        assert_eq!(window.record("flood", at(t0, 2)), 3);
    }

    #[test]
    fn clear_resets_the_count() {
        let window = SlidingWindow::new(Duration::from_secs(10));
        let t0 = base();

        window.record("a", at(t0, 0));
        window.record("a", at(t0, 1));
        window.clear(&"a");
        assert_eq!(window.record("a", at(t0, 2)), 1);
    }

    #[test]
    fn sweep_evicts_stale_keys_only() {
        let window = SlidingWindow::new(Duration::from_secs(3));
        let t0 = base();

        window.record("stale", at(t0, 0));
        window.record("fresh", at(t0, 9));
        window.sweep(at(t0, 10));

        assert_eq!(window.tracked_keys(), 1);
        assert_eq!(window.record("fresh", at(t0, 10)), 2);
    }
}
