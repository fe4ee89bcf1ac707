/// Streak, velocity and milestone detection over the decision stream.
///
/// The tracker never touches traversal state; it only sees timestamps,
/// whether a decision was a deletion, and how many bytes it frees.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::VelocityConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A behavioural feedback event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// The on-fire flag flipped to this value
    OnFire(bool),
    /// A cumulative counter crossed a threshold
    Milestone(Milestone),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Deleted(u64),
    StorageFreedMb(u64),
}

impl Milestone {
    pub fn title(&self) -> String {
        match self {
            Milestone::Deleted(count) => format!("{count} deleted"),
            Milestone::StorageFreedMb(mb) if *mb >= 1000 => format!("{} GB freed", mb / 1000),
            Milestone::StorageFreedMb(mb) => format!("{mb} MB freed"),
        }
    }
}

/// What happened during one tracker session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VelocitySummary {
    pub deleted_count: u64,
    pub storage_freed_bytes: u64,
    pub was_on_fire: bool,
    pub max_streak: u32,
}

#[derive(Debug, Clone)]
pub struct VelocityTracker {
    fire_gap: Duration,
    streak_required: u32,
    rate_window: Duration,
    deletion_milestones: Vec<u64>,
    storage_milestones: Vec<u64>,

    recent: VecDeque<Instant>,
    last_seen: Option<Instant>,
    streak: u32,
    max_streak: u32,
    on_fire: bool,
    deleted: u64,
    freed_bytes: u64,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(&VelocityConfig::default())
    }
}

impl VelocityTracker {
    pub fn new(config: &VelocityConfig) -> Self {
        let mut deletion_milestones = config.deletion_milestones.clone();
        deletion_milestones.sort_unstable();
        let mut storage_milestones: Vec<u64> = config
            .storage_milestones_mb
            .iter()
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
            .collect();
        storage_milestones.sort_unstable();

        Self {
            fire_gap: Duration::from_millis(config.fire_gap_ms),
            streak_required: config.streak_required,
            rate_window: Duration::from_secs(config.rate_window_secs),
            deletion_milestones,
            storage_milestones,
            recent: VecDeque::new(),
            last_seen: None,
            streak: 0,
            max_streak: 0,
            on_fire: false,
            deleted: 0,
            freed_bytes: 0,
        }
    }

    /// Record one decision and return the signals it raised, in order.
    pub fn observe(&mut self, at: Instant, was_deletion: bool, estimated_bytes: u64) -> Vec<Signal> {
        let mut signals = Vec::new();

        self.recent.push_back(at);
        while let Some(&oldest) = self.recent.front() {
            if at.saturating_duration_since(oldest) >= self.rate_window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        // The first decision only sets the reference time
        if let Some(last) = self.last_seen {
            if at.saturating_duration_since(last) < self.fire_gap {
                self.streak += 1;
                self.max_streak = self.max_streak.max(self.streak);
            } else {
                self.streak = self.streak.saturating_sub(1);
            }

            let hot = self.streak >= self.streak_required;
            if hot != self.on_fire {
                self.on_fire = hot;
                signals.push(Signal::OnFire(hot));
            }
        }
        self.last_seen = Some(at);

        if was_deletion {
            let before = self.deleted;
            self.deleted += 1;
            signals.extend(
                crossed(&self.deletion_milestones, before, self.deleted)
                    .map(|count| Signal::Milestone(Milestone::Deleted(count))),
            );

            let before = self.freed_bytes;
            self.freed_bytes = self.freed_bytes.saturating_add(estimated_bytes);
            signals.extend(
                crossed(&self.storage_milestones, before, self.freed_bytes)
                    .map(|bytes| Signal::Milestone(Milestone::StorageFreedMb(bytes / BYTES_PER_MB))),
            );
        }

        signals
    }

    /// Zero every counter; called when a new scope starts
    pub fn reset(&mut self) {
        self.recent.clear();
        self.last_seen = None;
        self.streak = 0;
        self.max_streak = 0;
        self.on_fire = false;
        self.deleted = 0;
        self.freed_bytes = 0;
    }

    /// Decisions inside the rate window ending at the last observation
    pub fn decisions_per_minute(&self) -> usize {
        self.recent.len()
    }

    pub fn is_on_fire(&self) -> bool {
        self.on_fire
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted
    }

    pub fn storage_freed_bytes(&self) -> u64 {
        self.freed_bytes
    }

    pub fn summary(&self) -> VelocitySummary {
        VelocitySummary {
            deleted_count: self.deleted,
            storage_freed_bytes: self.freed_bytes,
            was_on_fire: self.on_fire,
            max_streak: self.max_streak,
        }
    }
}

/// Thresholds `t` with `before < t <= after`
fn crossed(thresholds: &[u64], before: u64, after: u64) -> impl Iterator<Item = u64> + '_ {
    thresholds
        .iter()
        .copied()
        .filter(move |&t| before < t && t <= after)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = BYTES_PER_MB;

    fn milestones(signals: &[Signal]) -> Vec<Milestone> {
        signals
            .iter()
            .filter_map(|s| match s {
                Signal::Milestone(m) => Some(*m),
                Signal::OnFire(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_deletion_milestone_fires_once() {
        let mut tracker = VelocityTracker::default();
        let start = Instant::now();
        let mut fired = Vec::new();

        for i in 0..10 {
            let at = start + Duration::from_secs(i * 2);
            fired.extend(milestones(&tracker.observe(at, true, 0)));
        }
        assert_eq!(fired, vec![Milestone::Deleted(10)]);

        let mut later = Vec::new();
        for i in 10..30 {
            let at = start + Duration::from_secs(i * 2);
            later.extend(milestones(&tracker.observe(at, false, 0)));
        }
        assert!(later.is_empty());
        assert_eq!(tracker.deleted_count(), 10);
    }

    #[test]
    fn test_storage_milestones_detect_crossing() {
        let mut tracker = VelocityTracker::default();
        let start = Instant::now();

        let first = tracker.observe(start, true, 49 * MB);
        assert!(milestones(&first).is_empty());

        let second = tracker.observe(start + Duration::from_secs(2), true, 2 * MB);
        assert_eq!(milestones(&second), vec![Milestone::StorageFreedMb(50)]);

        // Still above 50 MB but no new crossing
        let third = tracker.observe(start + Duration::from_secs(4), true, MB);
        assert!(milestones(&third).is_empty());

        // One jump can cross several thresholds
        let fourth = tracker.observe(start + Duration::from_secs(6), true, 300 * MB);
        assert_eq!(
            milestones(&fourth),
            vec![Milestone::StorageFreedMb(100), Milestone::StorageFreedMb(250)]
        );
    }

    #[test]
    fn test_fire_toggles_on_threshold_crossings() {
        let mut tracker = VelocityTracker::default();
        let mut at = Instant::now();
        let fast = Duration::from_millis(300);
        let slow = Duration::from_secs(2);

        assert!(tracker.observe(at, false, 0).is_empty());
        at += fast;
        assert!(tracker.observe(at, false, 0).is_empty());
        at += fast;
        assert!(tracker.observe(at, false, 0).is_empty());
        at += fast;
        assert_eq!(tracker.observe(at, false, 0), vec![Signal::OnFire(true)]);
        assert!(tracker.is_on_fire());

        // Staying fast does not re-signal
        at += fast;
        assert!(tracker.observe(at, false, 0).is_empty());
        assert_eq!(tracker.streak(), 4);

        // One slow decision decays 4 -> 3, still on fire
        at += slow;
        assert!(tracker.observe(at, false, 0).is_empty());
        at += slow;
        assert_eq!(tracker.observe(at, false, 0), vec![Signal::OnFire(false)]);
        assert_eq!(tracker.streak(), 2);
        assert_eq!(tracker.summary().max_streak, 4);
    }

    #[test]
    fn test_streak_never_negative() {
        let mut tracker = VelocityTracker::default();
        let start = Instant::now();
        for i in 0..5 {
            tracker.observe(start + Duration::from_secs(i * 10), false, 0);
        }
        assert_eq!(tracker.streak(), 0);
        assert!(!tracker.is_on_fire());
    }

    #[test]
    fn test_rate_window_drops_old_entries() {
        let mut tracker = VelocityTracker::default();
        let start = Instant::now();

        for i in 0..5 {
            tracker.observe(start + Duration::from_secs(i), false, 0);
        }
        assert_eq!(tracker.decisions_per_minute(), 5);

        // Entries at 0s, 1s and 2s are a full window old by 62s
        tracker.observe(start + Duration::from_secs(62), false, 0);
        assert_eq!(tracker.decisions_per_minute(), 3);

        tracker.observe(start + Duration::from_secs(200), false, 0);
        assert_eq!(tracker.decisions_per_minute(), 1);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut tracker = VelocityTracker::default();
        let mut at = Instant::now();
        for _ in 0..12 {
            at += Duration::from_millis(100);
            tracker.observe(at, true, 5 * MB);
        }
        assert!(tracker.is_on_fire());

        tracker.reset();

        assert_eq!(tracker.summary(), VelocitySummary::default());
        assert_eq!(tracker.decisions_per_minute(), 0);

        // Milestones can fire again in the next scope
        let mut fired = Vec::new();
        for _ in 0..10 {
            at += Duration::from_secs(2);
            fired.extend(milestones(&tracker.observe(at, true, 0)));
        }
        assert_eq!(fired, vec![Milestone::Deleted(10)]);
    }

    #[test]
    fn test_milestone_titles() {
        assert_eq!(Milestone::Deleted(25).title(), "25 deleted");
        assert_eq!(Milestone::StorageFreedMb(250).title(), "250 MB freed");
        assert_eq!(Milestone::StorageFreedMb(1000).title(), "1 GB freed");
    }
}
