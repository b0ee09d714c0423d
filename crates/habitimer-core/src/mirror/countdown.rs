//! Client-side countdown reconstructed from an absolute end timestamp.
//!
//! Each tick recomputes `ceil((end - now) / 1000)` instead of decrementing a
//! counter, so a suspended process shows the right value on its first tick
//! after waking up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::HabitId;
use crate::timer::TimerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    habit_id: HabitId,
    end_ms: i64,
    original_duration: i64,
}

/// What the display should do after a tick or reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MirrorEvent {
    Tick {
        habit_id: HabitId,
        remaining_seconds: i64,
        /// 0.0 .. 1.0 of the current run, for a progress ring.
        progress: f64,
    },
    /// The countdown reached zero. Emitted once per run; the mirror does not stop the timer.
    Completed { habit_id: HabitId },
    /// Authoritative state replaced the local anchor.
    Resynced {
        habit_id: Option<HabitId>,
        remaining_seconds: Option<i64>,
        /// Local minus authoritative remaining before the resync.
        drift_seconds: i64,
    },
    Idle,
    /// The authoritative read failed; showing last known progress instead.
    Offline {
        last_known: Vec<(HabitId, i64)>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CountdownMirror {
    anchor: Option<Anchor>,
    completed_signalled: bool,
    last_reconciled_at: Option<DateTime<Utc>>,
}

/// Remaining whole seconds until `end_ms`, rounded up and never negative.
pub fn remaining_until(end_ms: i64, now: DateTime<Utc>) -> i64 {
    let diff = end_ms - now.timestamp_millis();
    if diff <= 0 {
        0
    } else {
        (diff + 999) / 1000
    }
}

impl CountdownMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor to `remaining_seconds` counted from `now`.
    pub fn anchor(
        &mut self,
        habit_id: HabitId,
        remaining_seconds: i64,
        original_duration: i64,
        now: DateTime<Utc>,
    ) {
        let end_ms = now.timestamp_millis() + remaining_seconds.max(0) * 1000;
        let same_run = self
            .anchor
            .is_some_and(|a| a.habit_id == habit_id && a.original_duration == original_duration);
        if !same_run || remaining_seconds > 0 {
            self.completed_signalled = false;
        }
        self.anchor = Some(Anchor {
            habit_id,
            end_ms,
            original_duration,
        });
    }

    pub fn clear(&mut self) {
        self.anchor = None;
        self.completed_signalled = false;
    }

    /// Overwrite local state with the authoritative status.
    pub fn reconcile(&mut self, status: Option<&TimerStatus>, now: DateTime<Utc>) -> MirrorEvent {
        let before = self.remaining_at(now);
        self.last_reconciled_at = Some(now);
        match status {
            Some(s) => {
                // Anchor on local `now` plus the server's remaining time, not on
                // the server's `ends_at`, so clock skew between the two hosts
                // cannot shift the display. Costs up to a second of lag.
                self.anchor(s.habit_id(), s.current_remaining, s.slot.original_duration, now);
                MirrorEvent::Resynced {
                    habit_id: Some(s.habit_id()),
                    remaining_seconds: Some(s.current_remaining),
                    drift_seconds: before.map_or(0, |b| b - s.current_remaining),
                }
            }
            None => {
                self.clear();
                MirrorEvent::Resynced {
                    habit_id: None,
                    remaining_seconds: None,
                    drift_seconds: before.unwrap_or(0),
                }
            }
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> MirrorEvent {
        let Some(anchor) = self.anchor else {
            return MirrorEvent::Idle;
        };
        let remaining = remaining_until(anchor.end_ms, now);
        if remaining == 0 && !self.completed_signalled {
            self.completed_signalled = true;
            return MirrorEvent::Completed {
                habit_id: anchor.habit_id,
            };
        }
        MirrorEvent::Tick {
            habit_id: anchor.habit_id,
            remaining_seconds: remaining,
            progress: progress_of(remaining, anchor.original_duration),
        }
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.anchor.map(|a| remaining_until(a.end_ms, now))
    }

    pub fn habit_id(&self) -> Option<HabitId> {
        self.anchor.map(|a| a.habit_id)
    }

    pub fn end_timestamp_ms(&self) -> Option<i64> {
        self.anchor.map(|a| a.end_ms)
    }

    pub fn last_reconciled_at(&self) -> Option<DateTime<Utc>> {
        self.last_reconciled_at
    }
}

fn progress_of(remaining: i64, original: i64) -> f64 {
    if original <= 0 {
        return 1.0;
    }
    (1.0 - remaining as f64 / original as f64).clamp(0.0, 1.0)
}
