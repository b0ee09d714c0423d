use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::elapsed_seconds;
use crate::habit::{Habit, HabitId};
use crate::storage::{ActiveTimerSlot, DailyProgress, TimerSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Running,
    /// Countdown reached zero but nobody has stopped the slot yet.
    /// Display-only; storage still holds the running slot.
    Completed,
}

/// The active slot plus values derived from it at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    #[serde(flatten)]
    pub slot: ActiveTimerSlot,
    pub current_remaining: i64,
    pub elapsed: i64,
    /// Absolute instant the countdown reaches zero; what clients anchor to.
    pub ends_at: DateTime<Utc>,
    pub phase: TimerPhase,
    pub is_running: bool,
}

impl TimerStatus {
    pub fn derive(slot: ActiveTimerSlot, now: DateTime<Utc>) -> Self {
        let elapsed = elapsed_seconds(slot.started_at, now);
        let current_remaining = (slot.remaining_seconds - elapsed).max(0);
        let phase = if current_remaining == 0 {
            TimerPhase::Completed
        } else {
            TimerPhase::Running
        };
        Self {
            ends_at: slot.ends_at(),
            slot,
            current_remaining,
            elapsed,
            phase,
            is_running: true,
        }
    }

    pub fn habit_id(&self) -> HabitId {
        self.slot.habit_id
    }
}

/// Per-habit state as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum HabitState {
    Idle {
        remaining_seconds: i64,
    },
    Running {
        remaining_at_start: i64,
        started_at: DateTime<Utc>,
        current_remaining: i64,
    },
    Completed,
}

impl HabitState {
    pub fn remaining_seconds(&self) -> i64 {
        match self {
            HabitState::Idle { remaining_seconds } => *remaining_seconds,
            HabitState::Running {
                current_remaining, ..
            } => *current_remaining,
            HabitState::Completed => 0,
        }
    }
}

/// A habit with its state for today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitView {
    #[serde(flatten)]
    pub habit: Habit,
    #[serde(flatten)]
    pub state: HabitState,
}

/// Result of `stop`: whether a slot was flushed, and what it produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOutcome {
    pub stopped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<TimerSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<DailyProgress>,
}

impl StopOutcome {
    pub fn nothing_running() -> Self {
        Self::default()
    }
}
