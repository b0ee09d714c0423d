//! Habit definitions.
//!
//! Habits are owned by the catalog; the timer engine only reads `id` and
//! `target_minutes` through [`HabitCatalog`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

pub type HabitId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub icon: String,
    pub color: String,
    /// Daily goal in minutes.
    pub target_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// The daily goal in seconds, i.e. the remaining time of a fresh day.
    pub fn target_seconds(&self) -> i64 {
        i64::from(self.target_minutes) * 60
    }
}

pub const DEFAULT_ICON: &str = "⭐";
pub const DEFAULT_COLOR: &str = "#6366f1";
pub const DEFAULT_TARGET_MINUTES: u32 = 30;

/// Input for creating a habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabit {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub target_minutes: Option<i64>,
}

impl NewHabit {
    pub fn new(name: impl Into<String>, target_minutes: u32) -> Self {
        Self {
            name: name.into(),
            icon: None,
            color: None,
            target_minutes: Some(i64::from(target_minutes)),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Check the input and fill defaults. Returns `(name, icon, color, target_minutes)`.
    pub(crate) fn normalize(&self, default_target: u32) -> Result<(String, String, String, u32)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty("name".into()).into());
        }
        let target = match self.target_minutes {
            None => default_target,
            Some(m) if m < 0 => {
                return Err(ValidationError::InvalidValue {
                    field: "target_minutes".into(),
                    message: format!("must be >= 0, got {m}"),
                }
                .into())
            }
            Some(m) => u32::try_from(m).map_err(|_| ValidationError::InvalidValue {
                field: "target_minutes".into(),
                message: format!("{m} is too large"),
            })?,
        };
        let icon = self
            .icon
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_ICON)
            .to_string();
        let color = self
            .color
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_COLOR)
            .to_string();
        Ok((name.to_string(), icon, color, target))
    }
}

/// Habits inserted into an empty catalog by `seed_defaults`.
pub fn default_habits() -> Vec<NewHabit> {
    vec![
        NewHabit::new("Read Book", 30).with_icon("📖").with_color("#3b82f6"),
        NewHabit::new("Exercise", 45).with_icon("💪").with_color("#10b981"),
        NewHabit::new("Deep Work", 60).with_icon("💻").with_color("#8b5cf6"),
        NewHabit::new("Meditation", 15).with_icon("🧘").with_color("#f59e0b"),
    ]
}

/// Read-only view of the habit catalog used by the engine to compute defaults.
pub trait HabitCatalog {
    fn get_habit(&self, id: HabitId) -> Result<Option<Habit>>;

    /// All habits, ordered by id ascending.
    fn list_habits(&self) -> Result<Vec<Habit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn normalize_fills_defaults() {
        let input = NewHabit {
            name: "  Stretch ".into(),
            icon: None,
            color: Some(" ".into()),
            target_minutes: None,
        };
        let (name, icon, color, target) = input.normalize(20).unwrap();
        assert_eq!(name, "Stretch");
        assert_eq!(icon, DEFAULT_ICON);
        assert_eq!(color, DEFAULT_COLOR);
        assert_eq!(target, 20);
    }

    #[test]
    fn normalize_rejects_blank_name() {
        let err = NewHabit::new("   ", 10).normalize(30).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Empty(_))));
    }

    #[test]
    fn normalize_rejects_negative_target() {
        let mut input = NewHabit::new("Run", 10);
        input.target_minutes = Some(-5);
        assert!(input.normalize(30).is_err());
    }

    #[test]
    fn zero_target_is_allowed() {
        let (_, _, _, target) = NewHabit::new("Idle", 0).normalize(30).unwrap();
        assert_eq!(target, 0);
    }
}
