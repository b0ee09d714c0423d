//! Offline fallback cache for the countdown mirror.
//!
//! Everything is stored against absolute timestamps, never as "seconds left
//! at last save", so time that passed while the client was closed is
//! subtracted on the next load.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::countdown::remaining_until;
use crate::error::Result;
use crate::habit::HabitId;
use crate::timer::TimerStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProgress {
    pub date: NaiveDate,
    pub remaining_seconds: i64,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedActive {
    pub habit_id: HabitId,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackCache {
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: BTreeMap<HabitId, CachedProgress>,
    #[serde(default)]
    pub active: Option<CachedActive>,
}

impl FallbackCache {
    /// Load from `path`. A missing or unreadable file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "discarding corrupt mirror cache: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write atomically via a sibling temp file.
    pub fn save(&mut self, path: &Path, now: DateTime<Utc>) -> Result<()> {
        self.saved_at = Some(now);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn record_status(&mut self, status: Option<&TimerStatus>, now: DateTime<Utc>) {
        self.active = status.map(|s| CachedActive {
            habit_id: s.habit_id(),
            ends_at: now + chrono::Duration::seconds(s.current_remaining),
        });
    }

    pub fn record_remaining(
        &mut self,
        habit_id: HabitId,
        date: NaiveDate,
        remaining_seconds: i64,
        now: DateTime<Utc>,
    ) {
        self.progress.insert(
            habit_id,
            CachedProgress {
                date,
                remaining_seconds,
                as_of: now,
            },
        );
    }

    /// Best local guess at a habit's remaining time today. `None` means the
    /// cache knows nothing for today, so the habit's full target applies.
    pub fn remaining_for(&self, habit_id: HabitId, now: DateTime<Utc>, today: NaiveDate) -> Option<i64> {
        if let Some(active) = self.active.as_ref().filter(|a| a.habit_id == habit_id) {
            return Some(remaining_until(active.ends_at.timestamp_millis(), now));
        }
        self.progress
            .get(&habit_id)
            .filter(|p| p.date == today)
            .map(|p| p.remaining_seconds)
    }

    /// Every habit the cache can answer for today.
    pub fn last_known(&self, now: DateTime<Utc>, today: NaiveDate) -> Vec<(HabitId, i64)> {
        let mut ids: Vec<HabitId> = self.progress.keys().copied().collect();
        if let Some(active) = &self.active {
            if !ids.contains(&active.habit_id) {
                ids.push(active.habit_id);
            }
        }
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.remaining_for(id, now, today).map(|r| (id, r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ActiveTimerSlot;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 9, 7, 30, 0).unwrap()
    }

    #[test]
    fn time_closed_is_subtracted_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror-cache.json");

        let slot = ActiveTimerSlot {
            habit_id: 5,
            started_at: t0(),
            remaining_seconds: 900,
            original_duration: 900,
            revision: 1,
        };
        let status = TimerStatus::derive(slot, t0() + Duration::seconds(100));
        let mut cache = FallbackCache::default();
        cache.record_status(Some(&status), t0() + Duration::seconds(100));
        cache.save(&path, t0() + Duration::seconds(100)).unwrap();

        // Reopened five minutes later.
        let loaded = FallbackCache::load(&path);
        let later = t0() + Duration::seconds(400);
        assert_eq!(loaded.remaining_for(5, later, later.date_naive()), Some(500));
    }

    #[test]
    fn stale_day_progress_is_ignored() {
        let mut cache = FallbackCache::default();
        let today = t0().date_naive();
        cache.record_remaining(2, today.pred_opt().unwrap(), 10, t0());
        cache.record_remaining(3, today, 40, t0());
        assert_eq!(cache.remaining_for(2, t0(), today), None);
        assert_eq!(cache.last_known(t0(), today), vec![(3, 40)]);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror-cache.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(FallbackCache::load(&path), FallbackCache::default());
    }
}
