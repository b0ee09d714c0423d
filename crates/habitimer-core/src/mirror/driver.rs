//! Async loop that ticks a [`CountdownMirror`] and periodically reconciles it
//! against an authoritative [`StatusSource`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use super::cache::FallbackCache;
use super::countdown::{CountdownMirror, MirrorEvent};
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::habit::HabitId;
use crate::storage::MirrorConfig;
use crate::timer::{TimerEngine, TimerStatus};

/// Where the mirror reads authoritative state from.
///
/// Implementations only read; the mirror never stops or starts a timer.
pub trait StatusSource: Send {
    fn fetch_status(&mut self) -> impl Future<Output = Result<Option<TimerStatus>>> + Send;

    /// Remaining seconds today per habit, used to refresh the fallback cache.
    fn fetch_remaining(&mut self) -> impl Future<Output = Result<Vec<(HabitId, i64)>>> + Send {
        async { Ok(Vec::new()) }
    }
}

impl<C: Clock + 'static> StatusSource for Arc<TimerEngine<C>> {
    fn fetch_status(&mut self) -> impl Future<Output = Result<Option<TimerStatus>>> + Send {
        let engine = Arc::clone(self);
        async move {
            tokio::task::spawn_blocking(move || engine.status())
                .await
                .map_err(|e| CoreError::Custom(format!("status task failed: {e}")))?
        }
    }

    fn fetch_remaining(&mut self) -> impl Future<Output = Result<Vec<(HabitId, i64)>>> + Send {
        let engine = Arc::clone(self);
        async move {
            let views = tokio::task::spawn_blocking(move || engine.overview())
                .await
                .map_err(|e| CoreError::Custom(format!("overview task failed: {e}")))??;
            Ok(views
                .into_iter()
                .map(|v| (v.habit.id, v.state.remaining_seconds()))
                .collect())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorSettings {
    pub tick_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl From<&MirrorConfig> for MirrorSettings {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            poll_interval: config.poll_interval(),
        }
    }
}

pub struct MirrorDriver<S, C> {
    source: S,
    clock: C,
    settings: MirrorSettings,
    mirror: CountdownMirror,
    cache: FallbackCache,
    cache_path: Option<PathBuf>,
}

impl<S: StatusSource, C: Clock> MirrorDriver<S, C> {
    pub fn new(source: S, clock: C, settings: MirrorSettings) -> Self {
        Self {
            source,
            clock,
            settings,
            mirror: CountdownMirror::new(),
            cache: FallbackCache::default(),
            cache_path: None,
        }
    }

    /// Persist the fallback cache at `path`, seeding it from whatever is already there.
    pub fn with_cache(mut self, path: PathBuf) -> Self {
        self.cache = FallbackCache::load(&path);
        self.cache_path = Some(path);
        self
    }

    pub fn mirror(&self) -> &CountdownMirror {
        &self.mirror
    }

    pub fn cache(&self) -> &FallbackCache {
        &self.cache
    }

    pub fn tick(&mut self) -> MirrorEvent {
        self.mirror.tick(self.clock.now())
    }

    /// Read authoritative state and overwrite the local anchor with it.
    ///
    /// A transient failure falls back to the cache and leaves the server
    /// untouched. Any other error is returned.
    pub async fn reconcile(&mut self) -> Result<MirrorEvent> {
        match self.source.fetch_status().await {
            Ok(status) => {
                let now = self.clock.now();
                let event = self.mirror.reconcile(status.as_ref(), now);
                if let MirrorEvent::Resynced { drift_seconds, .. } = &event {
                    if drift_seconds.abs() > 1 {
                        tracing::debug!(drift_seconds, "mirror drift corrected");
                    }
                }
                self.cache.record_status(status.as_ref(), now);
                self.refresh_cache().await;
                Ok(event)
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("status source unavailable, using cached progress: {e}");
                let now = self.clock.now();
                self.mirror.clear();
                Ok(MirrorEvent::Offline {
                    last_known: self.cache.last_known(now, self.clock.date_of(now)),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_cache(&mut self) {
        match self.source.fetch_remaining().await {
            Ok(remaining) => {
                let now = self.clock.now();
                let today = self.clock.date_of(now);
                for (habit_id, secs) in remaining {
                    self.cache.record_remaining(habit_id, today, secs, now);
                }
            }
            Err(e) => tracing::debug!("skipping cache refresh: {e}"),
        }
        if let Some(path) = &self.cache_path {
            if let Err(e) = self.cache.save(path, self.clock.now()) {
                tracing::warn!(path = %path.display(), "failed to save mirror cache: {e}");
            }
        }
    }

    /// Tick and reconcile until `shutdown` resolves. Missed ticks are skipped,
    /// not replayed; the next tick recomputes from the end timestamp anyway.
    pub async fn run<F, E>(&mut self, shutdown: F, mut on_event: E) -> Result<()>
    where
        F: Future<Output = ()>,
        E: FnMut(&MirrorEvent),
    {
        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poller = interval(self.settings.poll_interval);
        poller.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = poller.tick() => {
                    let event = self.reconcile().await?;
                    on_event(&event);
                }
                _ = ticker.tick() => {
                    let event = self.tick();
                    on_event(&event);
                }
            }
        }
        tracing::debug!("mirror loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::habit::NewHabit;
    use crate::storage::Database;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;

    struct Scripted {
        replies: VecDeque<Result<Option<TimerStatus>>>,
    }

    impl StatusSource for Scripted {
        fn fetch_status(&mut self) -> impl Future<Output = Result<Option<TimerStatus>>> + Send {
            let reply = self.replies.pop_front().unwrap_or(Ok(None));
            async move { reply }
        }
    }

    fn engine_fixture() -> (Arc<TimerEngine<Arc<ManualClock>>>, Arc<ManualClock>, HabitId) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 1, 20, 0, 0).unwrap(),
        ));
        let db = Database::open_memory().unwrap();
        let habit = db
            .create_habit(&NewHabit::new("Stretch", 10), 30, clock.now())
            .unwrap();
        let engine = Arc::new(TimerEngine::with_clock(db, Arc::clone(&clock)));
        (engine, clock, habit.id)
    }

    #[tokio::test]
    async fn reconcile_follows_local_engine() {
        let (engine, clock, id) = engine_fixture();
        engine.start(id).unwrap();
        clock.advance_secs(25);

        let mut driver = MirrorDriver::new(Arc::clone(&engine), Arc::clone(&clock), MirrorSettings::default());
        let event = driver.reconcile().await.unwrap();
        assert!(matches!(
            event,
            MirrorEvent::Resynced { remaining_seconds: Some(575), .. }
        ));

        clock.advance_secs(5);
        assert!(matches!(
            driver.tick(),
            MirrorEvent::Tick { remaining_seconds: 570, .. }
        ));
        assert_eq!(driver.cache().remaining_for(id, clock.now(), clock.today()), Some(570));
    }

    #[tokio::test]
    async fn completion_does_not_stop_the_engine() {
        let (engine, clock, id) = engine_fixture();
        engine.start(id).unwrap();
        let mut driver = MirrorDriver::new(Arc::clone(&engine), Arc::clone(&clock), MirrorSettings::default());
        driver.reconcile().await.unwrap();

        clock.advance_secs(601);
        assert_eq!(driver.tick(), MirrorEvent::Completed { habit_id: id });
        assert!(engine.status().unwrap().is_some());
    }

    #[tokio::test]
    async fn transient_failure_falls_back_to_cache() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 1, 20, 0, 0).unwrap(),
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror-cache.json");
        let mut seeded = FallbackCache::default();
        seeded.record_remaining(4, clock.today(), 120, clock.now());
        seeded.save(&path, clock.now()).unwrap();

        let source = Scripted {
            replies: VecDeque::from([Err(CoreError::StoreUnavailable("offline".into()))]),
        };
        let mut driver = MirrorDriver::new(source, Arc::clone(&clock), MirrorSettings::default())
            .with_cache(path);
        let event = driver.reconcile().await.unwrap();
        assert_eq!(event, MirrorEvent::Offline { last_known: vec![(4, 120)] });
        assert_eq!(driver.tick(), MirrorEvent::Idle);
    }

    #[tokio::test]
    async fn non_transient_failure_is_returned() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let source = Scripted {
            replies: VecDeque::from([Err(CoreError::Custom("bad payload".into()))]),
        };
        let mut driver = MirrorDriver::new(source, clock, MirrorSettings::default());
        assert!(driver.reconcile().await.is_err());
    }

    #[tokio::test]
    async fn run_reconciles_first_then_stops_on_shutdown() {
        let (engine, clock, id) = engine_fixture();
        engine.start(id).unwrap();
        let settings = MirrorSettings {
            tick_interval: Duration::from_millis(10),
            poll_interval: Duration::from_millis(50),
        };
        let mut driver = MirrorDriver::new(Arc::clone(&engine), clock, settings);
        let mut events = Vec::new();
        driver
            .run(tokio::time::sleep(Duration::from_millis(80)), |e| {
                events.push(e.clone())
            })
            .await
            .unwrap();

        assert!(matches!(events.first(), Some(MirrorEvent::Resynced { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, MirrorEvent::Tick { remaining_seconds: 600, .. })));
    }
}
