use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use habitimer_core::{
    Config, CoreError, HabitId, MirrorDriver, MirrorEvent, MirrorSettings, StatusSource,
    SystemClock, TimerStatus,
};
use serde::Deserialize;

use super::{open_engine, CmdResult};

#[derive(Args)]
pub struct WatchArgs {
    /// Reconcile against a running `habitimer serve` instead of the local database
    #[arg(long)]
    pub remote: Option<String>,
    /// Reconcile once, print one tick and exit
    #[arg(long)]
    pub once: bool,
}

/// Reads status from another instance's HTTP API.
pub struct HttpStatusSource {
    client: reqwest::Client,
    base: String,
}

#[derive(Deserialize)]
struct RemoteHabit {
    id: HabitId,
    #[serde(default)]
    remaining_seconds: Option<i64>,
    #[serde(default)]
    current_remaining: Option<i64>,
}

impl HttpStatusSource {
    pub fn new(base: &str) -> CmdResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        client: reqwest::Client,
        url: String,
    ) -> habitimer_core::Result<T> {
        let resp = client.get(&url).send().await.map_err(map_reqwest)?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(CoreError::StoreUnavailable(format!("{url}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(CoreError::Custom(format!("{url}: HTTP {status}")));
        }
        resp.json::<T>().await.map_err(map_reqwest)
    }
}

/// Network-level failures are transient; anything else is a real error.
fn map_reqwest(e: reqwest::Error) -> CoreError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        CoreError::StoreUnavailable(e.to_string())
    } else {
        CoreError::Custom(e.to_string())
    }
}

impl StatusSource for HttpStatusSource {
    fn fetch_status(&mut self) -> impl Future<Output = habitimer_core::Result<Option<TimerStatus>>> + Send {
        let client = self.client.clone();
        let url = format!("{}/api/timer", self.base);
        Self::get_json(client, url)
    }

    fn fetch_remaining(
        &mut self,
    ) -> impl Future<Output = habitimer_core::Result<Vec<(HabitId, i64)>>> + Send {
        let client = self.client.clone();
        let url = format!("{}/api/habits", self.base);
        async move {
            let habits: Vec<RemoteHabit> = Self::get_json(client, url).await?;
            Ok(habits
                .into_iter()
                .map(|h| (h.id, h.current_remaining.or(h.remaining_seconds).unwrap_or(0)))
                .collect())
        }
    }
}

fn print_event(event: &MirrorEvent) {
    match event {
        MirrorEvent::Tick {
            habit_id,
            remaining_seconds,
            ..
        } => {
            let (m, s) = (remaining_seconds / 60, remaining_seconds % 60);
            println!("habit {habit_id}: {m:02}:{s:02}");
        }
        MirrorEvent::Completed { habit_id } => println!("habit {habit_id}: done"),
        MirrorEvent::Idle => println!("idle"),
        MirrorEvent::Resynced { .. } => {}
        MirrorEvent::Offline { last_known } => {
            println!("offline; last known:");
            for (id, remaining) in last_known {
                println!("  habit {id}: {remaining}s");
            }
        }
    }
}

async fn drive<S: StatusSource>(mut driver: MirrorDriver<S, SystemClock>, once: bool) -> CmdResult {
    if once {
        let event = driver.reconcile().await?;
        print_event(&event);
        print_event(&driver.tick());
        return Ok(());
    }
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    driver.run(shutdown, print_event).await?;
    Ok(())
}

pub fn run(args: WatchArgs) -> CmdResult {
    // A display should keep running on a broken config file.
    let config = Config::load_or_default();
    let settings = MirrorSettings::from(&config.mirror);
    let cache_path = config.mirror.cache_path()?;
    let rt = tokio::runtime::Runtime::new()?;

    match args.remote {
        Some(base) => {
            tracing::info!(remote = %base, "watching remote timer");
            let driver = MirrorDriver::new(HttpStatusSource::new(&base)?, SystemClock, settings)
                .with_cache(cache_path);
            rt.block_on(drive(driver, args.once))
        }
        None => {
            let engine = Arc::new(open_engine(&config)?);
            let driver = MirrorDriver::new(engine, SystemClock, settings).with_cache(cache_path);
            rt.block_on(drive(driver, args.once))
        }
    }
}
