pub mod config;
pub mod habit;
pub mod serve;
pub mod sessions;
pub mod timer;
pub mod watch;

use habitimer_core::{Clock, Config, TimerEngine};

pub type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Open the engine on the default database, seeding starter habits into an
/// empty catalog when the config asks for it.
pub fn open_engine(config: &Config) -> CmdResult<TimerEngine> {
    let engine = TimerEngine::open()?;
    if config.habits.seed_defaults {
        let now = engine.clock().now();
        engine.database()?.seed_defaults(now)?;
    }
    Ok(engine)
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
