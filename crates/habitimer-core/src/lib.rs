//! # Habitimer Core Library
//!
//! Core logic for Habitimer, a focus timer for daily habits. Each habit has a
//! daily time target; running a timer on it counts that target down, and
//! only one habit can be running at a time across every device that shares
//! the same database.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a stateless, wall-clock-based state machine. Every
//!   transition is a single SQLite transaction over the active timer
//!   register, daily progress and the session log.
//! - **Storage**: SQLite persistence and TOML configuration
//! - **Mirror**: a client-side countdown anchored to an absolute end
//!   timestamp and reconciled against the engine
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: start / stop / reset / status
//! - [`Database`]: habit catalog, progress and session persistence
//! - [`Config`]: application configuration management
//! - [`MirrorDriver`]: tick loop for displays

pub mod clock;
pub mod error;
pub mod habit;
pub mod mirror;
pub mod storage;
pub mod timer;

pub use clock::{elapsed_seconds, Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use habit::{default_habits, Habit, HabitCatalog, HabitId, NewHabit};
pub use mirror::{CountdownMirror, FallbackCache, MirrorDriver, MirrorEvent, MirrorSettings, StatusSource};
pub use storage::{ActiveTimerSlot, Config, DailyProgress, Database, TimerSession};
pub use timer::{HabitState, HabitView, StopOutcome, TimerEngine, TimerPhase, TimerStatus};
