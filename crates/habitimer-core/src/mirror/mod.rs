//! Local countdown mirror.
//!
//! A display-side countdown that ticks without touching storage and is
//! periodically overwritten by the engine's authoritative status. It never
//! mutates engine state, even when its countdown reaches zero.

mod cache;
mod countdown;
mod driver;

pub use cache::{CachedActive, CachedProgress, FallbackCache};
pub use countdown::{remaining_until, CountdownMirror, MirrorEvent};
pub use driver::{MirrorDriver, MirrorSettings, StatusSource};
