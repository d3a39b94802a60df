//! In-process workflow runtime: instances, tokens, timers, activities.

pub mod activities;
pub mod clock;
pub mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
