//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the engine.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries and re-enforces limits
//! - Offline replay: delivers queued writes once connectivity returns

mod replay;
mod sweep;

pub use replay::spawn_replay_task;
pub use sweep::spawn_sweep_task;
