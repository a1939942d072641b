//! Background Tasks Module
//!
//! Timer plumbing behind every repository's periodic callback.
//!
//! # Tasks
//! - Scheduler: repeating ticks on tokio or on a virtual clock
//! - Reset timer: exactly-once registration and kill switch per repository

mod reset;
mod scheduler;

pub use reset::ResetTimer;
pub use scheduler::{ManualScheduler, Scheduler, Tick, TimerHandle, TokioScheduler};
