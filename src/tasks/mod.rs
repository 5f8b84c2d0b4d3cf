//! Background Tasks Module
//!
//! # Tasks
//! - Sweep: drops stale cache entries at a configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
