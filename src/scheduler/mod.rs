//! Background task scheduler.
//!
//! Runs herald's periodic routines: calendar polling, mod update checks,
//! sync-repository checks and the recruitment post.

pub mod runner;
pub mod tasks;

pub use runner::{Routine, Scheduler};
pub use tasks::{Alignment, ScheduledTask, TaskState};
