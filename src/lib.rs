//! Herald: watches community upstreams and turns changes into announcements.
//!
//! Periodic routines run on a shared tokio runtime:
//! - **Mod check**: GitHub release feeds and a Steam workshop collection,
//!   reported to staff
//! - **Sync repository check**: revision diff of a file-sync repository,
//!   guarded by a [`lock::ResourceLock`]
//! - **Calendar poll**: due events become an advance notice and a start
//!   notice
//! - **Recruitment**: a weekly reminder with an attached post
//!
//! Snapshots and the calendar cursor persist under [`herald_dirs::data_dir`],
//! so a restart neither repeats nor loses announcements.

pub mod announce;
pub mod config;
pub mod detect;
pub mod error;
pub mod herald_dirs;
pub mod lock;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod tasking;

#[cfg(test)]
mod test_utils;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use tasking::{Herald, StatePaths};
