//! Integration test binary: every integration test is a module of one
//! binary to keep link time down.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod helpers;

mod calendar_announcements;
mod change_detection;
mod resource_lock;
