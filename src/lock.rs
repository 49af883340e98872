//! Resource lock guarding expensive, state-mutating checks.
//!
//! A single exclusive slot. [`ResourceLock::try_acquire_and_run`] never waits:
//! if another routine holds the slot the call returns
//! [`LockOutcome::Locked`] straight away. The slot is released by a guard,
//! so it is freed on success, on error, on panic unwinding and when the
//! running future is dropped by cancellation.

use crate::error::HeraldError;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// Result of a guarded run.
#[derive(Debug)]
pub enum LockOutcome<T> {
    /// The operation ran and succeeded.
    Completed(T),
    /// The operation ran and returned an error.
    Failed(HeraldError),
    /// Another routine held the lock; nothing ran.
    Locked {
        /// Name of the operation that was skipped.
        blocked: String,
        /// Name of the routine holding the lock, if known.
        holder: Option<String>,
    },
}

impl<T> LockOutcome<T> {
    /// `true` if the operation was skipped.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

/// Process-wide exclusive slot. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct ResourceLock {
    slot: Arc<Mutex<()>>,
    holder: Arc<StdMutex<Option<String>>>,
}

struct HolderGuard {
    holder: Arc<StdMutex<Option<String>>>,
}

impl Drop for HolderGuard {
    fn drop(&mut self) {
        let mut holder = self
            .holder
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *holder = None;
    }
}

impl ResourceLock {
    /// New, unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a guarded routine is running.
    pub fn is_held(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Name of the routine currently holding the lock.
    pub fn holder(&self) -> Option<String> {
        self.holder
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Run `operation` if the lock is free, holding it for the duration.
    pub async fn try_acquire_and_run<T, F, Fut>(&self, name: &str, operation: F) -> LockOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, HeraldError>>,
    {
        let Ok(_slot) = self.slot.clone().try_lock_owned() else {
            let holder = self.holder();
            tracing::debug!(blocked = name, ?holder, "resource lock held, skipping");
            return LockOutcome::Locked {
                blocked: name.to_owned(),
                holder,
            };
        };

        // Declared after `_slot` so it drops first.
        let _holder = {
            let mut holder = self
                .holder
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *holder = Some(name.to_owned());
            HolderGuard {
                holder: Arc::clone(&self.holder),
            }
        };

        match operation().await {
            Ok(value) => LockOutcome::Completed(value),
            Err(e) => {
                tracing::warn!(operation = name, error = %e, "guarded operation failed");
                LockOutcome::Failed(e)
            }
        }
    }
}
