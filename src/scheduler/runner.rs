//! Periodic routine runner.
//!
//! Each registered routine gets its own tokio task: an alignment sleep, then
//! an interval loop. An iteration that errors or panics is logged and the
//! loop carries on with the next tick. Shutdown stops new iterations and
//! waits for in-flight ones to finish.

use crate::error::{HeraldError, Result};
use crate::lock::ResourceLock;
use crate::scheduler::tasks::{ScheduledTask, TaskState};
use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Boxed routine body, invoked once per tick.
pub type Routine = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

type TaskTable = Arc<Mutex<HashMap<String, ScheduledTask>>>;

/// Runs named routines on fixed intervals.
pub struct Scheduler {
    pending: Vec<(ScheduledTask, Routine)>,
    table: TaskTable,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    lock: ResourceLock,
}

impl Scheduler {
    /// Scheduler stopped by `cancel` (or by [`Scheduler::shutdown`]).
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            pending: Vec::new(),
            table: Arc::new(Mutex::new(HashMap::new())),
            cancel,
            handles: Vec::new(),
            lock: ResourceLock::new(),
        }
    }

    /// Lock handed to routines that must not overlap with themselves.
    pub fn resource_lock(&self) -> ResourceLock {
        self.lock.clone()
    }

    /// Token cancelled on shutdown.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a routine. Names must be unique.
    pub fn register<F, Fut>(&mut self, task: ScheduledTask, routine: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if task.interval.is_zero() {
            return Err(HeraldError::Scheduler(format!(
                "task '{}' has a zero interval",
                task.name
            )));
        }
        let mut table = lock_table(&self.table);
        if table.contains_key(&task.name) {
            return Err(HeraldError::Scheduler(format!(
                "task '{}' is already registered",
                task.name
            )));
        }
        table.insert(task.name.clone(), task.clone());
        drop(table);

        let routine: Routine = Arc::new(move || routine().boxed());
        self.pending.push((task, routine));
        Ok(())
    }

    /// Spawn every registered routine that is not yet running.
    pub fn start(&mut self) {
        for (task, routine) in self.pending.drain(..) {
            info!(
                task = %task.name,
                every_secs = task.interval.as_secs(),
                first = %task.alignment,
                "scheduling task"
            );
            let handle = tokio::spawn(run_task(
                task,
                routine,
                Arc::clone(&self.table),
                self.cancel.clone(),
            ));
            self.handles.push(handle);
        }
    }

    /// Current state of every registered task, sorted by name.
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        let mut tasks: Vec<_> = lock_table(&self.table).values().cloned().collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    /// State of one task.
    pub fn task(&self, name: &str) -> Option<ScheduledTask> {
        lock_table(&self.table).get(name).cloned()
    }

    /// Stop scheduling and wait for in-flight iterations to complete.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler task did not stop cleanly");
            }
        }
        for task in lock_table(&self.table).values_mut() {
            task.state = TaskState::Cancelled;
        }
        info!("scheduler stopped");
    }
}

fn lock_table(table: &TaskTable) -> std::sync::MutexGuard<'_, HashMap<String, ScheduledTask>> {
    table.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn set_state(table: &TaskTable, name: &str, state: TaskState) {
    if let Some(task) = lock_table(table).get_mut(name) {
        task.state = state;
        if state == TaskState::Idle {
            task.last_run = Some(Utc::now());
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

async fn run_task(
    task: ScheduledTask,
    routine: Routine,
    table: TaskTable,
    cancel: CancellationToken,
) {
    let name = task.name.as_str();
    let first = task.alignment.first_delay(Utc::now());

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            set_state(&table, name, TaskState::Cancelled);
            return;
        }
        () = tokio::time::sleep(first) => {}
    }

    let mut ticker = tokio::time::interval(task.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        set_state(&table, name, TaskState::Running);
        debug!(task = name, "task iteration starting");
        match AssertUnwindSafe(routine()).catch_unwind().await {
            Ok(Ok(())) => debug!(task = name, "task iteration finished"),
            Ok(Err(e)) => warn!(task = name, error = %e, "task iteration failed"),
            Err(payload) => error!(
                task = name,
                panic = %panic_message(payload.as_ref()),
                "task iteration panicked"
            ),
        }
        set_state(&table, name, TaskState::Idle);
    }

    set_state(&table, name, TaskState::Cancelled);
    debug!(task = name, "task loop exited");
}
