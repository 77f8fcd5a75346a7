//! Bounded worker pool with per-task failure isolation.
//!
//! One pool is built per batch round (fetch, gap-fill). Every task runs to
//! completion, failure or panic before [`TaskPool::run`] returns, and results
//! come back in submission order regardless of completion order.

use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to build {name} pool with {workers} workers: {reason}")]
    Build {
        name: String,
        workers: usize,
        reason: String,
    },
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T, E> {
    Done(T),
    Failed(E),
    /// The task panicked; the payload message if it had one.
    Panicked(String),
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            TaskOutcome::Done(v) => Some(v),
            _ => None,
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct TaskPool {
    name: String,
    workers: usize,
    pool: rayon::ThreadPool,
}

impl TaskPool {
    /// Build a pool of `workers` threads (at least one).
    pub fn new(name: impl Into<String>, workers: usize) -> Result<Self, PoolError> {
        let name = name.into();
        let workers = workers.max(1);
        let thread_prefix = name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{thread_prefix}-{i}"))
            .build()
            .map_err(|e| PoolError::Build {
                name: name.clone(),
                workers,
                reason: e.to_string(),
            })?;
        Ok(Self {
            name,
            workers,
            pool,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task` over every descriptor and wait for all of them.
    ///
    /// Each result is paired with its descriptor, in submission order.
    pub fn run<I, T, E, F>(&self, descriptors: Vec<I>, task: F) -> Vec<(I, TaskOutcome<T, E>)>
    where
        I: Sync,
        T: Send,
        E: Send,
        F: Fn(&I) -> Result<T, E> + Sync,
    {
        let started = Instant::now();
        let outcomes: Vec<TaskOutcome<T, E>> = self.pool.install(|| {
            descriptors
                .par_iter()
                .map(|descriptor| match catch_unwind(AssertUnwindSafe(|| task(descriptor))) {
                    Ok(Ok(value)) => TaskOutcome::Done(value),
                    Ok(Err(err)) => TaskOutcome::Failed(err),
                    Err(payload) => TaskOutcome::Panicked(panic_message(payload)),
                })
                .collect()
        });

        let done = outcomes.iter().filter(|o| o.is_done()).count();
        info!(
            pool = %self.name,
            workers = self.workers,
            tasks = outcomes.len(),
            done,
            failed = outcomes.len() - done,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "round complete"
        );

        descriptors.into_iter().zip(outcomes).collect()
    }
}
