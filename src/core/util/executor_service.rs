// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::stream::PushFuture;

const DEFAULT_EXECUTOR_NAME: &str = "cepflow-executor";

/// Named worker pool used for asynchronous dispatch.
///
/// Backed by a `rayon` pool. A pool size of 0 or 1 runs every task inline on
/// the caller: a single worker waiting on work queued behind itself would
/// never make progress.
#[derive(Debug)]
pub struct ExecutorService {
    name: String,
    pool: Option<rayon::ThreadPool>,
    pool_size: usize,
    tasks_submitted: Arc<CachePadded<AtomicU64>>,
    tasks_completed: Arc<CachePadded<AtomicU64>>,
}

impl ExecutorService {
    pub fn new(name: &str, pool_size: usize) -> Self {
        if pool_size <= 1 {
            log::warn!(
                "[{}] Single-threaded executor requested (pool_size={}). Using inline processing.",
                name,
                pool_size
            );
            return Self::inline(name);
        }

        let prefix = name.to_string();
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build();

        match built {
            Ok(pool) => Self {
                name: name.to_string(),
                pool: Some(pool),
                pool_size,
                tasks_submitted: Arc::new(CachePadded::new(AtomicU64::new(0))),
                tasks_completed: Arc::new(CachePadded::new(AtomicU64::new(0))),
            },
            Err(e) => {
                log::warn!(
                    "[{}] Failed to start {} worker threads ({}). Using inline processing.",
                    name,
                    pool_size,
                    e
                );
                Self::inline(name)
            }
        }
    }

    /// Executor that runs every task on the submitting thread.
    pub fn inline(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pool: None,
            pool_size: 1,
            tasks_submitted: Arc::new(CachePadded::new(AtomicU64::new(0))),
            tasks_completed: Arc::new(CachePadded::new(AtomicU64::new(0))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn is_inline(&self) -> bool {
        self.pool.is_none()
    }

    pub fn tasks_submitted(&self) -> u64 {
        self.tasks_submitted.load(Ordering::Relaxed)
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    /// Run `task` on the pool and return a future for its result.
    ///
    /// A panic inside the task resolves the future with a dispatch error. A
    /// task submitted from one of this pool's own workers runs inline.
    pub fn submit<F>(&self, task: F) -> PushFuture
    where
        F: FnOnce() -> CepFlowResult<()> + Send + 'static,
    {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);

        // CRITICAL: a worker may be holding a processor lock while it waits
        // on this future. Queuing behind it on the same pool can starve.
        let pool = match &self.pool {
            Some(pool) if pool.current_thread_index().is_none() => pool,
            _ => {
                let result = run_guarded(&self.name, task);
                self.tasks_completed.fetch_add(1, Ordering::Relaxed);
                return PushFuture::completed(result);
            }
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let completed = Arc::clone(&self.tasks_completed);
        let name = self.name.clone();
        pool.spawn(move || {
            let result = run_guarded(&name, task);
            completed.fetch_add(1, Ordering::Relaxed);
            // Receiver gone means nobody waits for this push.
            let _ = tx.send(result);
        });
        PushFuture::pending(rx)
    }
}

impl Default for ExecutorService {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTOR_NAME, num_cpus::get())
    }
}

fn run_guarded<F>(name: &str, task: F) -> CepFlowResult<()>
where
    F: FnOnce() -> CepFlowResult<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("[{}] Dispatched task panicked: {}", name, message);
            Err(CepFlowError::dispatch(format!("task panicked: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
