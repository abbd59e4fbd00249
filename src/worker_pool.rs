// SPDX-License-Identifier: Apache-2.0

//! Fork-join execution of one pipeline stage.
//!
//! A stage is split into static ranges with `partition`; each non-empty
//! range runs on its own thread against the shared store and the stage
//! returns only after every thread has been joined. Workers share no memory
//! besides the store, and a failing worker does not interrupt its siblings.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use crate::cleanup_error::{CleanupError, CleanupResult, WorkerFailure};
use crate::partition::{partition, WorkRange};
use crate::storage::CellStore;

/// Cores left free for the storage backend and the rest of the system.
const RESERVED_CORES: usize = 2;

pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(RESERVED_CORES).max(1)
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    worker_count: usize,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", s)
    } else {
        "worker panicked".to_string()
    }
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Runs `task` over `total` items split into one range per worker.
    ///
    /// Returns the sum of the per-worker results, or `StageFailed` listing
    /// every worker that returned an error or panicked.
    pub fn run_stage<F>(
        &self,
        stage: &str,
        total: usize,
        store: &Arc<dyn CellStore>,
        task: F,
    ) -> CleanupResult<usize>
    where
        F: Fn(&dyn CellStore, WorkRange) -> CleanupResult<usize> + Send + Sync + 'static,
    {
        let ranges = partition(total, self.worker_count);
        log::info!(
            "{}: {} item(s) across {} worker(s)",
            stage,
            total,
            self.worker_count
        );

        let task = Arc::new(task);
        let mut handles = Vec::with_capacity(ranges.len());
        for range in ranges.into_iter().filter(|r| !r.is_empty()) {
            let store = Arc::clone(store);
            let task = Arc::clone(&task);
            let stage_name = stage.to_string();
            handles.push((
                range,
                thread::spawn(move || {
                    log::debug!("{}: worker [{}, +{})", stage_name, range.start, range.size);
                    (*task)(store.as_ref(), range)
                }),
            ));
        }

        let mut processed = 0usize;
        let mut failures = Vec::new();
        for (range, handle) in handles {
            let message = match handle.join() {
                Ok(Ok(n)) => {
                    processed += n;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload),
            };
            log::warn!(
                "{}: worker [{}, +{}) failed: {}",
                stage,
                range.start,
                range.size,
                message
            );
            failures.push(WorkerFailure { range, message });
        }

        if failures.is_empty() {
            Ok(processed)
        } else {
            Err(CleanupError::StageFailed {
                stage: stage.to_string(),
                failures,
            })
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_worker_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty_store() -> Arc<dyn CellStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_default_worker_count_is_positive() {
        assert!(default_worker_count() >= 1);
        assert_eq!(WorkerPool::new(0).worker_count(), 1);
    }

    #[test]
    fn test_every_item_visited_once() {
        let _ = env_logger::try_init();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_task = Arc::clone(&seen);
        let pool = WorkerPool::new(4);
        let total = pool
            .run_stage("count", 103, &empty_store(), move |_, range| {
                seen_in_task.fetch_add(range.size, Ordering::SeqCst);
                Ok(range.size)
            })
            .unwrap();
        assert_eq!(total, 103);
        assert_eq!(seen.load(Ordering::SeqCst), 103);
    }

    #[test]
    fn test_empty_ranges_spawn_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_task = Arc::clone(&calls);
        WorkerPool::new(8)
            .run_stage("sparse", 3, &empty_store(), move |_, range| {
                assert_eq!(range.size, 1);
                calls_in_task.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failures_are_collected_after_join() {
        let finished = Arc::new(AtomicUsize::new(0));
        let finished_in_task = Arc::clone(&finished);
        let err = WorkerPool::new(3)
            .run_stage("flaky", 9, &empty_store(), move |_, range| {
                finished_in_task.fetch_add(1, Ordering::SeqCst);
                if range.start == 3 {
                    return Err(CleanupError::MalformedNetlist {
                        line: 1,
                        reason: "bad row".to_string(),
                    });
                }
                if range.start == 6 {
                    panic!("boom");
                }
                Ok(range.size)
            })
            .unwrap_err();
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        match err {
            CleanupError::StageFailed { stage, failures } => {
                assert_eq!(stage, "flaky");
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].range, WorkRange { start: 3, size: 3 });
                assert!(failures[0].message.contains("bad row"));
                assert!(failures[1].message.contains("boom"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
