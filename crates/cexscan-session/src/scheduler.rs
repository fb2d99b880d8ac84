//! Cancellable scheduled tasks keyed by name.
//!
//! Spawning under an existing key aborts the previous task first, so at most
//! one timer or debounced write per key is ever alive.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct KeyedTasks {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl KeyedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` under `key`, replacing any predecessor.
    pub fn spawn<F>(&self, key: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        if let Some(previous) = tasks.remove(key) {
            previous.abort();
            trace!(key, "Replaced scheduled task");
        }
        tasks.insert(key.to_string(), tokio::spawn(task));
    }

    /// Run `task` after `delay` under `key`, replacing any predecessor.
    pub fn spawn_after<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(key, async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }

    /// Abort the task under `key`. Returns true if one was still running.
    pub fn cancel(&self, key: &str) -> bool {
        match self.tasks.lock().remove(key) {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.abort();
                running
            }
            None => false,
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort every task whose key starts with `prefix`.
    pub fn cancel_prefix(&self, prefix: &str) -> usize {
        let mut tasks = self.tasks.lock();
        let keys: Vec<String> = tasks
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let mut cancelled = 0;
        for key in keys {
            if let Some(handle) = tasks.remove(&key) {
                if !handle.is_finished() {
                    cancelled += 1;
                }
                handle.abort();
            }
        }
        cancelled
    }

    pub fn cancel_all(&self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }
}
