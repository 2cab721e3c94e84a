//! Background task scheduler
//!
//! Fire-and-forget work that must complete after the response is out:
//! cache writes, TTL refreshes, presigned-URL renewals, corrupt-entry
//! purges. Tasks run on their own tokio tasks under a lifetime limit and
//! never block the response path.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Enforced lifetime for a background task
pub const DEFAULT_TASK_LIFETIME_SECONDS: u64 = 30;

/// Spawns and tracks background tasks
pub struct BackgroundScheduler {
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
    lifetime: Duration,
}

impl BackgroundScheduler {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            lifetime,
        }
    }

    /// Hands a task off. The task runs to completion (or the lifetime
    /// limit) regardless of what happens to the request that spawned it.
    pub fn spawn<F>(&self, name: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lifetime = self.lifetime;
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            debug!(task = %task_name, "background task started");
            if tokio::time::timeout(lifetime, task).await.is_err() {
                warn!(task = %task_name, ?lifetime, "background task exceeded lifetime");
            }
        });

        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.retain(|(_, handle)| !handle.is_finished());
        tasks.push((name.to_string(), handle));
    }

    /// Number of tasks not yet finished
    pub fn pending(&self) -> usize {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.iter().filter(|(_, h)| !h.is_finished()).count()
    }

    /// Awaits every tracked task; shutdown and test hook
    pub async fn drain(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut tasks = self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tasks.drain(..).collect()
        };
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!(task = %name, error = %e, "background task panicked");
            }
        }
    }
}

impl Default for BackgroundScheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TASK_LIFETIME_SECONDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_task_runs_to_completion() {
        let scheduler = BackgroundScheduler::default();
        let done = Arc::new(AtomicBool::new(false));

        let flag = done.clone();
        scheduler.spawn("mark-done", async move {
            flag.store(true, Ordering::SeqCst);
        });

        scheduler.drain().await;
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_lifetime_limit_abandons_task() {
        let scheduler = BackgroundScheduler::new(Duration::from_millis(20));
        let done = Arc::new(AtomicBool::new(false));

        let flag = done.clone();
        scheduler.spawn("too-slow", async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });

        scheduler.drain().await;
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_many_tasks_tracked() {
        let scheduler = BackgroundScheduler::default();
        for i in 0..5 {
            scheduler.spawn(&format!("task-{}", i), async {});
        }
        scheduler.drain().await;
        assert_eq!(scheduler.pending(), 0);
    }
}
