//! Bounded-concurrency execution of per-pair work.

use crate::config::ClusterConfig;
use crate::errors::{Result, XenoflowError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Runs async work over a list of items with a concurrency bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    max_concurrent: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(&ClusterConfig::default())
    }
}

impl Executor {
    /// Creates an executor running at most `max_concurrent` items at once.
    ///
    /// Zero is treated as one.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Creates an executor that runs one item at a time.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(1)
    }

    /// Creates an executor from the cluster settings.
    #[must_use]
    pub fn from_config(cluster: &ClusterConfig) -> Self {
        Self::new(cluster.max_concurrent())
    }

    /// The concurrency bound.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Applies `f` to every item and returns the results in input order.
    ///
    /// Each item runs in its own task. A task that panics yields a
    /// [`XenoflowError::Task`] for its item only.
    pub async fn map<T, R, F, Fut>(&self, items: Vec<T>, f: F) -> Vec<Result<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        debug!(
            items = items.len(),
            max_concurrent = self.max_concurrent,
            "Dispatching work"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let f = Arc::new(f);

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let semaphore = Arc::clone(&semaphore);
                let f = Arc::clone(&f);
                tokio::spawn(async move {
                    // The semaphore is never closed, so a permit is always granted.
                    let _permit = semaphore.acquire_owned().await.ok();
                    f(item).await
                })
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| {
                joined.map_err(|e| {
                    error!(index, error = %e, "Worker task failed");
                    XenoflowError::Task(format!("item {index}: {e}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_map_preserves_order() {
        let executor = Executor::new(4);
        let results = executor
            .map((0..10).collect(), |i: u64| async move {
                tokio::time::sleep(Duration::from_millis(10 - i)).await;
                i * 2
            })
            .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_map_respects_bound() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let executor = Executor::new(2);

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        executor
            .map((0..8).collect(), move |_: u32| {
                let running = Arc::clone(&r);
                let peak = Arc::clone(&p);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panic_isolated_to_item() {
        let results = Executor::serial()
            .map(vec![1, 2, 3], |i: i32| async move {
                assert_ne!(i, 2, "boom");
                i
            })
            .await;

        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(XenoflowError::Task(_))));
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[test]
    fn test_from_config() {
        let local = ClusterConfig {
            cores: Some(8),
            local: true,
        };
        assert_eq!(Executor::from_config(&local).max_concurrent(), 1);
        assert_eq!(Executor::new(0).max_concurrent(), 1);
        assert!(Executor::default().max_concurrent() >= 1);
    }
}
