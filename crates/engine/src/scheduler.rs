//! Single-flight run lanes and run deadlines.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use retention_core::{Error, Result};

/// Single-flight lanes for retention runs.
///
/// Two runs against the same (bucket, prefix) could both list before either
/// deletes and then act on stale snapshots. Callers route every run through
/// a lane keyed on the target so at most one is active at a time.
#[derive(Default)]
pub struct RunScheduler {
    lanes: DashMap<String, Arc<Mutex<()>>>,
}

impl RunScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lane key for a bucket and prefix.
    pub fn lane_key(bucket: &str, prefix: &str) -> String {
        format!("{}::{}", bucket, prefix)
    }

    fn lane(&self, key: &str) -> Arc<Mutex<()>> {
        self.lanes
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `operation` once the lane for `key` is free.
    pub async fn run<F, Fut, T>(&self, key: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lane = self.lane(key);
        let _guard = lane.lock().await;
        operation().await
    }

    /// Run `operation` only if no run holds the lane for `key`.
    pub async fn try_run<F, Fut, T>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lane = self.lane(key);
        let Ok(_guard) = lane.try_lock() else {
            tracing::warn!(lane = %key, "Rejecting overlapping retention run");
            return Err(Error::RunInProgress(key.to_string()));
        };
        operation().await
    }

    /// Whether a run currently holds the lane for `key`.
    pub fn is_running(&self, key: &str) -> bool {
        self.lanes
            .get(key)
            .map(|lane| lane.try_lock().is_err())
            .unwrap_or(false)
    }
}

/// A cancellation token that fires after `timeout`, if one is given.
///
/// Abort the returned handle once the run finishes so the timer does not
/// outlive it.
pub fn deadline_token(timeout: Option<Duration>) -> (CancellationToken, Option<JoinHandle<()>>) {
    let token = CancellationToken::new();
    let timer = timeout.map(|timeout| {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(timeout_secs = timeout.as_secs(), "Retention run deadline reached");
            token.cancel();
        })
    });
    (token, timer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_try_run_rejects_overlap() {
        let scheduler = Arc::new(RunScheduler::new());
        let key = RunScheduler::lane_key("bucket", "backups/");
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let scheduler = scheduler.clone();
            let key = key.clone();
            tokio::spawn(async move {
                scheduler
                    .try_run(&key, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(1)
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert!(scheduler.is_running(&key));

        let second = scheduler.try_run(&key, || async { Ok(2) }).await;
        assert!(matches!(second, Err(Error::RunInProgress(_))));

        // A different prefix has its own lane.
        let other = scheduler
            .try_run(&RunScheduler::lane_key("bucket", "other/"), || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(other, 3);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert!(!scheduler.is_running(&key));

        let third = scheduler.try_run(&key, || async { Ok(4) }).await.unwrap();
        assert_eq!(third, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_token_fires() {
        let (token, timer) = deadline_token(Some(Duration::from_secs(30)));
        assert!(!token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(token.is_cancelled());
        assert!(timer.is_some());

        let (token, timer) = deadline_token(None);
        assert!(timer.is_none());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_waits_for_lane() {
        let scheduler = RunScheduler::new();
        let value = scheduler.run("k", || async { 7 }).await;
        assert_eq!(value, 7);
    }
}
