//! Deletion of everything outside the keep-set.

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use retention_core::{
    traits::BackupCatalog,
    types::{Backup, DeletionError},
    Error,
};

/// What happened to each deletion candidate.
#[derive(Debug, Clone, Default)]
pub struct DeletionOutcome {
    /// Keys removed.
    pub deleted: Vec<String>,
    /// Bytes removed.
    pub deleted_bytes: u64,
    /// Deletions that failed.
    pub errors: Vec<DeletionError>,
    /// Candidates not attempted because of cancellation.
    pub skipped: Vec<String>,
}

async fn delete_one(
    catalog: &dyn BackupCatalog,
    backup: Backup,
) -> (Backup, retention_core::Result<()>) {
    let result = catalog.delete(&backup.key).await;
    (backup, result)
}

/// Delete `candidates` with at most `concurrency` requests in flight.
///
/// A failure is recorded and the remaining candidates are still attempted.
/// Once `cancel` fires no new deletion starts; in-flight ones are awaited and
/// everything not yet started is reported as skipped. Results are folded here,
/// on the awaiting task, so each candidate lands in exactly one list.
pub async fn execute_deletions(
    catalog: &dyn BackupCatalog,
    candidates: Vec<Backup>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> DeletionOutcome {
    let concurrency = concurrency.max(1);
    let mut outcome = DeletionOutcome::default();
    let mut pending = candidates.into_iter();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < concurrency && !cancel.is_cancelled() {
            match pending.next() {
                Some(backup) => in_flight.push(delete_one(catalog, backup)),
                None => break,
            }
        }

        let Some((backup, result)) = in_flight.next().await else {
            break;
        };

        match result {
            Ok(()) => {
                tracing::debug!(key = %backup.key, size = backup.size_bytes, "Deleted backup");
                outcome.deleted_bytes += backup.size_bytes;
                outcome.deleted.push(backup.key);
            }
            Err(e) => {
                let message = match e {
                    Error::Deletion { message, .. } => message,
                    other => other.to_string(),
                };
                tracing::warn!(key = %backup.key, error = %message, "Failed to delete backup");
                outcome.errors.push(DeletionError {
                    key: backup.key,
                    message,
                });
            }
        }
    }

    outcome.skipped.extend(pending.map(|backup| backup.key));
    if !outcome.skipped.is_empty() {
        tracing::warn!(
            skipped = outcome.skipped.len(),
            "Retention run cancelled before all deletions were attempted"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use retention_core::{mocks::MockCatalog, types::ObjectEntry, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn backups(keys: &[&str]) -> Vec<Backup> {
        keys.iter()
            .map(|k| Backup {
                key: k.to_string(),
                file_name: k.to_string(),
                size_bytes: 10,
                created_at: Utc::now(),
            })
            .collect()
    }

    fn catalog_with(keys: &[&str]) -> MockCatalog {
        MockCatalog::new(keys.iter().map(|k| ObjectEntry::new(*k, 10, Utc::now())))
    }

    #[tokio::test]
    async fn test_failures_do_not_block_other_deletions() {
        let keys = ["a", "b", "c", "d"];
        let catalog = catalog_with(&keys).with_delete_failure("b", "AccessDenied");

        let mut outcome =
            execute_deletions(&catalog, backups(&keys), 2, &CancellationToken::new()).await;
        outcome.deleted.sort();

        assert_eq!(outcome.deleted, vec!["a", "c", "d"]);
        assert_eq!(outcome.deleted_bytes, 30);
        assert_eq!(
            outcome.errors,
            vec![DeletionError {
                key: "b".into(),
                message: "AccessDenied".into()
            }]
        );
        assert!(outcome.skipped.is_empty());
        assert_eq!(catalog.remaining_keys(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let keys = ["a", "b"];
        let catalog = catalog_with(&keys);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = execute_deletions(&catalog, backups(&keys), 4, &cancel).await;
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.skipped, vec!["a", "b"]);
        assert!(catalog.delete_calls().is_empty());
    }

    /// Cancels the token on its first delete and tracks peak concurrency.
    struct SlowCatalog {
        cancel: CancellationToken,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BackupCatalog for SlowCatalog {
        fn name(&self) -> &str {
            "slow"
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<ObjectEntry>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.cancel.cancel();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancellation_finishes_in_flight_and_skips_rest() {
        let cancel = CancellationToken::new();
        let catalog = Arc::new(SlowCatalog {
            cancel: cancel.clone(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let keys: Vec<String> = (0..10).map(|i| format!("k{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let outcome = execute_deletions(catalog.as_ref(), backups(&refs), 3, &cancel).await;

        // The first batch of 3 was started before the token fired.
        assert_eq!(outcome.deleted.len(), 3);
        assert_eq!(outcome.skipped.len(), 7);
        assert_eq!(outcome.deleted.len() + outcome.skipped.len(), 10);
        assert!(catalog.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let catalog = SlowCatalog {
            cancel: CancellationToken::new(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        };
        let keys: Vec<String> = (0..12).map(|i| format!("k{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let outcome =
            execute_deletions(&catalog, backups(&refs), 4, &CancellationToken::new()).await;
        assert_eq!(outcome.deleted.len(), 12);
        assert!(catalog.peak.load(Ordering::SeqCst) <= 4);
    }
}
