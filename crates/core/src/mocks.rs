//! Mock implementations of core traits for testing.
//!
//! `MockCatalog` is a scripted catalog: seed it with listing entries, make
//! the listing fail, or make deletion of specific keys fail, then inspect the
//! calls the engine made.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{traits::BackupCatalog, types::ObjectEntry, Error, Result};

// =============================================================================
// Mock Catalog
// =============================================================================

/// Scripted backup catalog.
#[derive(Default)]
pub struct MockCatalog {
    objects: Mutex<BTreeMap<String, ObjectEntry>>,
    list_error: Mutex<Option<String>>,
    delete_failures: Mutex<HashMap<String, String>>,
    delete_calls: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl MockCatalog {
    /// Create a mock seeded with `entries`.
    pub fn new(entries: impl IntoIterator<Item = ObjectEntry>) -> Self {
        let catalog = Self::default();
        {
            let mut objects = catalog.objects.lock().unwrap();
            for entry in entries {
                objects.insert(entry.key.clone(), entry);
            }
        }
        catalog
    }

    /// Make every listing call fail with `message`.
    pub fn with_list_error(self, message: &str) -> Self {
        *self.list_error.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Make deletion of `key` fail with `message`.
    pub fn with_delete_failure(self, key: &str, message: &str) -> Self {
        self.delete_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), message.to_string());
        self
    }

    /// Stop failing deletions of `key`.
    pub fn clear_delete_failure(&self, key: &str) {
        self.delete_failures.lock().unwrap().remove(key);
    }

    /// Keys passed to `delete`, in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }

    /// Number of `list` calls.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Keys still stored, sorted.
    pub fn remaining_keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BackupCatalog for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(Error::listing(message));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_calls.lock().unwrap().push(key.to_string());
        if let Some(message) = self.delete_failures.lock().unwrap().get(key) {
            return Err(Error::deletion(key, message.clone()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_mock_catalog_lists_by_prefix() {
        let now = Utc::now();
        let catalog = MockCatalog::new(vec![
            ObjectEntry::new("backups/a", 1, now),
            ObjectEntry::new("other/b", 1, now),
        ]);

        let listed = catalog.list("backups/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "backups/a");
        assert_eq!(catalog.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_catalog_scripted_failures() {
        let now = Utc::now();
        let catalog = MockCatalog::new(vec![ObjectEntry::new("a", 1, now)])
            .with_delete_failure("a", "AccessDenied");

        let err = catalog.delete("a").await.unwrap_err();
        assert!(matches!(err, Error::Deletion { .. }));
        assert_eq!(catalog.remaining_keys(), vec!["a".to_string()]);

        catalog.clear_delete_failure("a");
        catalog.delete("a").await.unwrap();
        assert!(catalog.remaining_keys().is_empty());
        assert_eq!(catalog.delete_calls().len(), 2);

        let failing = MockCatalog::default().with_list_error("denied");
        assert!(matches!(failing.list("").await, Err(Error::Listing(_))));
    }
}
