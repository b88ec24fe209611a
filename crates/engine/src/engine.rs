//! The retention pipeline: list, plan, delete.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use retention_core::{
    traits::BackupCatalog,
    types::{ObjectEntry, RetentionPlan, RetentionPolicy, RetentionResult},
    Error, Result,
};
use retention_governance::track_retention_run;

use crate::caps::enforce_caps;
use crate::classifier::classify;
use crate::executor::execute_deletions;
use crate::selector::{newest_first, select, Selection};

/// Default number of deletions in flight at once.
pub const DEFAULT_DELETE_CONCURRENCY: usize = 8;

/// Compute the keep-set and delete-set for a listing. Pure.
pub fn build_plan(
    entries: Vec<ObjectEntry>,
    prefix: &str,
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> RetentionPlan {
    let classified = classify(entries, prefix, now, policy);
    let total_size_before = classified.iter().map(|c| c.backup.size_bytes).sum();

    let Selection {
        mut kept,
        mut rejected,
    } = select(classified);
    rejected.extend(enforce_caps(&mut kept, policy));
    rejected.sort_by(|a, b| newest_first(&a.backup, &b.backup));

    let total_size_after = kept.iter().map(|b| b.size_bytes).sum();
    RetentionPlan {
        kept,
        to_delete: rejected,
        total_size_before,
        total_size_after,
    }
}

/// Applies a retention policy to the backups under one prefix of a catalog.
///
/// The engine holds no state between runs. Callers serialize runs per
/// target (see [`crate::RunScheduler`]).
pub struct RetentionEngine {
    catalog: Arc<dyn BackupCatalog>,
    prefix: String,
    delete_concurrency: usize,
}

impl RetentionEngine {
    /// Create an engine over `catalog`, scoped to `prefix`.
    pub fn new(catalog: Arc<dyn BackupCatalog>, prefix: impl Into<String>) -> Self {
        Self {
            catalog,
            prefix: prefix.into(),
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
        }
    }

    /// Set the deletion concurrency limit (minimum 1).
    pub fn with_delete_concurrency(mut self, limit: usize) -> Self {
        self.delete_concurrency = limit.max(1);
        self
    }

    /// Prefix this engine operates on.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the underlying catalog adapter.
    pub fn catalog_name(&self) -> &str {
        self.catalog.name()
    }

    async fn list(&self) -> Result<Vec<ObjectEntry>> {
        self.catalog.list(&self.prefix).await.map_err(|e| match e {
            Error::Listing(_) => e,
            other => Error::listing(other.to_string()),
        })
    }

    /// Compute what a run would do now, without deleting anything.
    pub async fn plan(&self, policy: &RetentionPolicy) -> Result<RetentionPlan> {
        self.plan_at(policy, Utc::now()).await
    }

    /// Compute what a run at `now` would do, without deleting anything.
    pub async fn plan_at(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<RetentionPlan> {
        policy.validate()?;
        let entries = self.list().await?;
        Ok(build_plan(entries, &self.prefix, now, policy))
    }

    /// Apply `policy` now.
    pub async fn run(
        &self,
        policy: &RetentionPolicy,
        cancel: &CancellationToken,
    ) -> Result<RetentionResult> {
        self.run_at(policy, Utc::now(), cancel).await
    }

    /// Apply `policy` as of `now`.
    ///
    /// Validation and listing failures abort before any deletion. Per-object
    /// deletion failures are returned in the result.
    pub async fn run_at(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RetentionResult> {
        let started = Instant::now();
        let outcome = self.execute(policy, now, cancel).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &outcome {
            Ok(result) => {
                let label = if result.has_errors() || !result.skipped.is_empty() {
                    "partial"
                } else {
                    "success"
                };
                track_retention_run(
                    label,
                    result.deleted.len(),
                    result.errors.len(),
                    result.space_saved_bytes(),
                    elapsed,
                );
                tracing::info!(
                    prefix = %self.prefix,
                    kept = result.kept.len(),
                    deleted = result.deleted.len(),
                    failed = result.errors.len(),
                    skipped = result.skipped.len(),
                    reclaimed_bytes = result.space_saved_bytes(),
                    elapsed_sec = elapsed,
                    "Retention run finished"
                );
            }
            Err(e) => {
                track_retention_run("failed", 0, 0, 0, elapsed);
                tracing::error!(prefix = %self.prefix, error = %e, "Retention run aborted");
            }
        }

        outcome
    }

    async fn execute(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RetentionResult> {
        let RetentionPlan {
            kept,
            to_delete,
            total_size_before,
            ..
        } = self.plan_at(policy, now).await?;

        tracing::info!(
            prefix = %self.prefix,
            catalog = %self.catalog.name(),
            kept = kept.len(),
            candidates = to_delete.len(),
            "Retention plan computed"
        );

        let candidates = to_delete.into_iter().map(|c| c.backup).collect();
        let outcome = execute_deletions(
            self.catalog.as_ref(),
            candidates,
            self.delete_concurrency,
            cancel,
        )
        .await;

        Ok(RetentionResult {
            kept,
            deleted: outcome.deleted,
            total_size_before,
            total_size_after: total_size_before.saturating_sub(outcome.deleted_bytes),
            errors: outcome.errors,
            skipped: outcome.skipped,
        })
    }
}
