use serde::{Deserialize, Serialize};
use std::fmt;

use super::backup::Backup;

// =============================================================================
// Run Results
// =============================================================================

/// A deletion that was attempted and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionError {
    pub key: String,
    pub message: String,
}

/// Outcome of one retention run.
///
/// Every listed object ends up in exactly one of `kept`, `deleted`,
/// `errors` or `skipped`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionResult {
    /// Backups retained, newest first.
    pub kept: Vec<Backup>,
    /// Keys removed during this run.
    pub deleted: Vec<String>,
    /// Summed size of the full listing.
    pub total_size_before: u64,
    /// Summed size of everything still stored after the run: `kept` plus
    /// failed and skipped candidates.
    pub total_size_after: u64,
    /// Deletions attempted and failed.
    pub errors: Vec<DeletionError>,
    /// Candidates never attempted because the run was cancelled.
    pub skipped: Vec<String>,
}

impl RetentionResult {
    /// Bytes reclaimed by the run.
    pub fn space_saved_bytes(&self) -> u64 {
        self.total_size_before.saturating_sub(self.total_size_after)
    }

    /// Whether any deletion failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of listed objects this result accounts for.
    pub fn accounted(&self) -> usize {
        self.kept.len() + self.deleted.len() + self.errors.len() + self.skipped.len()
    }
}

// =============================================================================
// Plans (dry run)
// =============================================================================

/// Why a backup is scheduled for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletionReason {
    /// Older than every retention window.
    Expired,
    /// A newer backup represents the same week or month.
    TierRedundant,
    /// Evicted to satisfy the backup count cap.
    CountCap,
    /// Evicted to satisfy the total size cap.
    SizeCap,
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeletionReason::Expired => "expired",
            DeletionReason::TierRedundant => "tier-redundant",
            DeletionReason::CountCap => "count cap",
            DeletionReason::SizeCap => "size cap",
        };
        f.write_str(label)
    }
}

/// A backup scheduled for deletion together with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionCandidate {
    pub backup: Backup,
    pub reason: DeletionReason,
}

/// Keep-set and delete-set computed from a listing, before any deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPlan {
    /// Backups to keep, newest first.
    pub kept: Vec<Backup>,
    /// Backups to delete, newest first.
    pub to_delete: Vec<DeletionCandidate>,
    /// Summed size of the full listing.
    pub total_size_before: u64,
    /// Summed size of `kept`.
    pub total_size_after: u64,
}

impl RetentionPlan {
    /// Bytes the plan would reclaim.
    pub fn space_to_reclaim(&self) -> u64 {
        self.total_size_before.saturating_sub(self.total_size_after)
    }
}
