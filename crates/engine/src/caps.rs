//! Global count and size ceilings applied after tier selection.

use retention_core::types::{Backup, DeletionCandidate, DeletionReason, RetentionPolicy};

/// Trim a newest-first keep-set to the policy's caps.
///
/// The count cap is applied first, then the size cap. Both evict from the
/// tail, so no evicted backup is ever newer than a retained one. Returns the
/// evicted backups newest first.
pub fn enforce_caps(
    kept: &mut Vec<Backup>,
    policy: &RetentionPolicy,
) -> Vec<DeletionCandidate> {
    let mut evicted = Vec::new();

    if let Some(cap) = policy.count_cap() {
        while kept.len() > cap {
            if let Some(backup) = kept.pop() {
                evicted.push(DeletionCandidate {
                    backup,
                    reason: DeletionReason::CountCap,
                });
            }
        }
    }

    if let Some(cap) = policy.size_cap() {
        let mut total: u64 = kept.iter().map(|b| b.size_bytes).sum();
        while total > cap {
            let Some(backup) = kept.pop() else { break };
            total -= backup.size_bytes;
            evicted.push(DeletionCandidate {
                backup,
                reason: DeletionReason::SizeCap,
            });
        }
    }

    evicted.reverse();
    if !evicted.is_empty() {
        tracing::debug!(
            evicted = evicted.len(),
            remaining = kept.len(),
            "Caps evicted backups"
        );
    }
    evicted
}
