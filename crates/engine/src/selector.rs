//! Per-tier selection of the backups to retain.

use chrono::Datelike;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use retention_core::types::{Backup, DeletionCandidate, DeletionReason, Tier};

use crate::classifier::ClassifiedBackup;

/// Output of tier selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Backups retained by their tier, newest first.
    pub kept: Vec<Backup>,
    /// Backups their tier does not retain.
    pub rejected: Vec<DeletionCandidate>,
}

/// Dedup bucket within a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    /// ISO year and ISO week number.
    Week(i32, u32),
    /// Calendar year and month.
    Month(i32, u32),
}

/// Newest-first ordering: later `created_at` first, then greater key first.
///
/// This is a total order over distinct keys, so sorting with it is
/// deterministic regardless of listing order.
pub fn newest_first(a: &Backup, b: &Backup) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.key.cmp(&a.key))
}

fn bucket_for(backup: &Backup, tier: Tier) -> Option<Bucket> {
    match tier {
        Tier::Weekly => {
            let week = backup.created_at.iso_week();
            Some(Bucket::Week(week.year(), week.week()))
        }
        Tier::Monthly => Some(Bucket::Month(
            backup.created_at.year(),
            backup.created_at.month(),
        )),
        Tier::Daily | Tier::Expired => None,
    }
}

/// Apply each tier's retention rule.
///
/// - daily: keep everything
/// - weekly: keep the newest backup of each ISO week
/// - monthly: keep the newest backup of each calendar month
/// - expired: keep nothing
///
/// Ties on `created_at` go to the lexicographically greater key.
pub fn select(classified: Vec<ClassifiedBackup>) -> Selection {
    let mut selection = Selection::default();
    let mut winners: HashMap<Bucket, Backup> = HashMap::new();

    for ClassifiedBackup { backup, tier } in classified {
        if tier == Tier::Expired {
            selection.rejected.push(DeletionCandidate {
                backup,
                reason: DeletionReason::Expired,
            });
            continue;
        }

        let Some(bucket) = bucket_for(&backup, tier) else {
            selection.kept.push(backup);
            continue;
        };

        match winners.entry(bucket) {
            Entry::Vacant(slot) => {
                slot.insert(backup);
            }
            Entry::Occupied(mut slot) => {
                let loser = if newest_first(&backup, slot.get()) == Ordering::Less {
                    slot.insert(backup)
                } else {
                    backup
                };
                selection.rejected.push(DeletionCandidate {
                    backup: loser,
                    reason: DeletionReason::TierRedundant,
                });
            }
        }
    }

    selection.kept.extend(winners.into_values());
    selection.kept.sort_by(newest_first);
    selection
        .rejected
        .sort_by(|a, b| newest_first(&a.backup, &b.backup));
    selection
}
