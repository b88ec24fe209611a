//! Tier assignment by backup age.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use retention_core::types::{Backup, ObjectEntry, RetentionPolicy, Tier};

/// A backup together with the tier its age places it in.
#[derive(Debug, Clone)]
pub struct ClassifiedBackup {
    pub backup: Backup,
    pub tier: Tier,
}

/// Tier for a backup of the given age.
///
/// Windows are half-open and contiguous: `[0, daily)`, `[daily, weekly)`,
/// `[weekly, monthly)`, then expired. Negative ages (clock skew) count as 0.
pub fn tier_for_age(age: Duration, policy: &RetentionPolicy) -> Tier {
    let age = age.max(Duration::zero());
    if age < policy.daily_window_end() {
        Tier::Daily
    } else if age < policy.weekly_window_end() {
        Tier::Weekly
    } else if age < policy.monthly_window_end() {
        Tier::Monthly
    } else {
        Tier::Expired
    }
}

/// Convert a raw listing into tiered backup records relative to `now`.
///
/// Duplicate keys in the listing are collapsed to their first occurrence.
pub fn classify(
    entries: Vec<ObjectEntry>,
    prefix: &str,
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> Vec<ClassifiedBackup> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.key.clone()))
        .map(|entry| {
            let backup = Backup::from_entry(entry, prefix);
            let tier = tier_for_age(now - backup.created_at, policy);
            ClassifiedBackup { backup, tier }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn entry_aged(key: &str, age: Duration) -> ObjectEntry {
        ObjectEntry::new(key, 100, now() - age)
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let policy = RetentionPolicy::default(); // 7d / 4w / 6m

        assert_eq!(tier_for_age(Duration::zero(), &policy), Tier::Daily);
        assert_eq!(tier_for_age(Duration::days(7) - Duration::seconds(1), &policy), Tier::Daily);
        assert_eq!(tier_for_age(Duration::days(7), &policy), Tier::Weekly);
        assert_eq!(tier_for_age(Duration::days(35) - Duration::seconds(1), &policy), Tier::Weekly);
        assert_eq!(tier_for_age(Duration::days(35), &policy), Tier::Monthly);
        assert_eq!(tier_for_age(Duration::days(215) - Duration::seconds(1), &policy), Tier::Monthly);
        assert_eq!(tier_for_age(Duration::days(215), &policy), Tier::Expired);
    }

    #[test]
    fn test_zero_daily_falls_through_to_weekly() {
        let policy = RetentionPolicy::new(0, 4, 6);
        assert_eq!(tier_for_age(Duration::zero(), &policy), Tier::Weekly);
        assert_eq!(tier_for_age(Duration::days(27), &policy), Tier::Weekly);
        assert_eq!(tier_for_age(Duration::days(28), &policy), Tier::Monthly);
    }

    #[test]
    fn test_all_zero_expires_everything() {
        let policy = RetentionPolicy::new(0, 0, 0);
        assert_eq!(tier_for_age(Duration::zero(), &policy), Tier::Expired);
    }

    #[test]
    fn test_future_backups_count_as_new() {
        let policy = RetentionPolicy::default();
        assert_eq!(tier_for_age(Duration::hours(-3), &policy), Tier::Daily);
    }

    #[test]
    fn test_classify_listing() {
        let policy = RetentionPolicy::default();
        let entries = vec![
            entry_aged("backups/new.sql.gz", Duration::days(1)),
            entry_aged("backups/week.sql.gz", Duration::days(10)),
            entry_aged("backups/month.sql.gz", Duration::days(100)),
            entry_aged("backups/ancient.sql.gz", Duration::days(400)),
            entry_aged("backups/new.sql.gz", Duration::days(400)),
        ];

        let classified = classify(entries, "backups/", now(), &policy);
        let tiers: Vec<_> = classified
            .iter()
            .map(|c| (c.backup.file_name.as_str(), c.tier))
            .collect();

        assert_eq!(
            tiers,
            vec![
                ("new.sql.gz", Tier::Daily),
                ("week.sql.gz", Tier::Weekly),
                ("month.sql.gz", Tier::Monthly),
                ("ancient.sql.gz", Tier::Expired),
            ]
        );
    }
}
