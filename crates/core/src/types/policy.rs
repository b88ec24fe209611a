//! Retention policy configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Days counted per week when sizing the weekly window.
pub const DAYS_PER_WEEK: u64 = 7;

/// Days counted per month when sizing the monthly window.
pub const DAYS_PER_MONTH: u64 = 30;

/// Upper bound on the combined width of all retention windows.
pub const MAX_WINDOW_DAYS: u64 = 100 * 366;

/// Tiered retention policy for backup archives.
///
/// The three windows are nested and contiguous: the daily window covers the
/// most recent `daily_retention_days` days, the weekly window starts where the
/// daily one ends and spans `7 * weekly_retention_weeks` days, and the monthly
/// window follows for `30 * monthly_retention_months` days. Anything older is
/// expired. A zero count collapses its window to nothing.
///
/// Caps use zero for "unbounded".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Days during which every backup is kept.
    pub daily_retention_days: u32,
    /// Weeks (after the daily window) during which one backup per ISO week is kept.
    pub weekly_retention_weeks: u32,
    /// Months (after the weekly window) during which one backup per calendar month is kept.
    pub monthly_retention_months: u32,
    /// Ceiling on the summed size of kept backups, 0 for none.
    #[serde(default)]
    pub max_total_size_bytes: u64,
    /// Ceiling on the number of kept backups, 0 for none.
    #[serde(default)]
    pub max_backup_count: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily_retention_days: 7,
            weekly_retention_weeks: 4,
            monthly_retention_months: 6,
            max_total_size_bytes: 0,
            max_backup_count: 0,
        }
    }
}

impl RetentionPolicy {
    /// Creates a tier-only policy with no caps.
    #[must_use]
    pub const fn new(daily_days: u32, weekly_weeks: u32, monthly_months: u32) -> Self {
        Self {
            daily_retention_days: daily_days,
            weekly_retention_weeks: weekly_weeks,
            monthly_retention_months: monthly_months,
            max_total_size_bytes: 0,
            max_backup_count: 0,
        }
    }

    /// Sets the count cap.
    #[must_use]
    pub const fn with_max_backup_count(mut self, count: u32) -> Self {
        self.max_backup_count = count;
        self
    }

    /// Sets the size cap.
    #[must_use]
    pub const fn with_max_total_size_bytes(mut self, bytes: u64) -> Self {
        self.max_total_size_bytes = bytes;
        self
    }

    /// Rejects policies whose windows cannot be represented.
    pub fn validate(&self) -> Result<()> {
        let total = self.total_window_days();
        if total > MAX_WINDOW_DAYS {
            return Err(Error::invalid_policy(format!(
                "combined retention windows span {} days, limit is {}",
                total, MAX_WINDOW_DAYS
            )));
        }
        Ok(())
    }

    /// End of the daily window, measured as age.
    pub fn daily_window_end(&self) -> Duration {
        days(u64::from(self.daily_retention_days))
    }

    /// End of the weekly window, measured as age.
    pub fn weekly_window_end(&self) -> Duration {
        days(self.weekly_end_days())
    }

    /// End of the monthly window, measured as age. Older backups are expired.
    pub fn monthly_window_end(&self) -> Duration {
        days(self.total_window_days())
    }

    /// Count cap, if any.
    pub fn count_cap(&self) -> Option<usize> {
        (self.max_backup_count > 0).then_some(self.max_backup_count as usize)
    }

    /// Size cap, if any.
    pub fn size_cap(&self) -> Option<u64> {
        (self.max_total_size_bytes > 0).then_some(self.max_total_size_bytes)
    }

    /// Returns this policy with every field present in `overrides` replaced.
    #[must_use]
    pub fn merged(self, overrides: &PolicyOverride) -> Self {
        Self {
            daily_retention_days: overrides
                .daily_retention_days
                .unwrap_or(self.daily_retention_days),
            weekly_retention_weeks: overrides
                .weekly_retention_weeks
                .unwrap_or(self.weekly_retention_weeks),
            monthly_retention_months: overrides
                .monthly_retention_months
                .unwrap_or(self.monthly_retention_months),
            max_total_size_bytes: overrides
                .max_total_size_bytes
                .unwrap_or(self.max_total_size_bytes),
            max_backup_count: overrides.max_backup_count.unwrap_or(self.max_backup_count),
        }
    }

    /// Human-readable description of every field with its current value.
    pub fn describe(&self) -> Vec<PolicyField> {
        vec![
            PolicyField::new(
                "dailyRetentionDays",
                self.daily_retention_days,
                "Backups younger than this many days are all kept.",
            ),
            PolicyField::new(
                "weeklyRetentionWeeks",
                self.weekly_retention_weeks,
                "After the daily window, keep the newest backup of each ISO week for this many weeks (7 days each).",
            ),
            PolicyField::new(
                "monthlyRetentionMonths",
                self.monthly_retention_months,
                "After the weekly window, keep the newest backup of each calendar month for this many months (30 days each).",
            ),
            PolicyField::new(
                "maxTotalSizeBytes",
                self.max_total_size_bytes,
                "Evict the oldest kept backups until their total size fits this limit. 0 disables the cap.",
            ),
            PolicyField::new(
                "maxBackupCount",
                self.max_backup_count,
                "Evict the oldest kept backups until at most this many remain. 0 disables the cap.",
            ),
        ]
    }

    fn weekly_end_days(&self) -> u64 {
        u64::from(self.daily_retention_days)
            + DAYS_PER_WEEK * u64::from(self.weekly_retention_weeks)
    }

    fn total_window_days(&self) -> u64 {
        self.weekly_end_days() + DAYS_PER_MONTH * u64::from(self.monthly_retention_months)
    }
}

fn days(count: u64) -> Duration {
    // Bounded by MAX_WINDOW_DAYS after validation; saturate otherwise.
    let count = i64::try_from(count.min(MAX_WINDOW_DAYS)).unwrap_or(i64::MAX);
    Duration::days(count)
}

/// Partial policy supplied by a caller; absent fields use the default policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyOverride {
    pub daily_retention_days: Option<u32>,
    pub weekly_retention_weeks: Option<u32>,
    pub monthly_retention_months: Option<u32>,
    pub max_total_size_bytes: Option<u64>,
    pub max_backup_count: Option<u32>,
}

impl PolicyOverride {
    /// Parse an override from a JSON request body. An empty body means no overrides.
    pub fn from_json_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| Error::invalid_policy(e.to_string()))
    }

    /// Whether no field is overridden.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One described policy field.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyField {
    pub name: &'static str,
    pub value: u64,
    pub description: &'static str,
}

impl PolicyField {
    fn new(name: &'static str, value: impl Into<u64>, description: &'static str) -> Self {
        Self {
            name,
            value: value.into(),
            description,
        }
    }
}
