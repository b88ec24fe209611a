use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// =============================================================================
// Raw Listing Types
// =============================================================================

/// One object as reported by a storage catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// Last-modified time reported by the backend.
    pub last_modified: DateTime<Utc>,
}

impl ObjectEntry {
    /// Create a new listing entry.
    pub fn new(key: impl Into<String>, size_bytes: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            size_bytes,
            last_modified,
        }
    }
}

// =============================================================================
// Backup Records
// =============================================================================

/// A single backup archive.
///
/// Identity is the storage key alone: two values with the same key describe
/// the same object regardless of the other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Storage key.
    pub key: String,
    /// Display name (key without the listing prefix).
    pub file_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Creation time, taken from the object's last-modified time.
    pub created_at: DateTime<Utc>,
}

impl Backup {
    /// Build a backup record from a listing entry under `prefix`.
    pub fn from_entry(entry: ObjectEntry, prefix: &str) -> Self {
        let file_name = file_name_for(&entry.key, prefix);
        Self {
            key: entry.key,
            file_name,
            size_bytes: entry.size_bytes,
            created_at: entry.last_modified,
        }
    }
}

impl PartialEq for Backup {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Backup {}

impl Hash for Backup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Strip the listing prefix (and a following separator) from a key.
fn file_name_for(key: &str, prefix: &str) -> String {
    match key.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() => {
            let rest = rest.strip_prefix('/').unwrap_or(rest);
            if rest.is_empty() {
                key.to_string()
            } else {
                rest.to_string()
            }
        }
        _ => key.to_string(),
    }
}

// =============================================================================
// Tiers
// =============================================================================

/// Retention tier a backup falls into, based on its age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Recent backups, all kept.
    Daily,
    /// One backup per ISO week kept.
    Weekly,
    /// One backup per calendar month kept.
    Monthly,
    /// Beyond every window, nothing kept.
    Expired,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Daily => "daily",
            Tier::Weekly => "weekly",
            Tier::Monthly => "monthly",
            Tier::Expired => "expired",
        };
        f.write_str(name)
    }
}
