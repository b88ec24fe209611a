#![deny(unused)]
//! Backup retention policy engine.
//!
//! A run is a linear pipeline over a storage listing:
//! classify (tier by age) → select (per-tier dedup) → enforce caps
//! (oldest first) → delete the rest → report. Everything between the
//! listing and the deletions is pure and takes the current time as input.

pub mod caps;
pub mod classifier;
pub mod engine;
pub mod executor;
pub mod report;
pub mod scheduler;
pub mod selector;

pub use caps::enforce_caps;
pub use classifier::{classify, tier_for_age, ClassifiedBackup};
pub use engine::{build_plan, RetentionEngine, DEFAULT_DELETE_CONCURRENCY};
pub use executor::{execute_deletions, DeletionOutcome};
pub use report::{format_bytes, render, render_plan};
pub use scheduler::{deadline_token, RunScheduler};
pub use selector::{newest_first, select, Selection};
