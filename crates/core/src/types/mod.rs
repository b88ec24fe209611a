//! Core type definitions for the retention engine.
//!
//! Broken down into submodules: the backup records themselves, the policy
//! that governs them, and the results a run produces.

pub mod backup;
pub mod policy;
pub mod result;

pub use backup::*;
pub use policy::*;
pub use result::*;
