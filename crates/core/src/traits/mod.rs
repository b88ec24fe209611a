//! Core traits for the retention engine.
//!
//! - `catalog`: the storage catalog adapter consumed by the engine

pub mod catalog;

pub use catalog::*;
