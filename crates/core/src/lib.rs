#![deny(unused)]
//! Core types, traits, and error definitions for the backup retention engine.
//!
//! This crate provides the building blocks shared by the storage adapters,
//! the policy engine and the admin surface.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
