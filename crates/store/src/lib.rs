#![deny(unused)]
//! Storage catalog adapters for the backup retention engine.
//!
//! Each adapter implements [`BackupCatalog`]: list every object under a
//! prefix, delete one object. Adapters are constructed explicitly at startup
//! and handed to the engine; nothing here is global.

pub mod s3;

pub use retention_core::traits::BackupCatalog;
pub use s3::S3BackupCatalog;
