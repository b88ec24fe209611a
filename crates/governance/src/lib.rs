#![deny(unused)]
//! Governance for the backup retention service.
//!
//! This crate provides:
//! - Distributed tracing and log formatting
//! - Prometheus metrics for retention runs and HTTP requests
//! - RBAC connectors guarding the admin surface

pub mod metrics;
pub mod rbac;
pub mod tracing_layer;

pub use metrics::{setup_metrics_recorder, track_request, track_retention_run};
pub use rbac::{NoOpRbacConnector, RbacConnector, StaticTokenRbacConnector, UserRoles};
pub use tracing_layer::{configure_tracing, DEFAULT_LOG_FILTER};
