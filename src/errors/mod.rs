//! Centralized error handling for the ETL pipeline
//!
//! # Error Categories
//!
//! - **Source Errors**: remote API unreachable or non-success response
//! - **Schema Errors**: batch/table column or type disagreement
//! - **Constraint Errors**: primary-key collisions on insert
//! - **Store Errors**: connection and statement failures against SQLite
//! - **Configuration Errors**: missing keys, secrets or invalid values

pub mod types;

pub use types::*;

/// Convenience type alias for Results using EtlError
pub type EtlResult<T> = Result<T, EtlError>;
