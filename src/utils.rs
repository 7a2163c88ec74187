//! Utility functions shared across the pipeline

pub mod datetime;
