//! Error type definitions for the ETL pipeline
//!
//! Every failure the pipeline can observe is expressed as an [`EtlError`].
//! Callers that need to branch on the failure class use [`EtlError::kind`]
//! rather than inspecting message text.

use std::fmt;

use thiserror::Error;

/// Coarse classification of an [`EtlError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceUnavailable,
    SchemaMismatch,
    ConstraintViolation,
    ConnectionError,
    ConfigurationError,
    TransformFailed,
    StoreError,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "SourceUnavailable",
            Self::SchemaMismatch => "SchemaMismatch",
            Self::ConstraintViolation => "ConstraintViolation",
            Self::ConnectionError => "ConnectionError",
            Self::ConfigurationError => "ConfigurationError",
            Self::TransformFailed => "TransformFailed",
            Self::StoreError => "StoreError",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level pipeline error type
#[derive(Error, Debug)]
pub enum EtlError {
    /// The remote record source was unreachable or answered with a non-success payload
    #[error("Source unavailable: {endpoint} - {message}")]
    SourceUnavailable { endpoint: String, message: String },

    /// Record columns or values do not fit the target table schema
    #[error("Schema mismatch on {table}: {message}")]
    SchemaMismatch { table: String, message: String },

    /// Primary-key collision on insert
    #[error("Constraint violation on {table}: {message}")]
    ConstraintViolation { table: String, message: String },

    /// Persistent store could not be reached
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Missing or invalid configuration key or environment variable
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A raw record could not be reshaped into a table row
    #[error("Transform failed for {entity}: {message}")]
    TransformFailed { entity: String, message: String },

    /// Any other store statement failure
    #[error("Store error: {message}")]
    Store { message: String },

    /// Unexpected failure, e.g. a panic captured while running a pipeline body
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::Connection { .. } => ErrorKind::ConnectionError,
            Self::Configuration { .. } => ErrorKind::ConfigurationError,
            Self::TransformFailed { .. } => ErrorKind::TransformFailed,
            Self::Store { .. } => ErrorKind::StoreError,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn source_unavailable<E: Into<String>, M: Into<String>>(endpoint: E, message: M) -> Self {
        Self::SourceUnavailable {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn schema_mismatch<T: Into<String>, M: Into<String>>(table: T, message: M) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn constraint_violation<T: Into<String>, M: Into<String>>(table: T, message: M) -> Self {
        Self::ConstraintViolation {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transform_failed<E: Into<String>, M: Into<String>>(entity: E, message: M) -> Self {
        Self::TransformFailed {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify a store error raised while working on `table`.
    ///
    /// Unique/primary-key violations become [`EtlError::ConstraintViolation`],
    /// transport-level failures become [`EtlError::Connection`] and everything
    /// else is reported as [`EtlError::Store`].
    pub fn from_store(table: &str, error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db)
                if db.is_unique_violation() || db.message().contains("UNIQUE constraint failed") =>
            {
                Self::constraint_violation(table, db.message())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => Self::connection(error.to_string()),
            _ => Self::store(format!("{table}: {error}")),
        }
    }
}

impl From<config::ConfigError> for EtlError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}
