//! Table schemas for the relational store
//!
//! A [`TableSchema`] is the contract between the transform step and the
//! load-strategy engine: ordered columns with a semantic type, plus the
//! primary-key column set. [`registry`] declares the schema of every
//! pipeline entity.

use std::collections::HashSet;
use std::fmt;

use crate::errors::{EtlError, EtlResult};
use crate::models::{Record, Value};

pub mod registry;

pub use registry::SchemaRegistry;

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Date,
}

impl ColumnType {
    /// SQLite declared type; dates are stored as ISO-8601 text
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::String => "TEXT",
            ColumnType::Date => "TEXT",
        }
    }

    /// Whether `value` may be stored in a column of this type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Float, Value::Float(_) | Value::Integer(_))
                | (ColumnType::String, Value::Text(_))
                | (ColumnType::Date, Value::Date(_))
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Date => "date",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl TableSchema {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn column<S: Into<String>>(mut self, name: S, column_type: ColumnType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            column_type,
        });
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check the schema itself is well formed: unique column names and a
    /// primary key drawn from the declared columns.
    pub fn validate(&self) -> EtlResult<()> {
        if self.columns.is_empty() {
            return Err(EtlError::schema_mismatch(&self.name, "schema declares no columns"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(EtlError::schema_mismatch(
                    &self.name,
                    format!("column '{}' declared twice", column.name),
                ));
            }
        }

        for key in &self.primary_key {
            if !seen.contains(key.as_str()) {
                return Err(EtlError::schema_mismatch(
                    &self.name,
                    format!("primary key column '{key}' is not a declared column"),
                ));
            }
        }

        Ok(())
    }

    /// Check a record against this schema.
    ///
    /// The record must carry exactly the schema's columns, every value must
    /// fit its column type and primary-key values must not be null.
    pub fn validate_record(&self, record: &Record, position: usize) -> EtlResult<()> {
        if let Some(extra) = record.columns().find(|c| self.find_column(c).is_none()) {
            return Err(EtlError::schema_mismatch(
                &self.name,
                format!("record {position} has unknown column '{extra}'"),
            ));
        }

        for column in &self.columns {
            let value = record.get(&column.name).ok_or_else(|| {
                EtlError::schema_mismatch(
                    &self.name,
                    format!("record {position} is missing column '{}'", column.name),
                )
            })?;

            if !column.column_type.accepts(value) {
                return Err(EtlError::schema_mismatch(
                    &self.name,
                    format!(
                        "record {position} column '{}' expects {}, got {}",
                        column.name,
                        column.column_type,
                        value.kind_name()
                    ),
                ));
            }

            if value.is_null() && self.is_key_column(&column.name) {
                return Err(EtlError::schema_mismatch(
                    &self.name,
                    format!("record {position} has null primary key '{}'", column.name),
                ));
            }
        }

        Ok(())
    }
}
