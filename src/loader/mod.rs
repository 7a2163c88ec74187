//! Load-strategy engine
//!
//! Reconciles an in-memory batch of [`Record`]s with a table in the
//! operational store under one of the [`LoadStrategy`] policies. Every call
//! runs inside a single transaction: the target table is created when
//! missing, the strategy is applied, and the transaction commits only if
//! every statement succeeded. Readers therefore never observe a partially
//! applied batch, and a failed call leaves the table as it was.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::database::Database;
use crate::errors::{EtlError, EtlResult};
use crate::models::{LoadStrategy, Record, Value};
use crate::schema::{ColumnType, TableSchema};

mod sql;

/// Outcome of one [`LoadEngine::load`] call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub table: String,
    pub strategy: LoadStrategy,
    pub rows_written: u64,
    /// Rows removed before writing; only overwrite removes rows
    pub rows_removed: u64,
}

#[derive(Clone)]
pub struct LoadEngine {
    pool: SqlitePool,
}

impl LoadEngine {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool(),
        }
    }

    pub async fn load(
        &self,
        batch: &[Record],
        schema: &TableSchema,
        strategy: LoadStrategy,
    ) -> EtlResult<LoadSummary> {
        let table = schema.name();
        Self::check_batch(batch, schema, strategy)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EtlError::from_store(table, e))?;

        Self::ensure_table(&mut tx, schema).await?;

        let (rows_written, rows_removed) = match strategy {
            LoadStrategy::Insert => {
                let written = Self::write_rows(&mut tx, schema, &sql::insert(schema), batch).await?;
                (written, 0)
            }
            LoadStrategy::Upsert => {
                let written = Self::write_rows(&mut tx, schema, &sql::upsert(schema), batch).await?;
                (written, 0)
            }
            LoadStrategy::Overwrite => {
                let removed = sqlx::query(&sql::delete_all(schema))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| EtlError::from_store(table, e))?
                    .rows_affected();
                let written = Self::write_rows(&mut tx, schema, &sql::insert(schema), batch).await?;
                (written, removed)
            }
        };

        tx.commit()
            .await
            .map_err(|e| EtlError::from_store(table, e))?;

        info!(
            "Loaded {} rows into {} using {} ({} rows removed)",
            rows_written, table, strategy, rows_removed
        );

        Ok(LoadSummary {
            table: table.to_string(),
            strategy,
            rows_written,
            rows_removed,
        })
    }

    /// Current table contents, ordered by primary key (insertion order when
    /// the table has none). A table that doesn't exist yet reads as empty.
    pub async fn fetch_all(&self, schema: &TableSchema) -> EtlResult<Vec<Record>> {
        let table = schema.name();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| EtlError::from_store(table, e))?;

        if Self::existing_columns(&mut conn, table).await?.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&sql::select_all(schema))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| EtlError::from_store(table, e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = Record::new();
            for (idx, column) in schema.columns().iter().enumerate() {
                let value = match column.column_type {
                    ColumnType::Integer => Value::from(
                        row.try_get::<Option<i64>, _>(idx)
                            .map_err(|e| EtlError::from_store(table, e))?,
                    ),
                    ColumnType::Float => Value::from(
                        row.try_get::<Option<f64>, _>(idx)
                            .map_err(|e| EtlError::from_store(table, e))?,
                    ),
                    ColumnType::String => Value::from(
                        row.try_get::<Option<String>, _>(idx)
                            .map_err(|e| EtlError::from_store(table, e))?,
                    ),
                    ColumnType::Date => {
                        let raw = row
                            .try_get::<Option<String>, _>(idx)
                            .map_err(|e| EtlError::from_store(table, e))?;
                        match raw {
                            Some(s) => Value::Date(
                                NaiveDate::parse_from_str(&s, sql::DATE_FORMAT).map_err(|e| {
                                    EtlError::store(format!(
                                        "{table}.{} holds invalid date '{s}': {e}",
                                        column.name
                                    ))
                                })?,
                            ),
                            None => Value::Null,
                        }
                    }
                };
                record.insert(column.name.clone(), value);
            }
            records.push(record);
        }

        Ok(records)
    }

    pub async fn count(&self, schema: &TableSchema) -> EtlResult<usize> {
        Ok(self.fetch_all(schema).await?.len())
    }

    fn check_batch(batch: &[Record], schema: &TableSchema, strategy: LoadStrategy) -> EtlResult<()> {
        schema.validate()?;

        if strategy == LoadStrategy::Upsert && !schema.has_primary_key() {
            return Err(EtlError::schema_mismatch(
                schema.name(),
                "upsert requires a primary key",
            ));
        }

        for (position, record) in batch.iter().enumerate() {
            schema.validate_record(record, position)?;
        }
        Ok(())
    }

    async fn existing_columns(
        conn: &mut SqliteConnection,
        table: &str,
    ) -> EtlResult<BTreeSet<String>> {
        let columns = sqlx::query_scalar::<_, String>(sql::table_columns())
            .bind(table)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| EtlError::from_store(table, e))?;
        Ok(columns.into_iter().collect())
    }

    /// Create the table from `schema` unless it exists; an existing table
    /// must carry exactly the schema's columns.
    async fn ensure_table(conn: &mut SqliteConnection, schema: &TableSchema) -> EtlResult<()> {
        let table = schema.name();
        let existing = Self::existing_columns(conn, table).await?;

        if existing.is_empty() {
            sqlx::query(&sql::create_table(schema))
                .execute(&mut *conn)
                .await
                .map_err(|e| EtlError::from_store(table, e))?;
            debug!("Created table {}", table);
            return Ok(());
        }

        let declared: BTreeSet<String> = schema.column_names().map(str::to_string).collect();
        if existing != declared {
            let missing: Vec<_> = declared.difference(&existing).cloned().collect();
            let unexpected: Vec<_> = existing.difference(&declared).cloned().collect();
            return Err(EtlError::schema_mismatch(
                table,
                format!(
                    "existing table differs from schema (missing: {missing:?}, unexpected: {unexpected:?})"
                ),
            ));
        }

        Ok(())
    }

    async fn write_rows(
        conn: &mut SqliteConnection,
        schema: &TableSchema,
        statement: &str,
        batch: &[Record],
    ) -> EtlResult<u64> {
        let mut written = 0;
        for record in batch {
            let mut query = sqlx::query(statement);
            for column in schema.columns() {
                let value = record.get(&column.name).unwrap_or(&Value::Null);
                query = sql::bind_value(query, column, value);
            }
            written += query
                .execute(&mut *conn)
                .await
                .map_err(|e| EtlError::from_store(schema.name(), e))?
                .rows_affected();
        }
        Ok(written)
    }
}
