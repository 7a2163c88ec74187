//! SQL statement builders for the load-strategy engine
//!
//! Identifiers come from [`TableSchema`] declarations and are always quoted;
//! values are always bound, never interpolated.

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use crate::models::Value;
use crate::schema::{Column, ColumnType, TableSchema};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(schema: &TableSchema) -> String {
    schema
        .column_names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_list(schema: &TableSchema) -> String {
    schema
        .primary_key_columns()
        .iter()
        .map(|k| quote_ident(k))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn create_table(schema: &TableSchema) -> String {
    let mut definitions: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| {
            let mut definition = format!("{} {}", quote_ident(&c.name), c.column_type.sql_type());
            if schema.is_key_column(&c.name) {
                definition.push_str(" NOT NULL");
            }
            definition
        })
        .collect();

    if schema.has_primary_key() {
        definitions.push(format!("PRIMARY KEY ({})", key_list(schema)));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(schema.name()),
        definitions.join(", ")
    )
}

pub(crate) fn insert(schema: &TableSchema) -> String {
    let placeholders = vec!["?"; schema.columns().len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(schema.name()),
        column_list(schema),
        placeholders
    )
}

/// `INSERT .. ON CONFLICT (pk) DO UPDATE` replacing every non-key column.
/// Callers guarantee the schema has a primary key.
pub(crate) fn upsert(schema: &TableSchema) -> String {
    let assignments: Vec<String> = schema
        .column_names()
        .filter(|c| !schema.is_key_column(c))
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect();

    let action = if assignments.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", assignments.join(", "))
    };

    format!(
        "{} ON CONFLICT ({}) {}",
        insert(schema),
        key_list(schema),
        action
    )
}

pub(crate) fn delete_all(schema: &TableSchema) -> String {
    format!("DELETE FROM {}", quote_ident(schema.name()))
}

pub(crate) fn select_all(schema: &TableSchema) -> String {
    let order = if schema.has_primary_key() {
        key_list(schema)
    } else {
        "rowid".to_string()
    };
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        column_list(schema),
        quote_ident(schema.name()),
        order
    )
}

pub(crate) fn table_columns() -> &'static str {
    "SELECT name FROM pragma_table_info(?1)"
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    column: &Column,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match (column.column_type, value) {
        (_, Value::Null) => query.bind(None::<String>),
        (ColumnType::Float, Value::Integer(v)) => query.bind(*v as f64),
        (_, Value::Integer(v)) => query.bind(*v),
        (_, Value::Float(v)) => query.bind(*v),
        (_, Value::Text(v)) => query.bind(v.clone()),
        (_, Value::Date(v)) => query.bind(v.format(DATE_FORMAT).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new("standings")
            .column("standings_table_id", ColumnType::String)
            .column("team_id", ColumnType::Integer)
            .column("win_total", ColumnType::Integer)
            .primary_key(["standings_table_id"])
    }

    #[test]
    fn test_create_table_declares_key() {
        assert_eq!(
            create_table(&schema()),
            "CREATE TABLE IF NOT EXISTS \"standings\" (\"standings_table_id\" TEXT NOT NULL, \
             \"team_id\" INTEGER, \"win_total\" INTEGER, PRIMARY KEY (\"standings_table_id\"))"
        );
    }

    #[test]
    fn test_upsert_updates_only_non_key_columns() {
        let sql = upsert(&schema());
        assert!(sql.ends_with(
            "ON CONFLICT (\"standings_table_id\") DO UPDATE SET \"team_id\" = excluded.\"team_id\", \
             \"win_total\" = excluded.\"win_total\""
        ));
        assert!(!sql.contains("\"standings_table_id\" = excluded"));
    }

    #[test]
    fn test_upsert_key_only_table_does_nothing_on_conflict() {
        let keys_only = TableSchema::new("seen")
            .column("id", ColumnType::Integer)
            .primary_key(["id"]);
        assert!(upsert(&keys_only).ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn test_select_orders_by_rowid_without_key() {
        let no_key = TableSchema::new("stats").column("points", ColumnType::Integer);
        assert_eq!(
            select_all(&no_key),
            "SELECT \"points\" FROM \"stats\" ORDER BY rowid"
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
