//! Schema creation from mapping rules.
//!
//! # Responsibility
//! - Render `CREATE TABLE IF NOT EXISTS` DDL for each mapped table.
//! - Apply the DDL for a whole model atomically.
//!
//! # Invariants
//! - Max-length and required rules are enforced by CHECK / NOT NULL
//!   constraints, so violations surface from the store at commit time.
//! - Existing tables are left untouched.

use super::{quote_ident, DbResult};
use crate::mapping::{ColumnMap, ColumnType, Model, OnDelete, TableMap};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Creates every table of `model` that does not exist yet, in one transaction.
///
/// # Side effects
/// - Emits `schema_ensure` logging events with table count and duration.
pub fn ensure_schema(conn: &mut Connection, model: &Model) -> DbResult<()> {
    let started_at = Instant::now();
    match create_tables(conn, model) {
        Ok(tables) => {
            info!(
                "event=schema_ensure module=db status=ok tables={tables} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=schema_ensure module=db status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn create_tables(conn: &mut Connection, model: &Model) -> DbResult<usize> {
    let tx = conn.transaction()?;
    let mut tables = 0;
    for table in model.tables() {
        tx.execute_batch(&create_table_sql(table))?;
        tables += 1;
    }
    tx.commit()?;
    Ok(tables)
}

/// Renders the DDL statement for one mapped table.
pub fn create_table_sql(table: &TableMap) -> String {
    let columns = table
        .columns()
        .iter()
        .map(column_definition)
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {columns}\n);",
        quote_ident(table.name())
    )
}

fn column_definition(column: &ColumnMap) -> String {
    let name = quote_ident(column.name);
    let mut definition = format!("{name} {}", declared_type(column));

    if column.required {
        definition.push_str(" NOT NULL");
    } else {
        definition.push_str(" NULL");
    }
    if column.primary_key {
        definition.push_str(" PRIMARY KEY");
    }
    if column.required && column.is_text() {
        definition.push_str(&format!(" CHECK ({name} <> '')"));
    }
    if let Some(max_length) = column.max_length {
        definition.push_str(&format!(" CHECK (length({name}) <= {max_length})"));
    }
    if let Some(foreign_key) = &column.references {
        definition.push_str(&format!(
            " REFERENCES {}({})",
            quote_ident(foreign_key.table),
            quote_ident(foreign_key.column)
        ));
        match foreign_key.on_delete {
            OnDelete::NoAction => {}
            OnDelete::Cascade => definition.push_str(" ON DELETE CASCADE"),
            OnDelete::SetNull => definition.push_str(" ON DELETE SET NULL"),
        }
    }

    definition
}

fn declared_type(column: &ColumnMap) -> String {
    match (column.column_type, column.max_length) {
        (ColumnType::Integer, _) => "INTEGER".to_string(),
        (ColumnType::Real, _) => "REAL".to_string(),
        (ColumnType::Blob, _) => "BLOB".to_string(),
        (ColumnType::Text, Some(max_length)) => format!("NVARCHAR({max_length})"),
        (ColumnType::Text, None) => "TEXT".to_string(),
        (ColumnType::Varchar, Some(max_length)) => format!("VARCHAR({max_length})"),
        (ColumnType::Varchar, None) => "VARCHAR".to_string(),
    }
}
