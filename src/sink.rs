//! Typed-table destinations.
//!
//! The loader only needs two operations from a store: create-or-replace a table
//! with explicit column types, and append rows to it. [`TableSink`] captures
//! that; [`SqliteSink`] implements it over a single SQLite database file.

use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use rusqlite::{
    Connection, params_from_iter,
    types::{ToSql, ToSqlOutput},
};

use crate::{
    coerce::{ColumnDef, TypedChunk},
    data::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop any existing table, create it from the layout, then insert.
    Replace,
    /// Insert into the table created by an earlier `Replace`.
    Append,
}

pub trait TableSink {
    /// Writes `chunk` to `table` and returns the number of rows written.
    fn write_chunk(
        &mut self,
        table: &str,
        layout: &[ColumnDef],
        chunk: &TypedChunk,
        mode: WriteMode,
    ) -> Result<usize>;
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("Opening SQLite database {path:?}"))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Opening in-memory SQLite database")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_sql(table: &str, layout: &[ColumnDef]) -> String {
    let columns = layout
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                quote_identifier(&column.name),
                column.declared_type.sql_type()
            )
        })
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote_identifier(table))
}

pub fn insert_sql(table: &str, layout: &[ColumnDef]) -> String {
    let columns = layout
        .iter()
        .map(|column| quote_identifier(&column.name))
        .join(", ");
    let placeholders = (1..=layout.len()).map(|idx| format!("?{idx}")).join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

impl TableSink for SqliteSink {
    fn write_chunk(
        &mut self,
        table: &str,
        layout: &[ColumnDef],
        chunk: &TypedChunk,
        mode: WriteMode,
    ) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .with_context(|| format!("Starting transaction for {table}"))?;
        if mode == WriteMode::Replace {
            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {};\n{};",
                quote_identifier(table),
                create_table_sql(table, layout)
            ))
            .with_context(|| format!("Creating table {table}"))?;
            debug!("Created table {table} with {} column(s)", layout.len());
        }
        {
            let mut stmt = tx
                .prepare_cached(&insert_sql(table, layout))
                .with_context(|| format!("Preparing insert into {table}"))?;
            for row in chunk.rows() {
                stmt.execute(params_from_iter(row.iter()))
                    .with_context(|| format!("Inserting row into {table}"))?;
            }
        }
        tx.commit()
            .with_context(|| format!("Committing chunk into {table}"))?;
        Ok(chunk.len())
    }
}
