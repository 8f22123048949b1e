//! Column coercion rules applied to every chunk.
//!
//! Null policy differs by rule and must not be unified:
//!
//! | rule    | unparseable / missing |
//! |---------|-----------------------|
//! | numeric | `0`                   |
//! | date    | null                  |
//! | text    | null (missing only)   |

use anyhow::{Result, bail};
use log::warn;

use crate::{
    chunk::RecordChunk,
    config::CsvSettings,
    data::{Value, canonical_datetime, narrow_to_integer, parse_number, parse_whole_number},
    dictionary::Dictionary,
    inference::{self, DeclaredType},
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    Numeric(DeclaredType),
    Date,
    Text,
}

/// Destination column: name plus backend type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: DeclaredType,
}

/// Rows coerced from one [`RecordChunk`]; reused across chunks.
#[derive(Debug, Default)]
pub struct TypedChunk {
    rows: Vec<Vec<Option<Value>>>,
}

impl TypedChunk {
    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn release(&mut self) {
        self.rows.clear();
    }
}

#[derive(Debug, Clone)]
pub struct CoercionPlan {
    rules: Vec<ColumnRule>,
    layout: Vec<ColumnDef>,
    settings: CsvSettings,
}

impl CoercionPlan {
    /// Rules for the sample pass: declared types come straight from the names
    /// and no date rewriting happens.
    pub fn for_sample(headers: &[String], settings: &CsvSettings) -> Self {
        let layout = headers
            .iter()
            .map(|name| ColumnDef {
                name: name.clone(),
                declared_type: inference::infer(name),
            })
            .collect::<Vec<_>>();
        let rules = layout
            .iter()
            .map(|column| match column.declared_type {
                DeclaredType::Text => ColumnRule::Text,
                numeric => ColumnRule::Numeric(numeric),
            })
            .collect();
        Self {
            rules,
            layout,
            settings: settings.clone(),
        }
    }

    /// Rules for the full load, driven by a persisted dictionary. Every
    /// dictionary field must be present in `headers`; source columns the
    /// dictionary does not know are kept as TEXT.
    pub fn for_load(
        headers: &[String],
        dictionary: &Dictionary,
        date_fields: &[String],
        settings: &CsvSettings,
    ) -> Result<Self> {
        let missing = dictionary
            .entries
            .iter()
            .filter(|entry| !headers.contains(&entry.name))
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            bail!(
                "Source header lacks dictionary field(s): {}",
                missing.join(", ")
            );
        }

        let mut rules = Vec::with_capacity(headers.len());
        let mut layout = Vec::with_capacity(headers.len());
        for name in headers {
            let declared_type = match dictionary.declared_type(name) {
                Some(declared) => declared,
                None => {
                    warn!("Column '{name}' is not in the dictionary; loading it as TEXT");
                    DeclaredType::Text
                }
            };
            let rule = if declared_type.is_numeric() {
                ColumnRule::Numeric(declared_type)
            } else if date_fields.iter().any(|field| field == name) {
                ColumnRule::Date
            } else {
                ColumnRule::Text
            };
            rules.push(rule);
            layout.push(ColumnDef {
                name: name.clone(),
                declared_type,
            });
        }
        Ok(Self {
            rules,
            layout,
            settings: settings.clone(),
        })
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    pub fn layout(&self) -> &[ColumnDef] {
        &self.layout
    }

    pub fn coerce_value(&self, column: usize, raw: Option<&str>) -> Option<Value> {
        let rule = self.rules.get(column).copied().unwrap_or(ColumnRule::Text);
        let present = raw.filter(|value| !self.settings.is_missing(value));
        match rule {
            ColumnRule::Numeric(declared) => Some(coerce_numeric(
                present,
                declared,
                self.settings.decimal_separator,
            )),
            ColumnRule::Date => present.and_then(canonical_datetime).map(Value::Text),
            ColumnRule::Text => present.map(|value| Value::Text(value.to_string())),
        }
    }

    /// Decodes and coerces every record of `chunk` into `out`, replacing its
    /// previous contents.
    pub fn coerce_chunk(&self, chunk: &RecordChunk, out: &mut TypedChunk) -> Result<()> {
        out.release();
        let width = self.rules.len();
        for record in chunk.records() {
            let mut row = Vec::with_capacity(width);
            for column in 0..width {
                let cell = match record.get(column) {
                    Some(bytes) => {
                        let decoded = io_utils::decode_bytes(bytes, self.settings.encoding)?;
                        self.coerce_value(column, Some(decoded.as_str()))
                    }
                    None => self.coerce_value(column, None),
                };
                row.push(cell);
            }
            out.rows.push(row);
        }
        Ok(())
    }
}

/// Numeric coercion shared by both stages: anything unparseable becomes zero.
pub fn coerce_numeric(raw: Option<&str>, declared: DeclaredType, decimal_separator: char) -> Value {
    match declared {
        DeclaredType::Integer => {
            let Some(raw) = raw else {
                return Value::Integer(0);
            };
            if let Some(whole) = parse_whole_number(raw) {
                return Value::Integer(whole);
            }
            match parse_number(raw, decimal_separator) {
                Some(number) => narrow_to_integer(number)
                    .map(Value::Integer)
                    .unwrap_or(Value::Real(number)),
                None => Value::Integer(0),
            }
        }
        _ => Value::Real(
            raw.and_then(|value| parse_number(value, decimal_separator))
                .unwrap_or(0.0),
        ),
    }
}
