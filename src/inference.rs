//! Name-based type inference for consumer-unit fields.
//!
//! A field's declared type depends only on its name, never on the values found
//! in a file: the regulator's naming convention encodes it in the prefix.

use std::{fmt, str::FromStr};

use anyhow::anyhow;

const INTEGER_PREFIXES: &[&str] = &["fic_"];
const REAL_PREFIXES: &[&str] = &["dic_", "dem_", "ene_"];
const REAL_EXACT: &[&str] = &["point_x", "point_y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Integer,
    Real,
    Text,
}

impl DeclaredType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::Integer => "INTEGER",
            DeclaredType::Real => "REAL",
            DeclaredType::Text => "TEXT",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DeclaredType::Integer | DeclaredType::Real)
    }

    /// Column type used when the destination table is created.
    pub fn sql_type(&self) -> &'static str {
        self.as_str()
    }

    pub fn variants() -> &'static [&'static str] {
        &["INTEGER", "REAL", "TEXT"]
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeclaredType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INTEGER" => Ok(DeclaredType::Integer),
            "REAL" => Ok(DeclaredType::Real),
            "TEXT" => Ok(DeclaredType::Text),
            _ => Err(anyhow!(
                "Unknown declared type '{value}'. Supported types: {}",
                DeclaredType::variants().join(", ")
            )),
        }
    }
}

/// Declared type for `field_name`. Total and case-insensitive; TEXT is the fallback.
pub fn infer(field_name: &str) -> DeclaredType {
    let lowered = field_name.to_ascii_lowercase();
    if INTEGER_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return DeclaredType::Integer;
    }
    if REAL_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix))
        || REAL_EXACT.contains(&lowered.as_str())
    {
        return DeclaredType::Real;
    }
    DeclaredType::Text
}
