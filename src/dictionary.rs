//! Persisted field dictionaries (DDA files).
//!
//! One file per dataset, delimited with the same delimiter and encoding as the
//! source extracts:
//!
//! ```text
//! campo;pandas_dtype;tipo_aneel
//! FIC_01;int64;INTEGER
//! NOM_CLIENTE;object;TEXT
//! ```
//!
//! `campo` is the case-preserved field name, `pandas_dtype` the advisory type
//! observed in the sample, and `tipo_aneel` the declared type that the loader
//! applies. The file is the only thing the two stages share.

use std::{collections::HashSet, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};

use crate::{config::CsvSettings, inference::DeclaredType, io_utils};

pub const FIELD_COLUMN: &str = "campo";
pub const SAMPLE_TYPE_COLUMN: &str = "pandas_dtype";
pub const DECLARED_TYPE_COLUMN: &str = "tipo_aneel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub name: String,
    pub sample_type: String,
    pub declared_type: DeclaredType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    pub entries: Vec<FieldEntry>,
}

impl Dictionary {
    pub fn new(entries: Vec<FieldEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (idx, entry) in entries.iter().enumerate() {
            if entry.name.trim().is_empty() {
                bail!("Field {} has an empty name", idx + 1);
            }
            if !seen.insert(entry.name.as_str()) {
                bail!("Duplicate field '{}' in dictionary", entry.name);
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn declared_type(&self, name: &str) -> Option<DeclaredType> {
        self.entry(name).map(|entry| entry.declared_type)
    }

    pub fn save(&self, path: &Path, settings: &CsvSettings) -> Result<()> {
        let header = [FIELD_COLUMN, SAMPLE_TYPE_COLUMN, DECLARED_TYPE_COLUMN];
        let rows = std::iter::once(header).chain(self.entries.iter().map(|entry| {
            [
                entry.name.as_str(),
                entry.sample_type.as_str(),
                entry.declared_type.as_str(),
            ]
        }));
        io_utils::write_encoded_csv(path, rows, settings.delimiter, settings.encoding)
            .with_context(|| format!("Writing dictionary {path:?}"))
    }

    pub fn load(path: &Path, settings: &CsvSettings) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening dictionary {path:?}"))?;
        let mut reader = io_utils::open_csv_reader(BufReader::new(file), settings.delimiter);
        let headers = io_utils::reader_headers(&mut reader, settings.encoding)?;
        let position = |column: &str| {
            headers
                .iter()
                .position(|header| header.trim() == column)
                .ok_or_else(|| anyhow!("Dictionary {path:?} has no '{column}' column"))
        };
        let name_idx = position(FIELD_COLUMN)?;
        let declared_idx = position(DECLARED_TYPE_COLUMN)?;
        let sample_idx = headers
            .iter()
            .position(|header| header.trim() == SAMPLE_TYPE_COLUMN);

        let mut entries = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let line = row_idx + 2;
            let record = record.with_context(|| format!("Reading line {line} of {path:?}"))?;
            let decoded = io_utils::decode_record(&record, settings.encoding)?;
            let name = decoded
                .get(name_idx)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| anyhow!("Line {line} of {path:?} has no field name"))?
                .clone();
            let declared_raw = decoded.get(declared_idx).map(String::as_str).unwrap_or("");
            let declared_type = declared_raw
                .parse::<DeclaredType>()
                .with_context(|| format!("Line {line} of {path:?} (field '{name}')"))?;
            let sample_type = sample_idx
                .and_then(|idx| decoded.get(idx))
                .cloned()
                .unwrap_or_default();
            entries.push(FieldEntry {
                name,
                sample_type,
                declared_type,
            });
        }
        Dictionary::new(entries).with_context(|| format!("Validating dictionary {path:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use std::fs;
    use tempfile::tempdir;

    fn entry(name: &str, sample: &str, declared: DeclaredType) -> FieldEntry {
        FieldEntry {
            name: name.to_string(),
            sample_type: sample.to_string(),
            declared_type: declared,
        }
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("DDA_ANEEL_ucat_pj.csv");
        let settings = PipelineConfig::default().csv_settings().unwrap();
        let dictionary = Dictionary::new(vec![
            entry("FIC_01", "int64", DeclaredType::Integer),
            entry("POINT_X", "float64", DeclaredType::Real),
            entry("MUNICÍPIO", "object", DeclaredType::Text),
        ])
        .unwrap();

        dictionary.save(&path, &settings).expect("save");
        let bytes = fs::read(&path).expect("read");
        assert!(bytes.starts_with(b"campo;pandas_dtype;tipo_aneel\n"));

        let loaded = Dictionary::load(&path, &settings).expect("load");
        assert_eq!(loaded, dictionary);
        assert_eq!(loaded.declared_type("POINT_X"), Some(DeclaredType::Real));
        assert_eq!(loaded.declared_type("point_x"), None);
    }

    #[test]
    fn load_accepts_hand_edited_type_tokens() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("dda.csv");
        fs::write(&path, "tipo_aneel;campo\n real ;DEM_01\ntext;COD_ID\n").unwrap();
        let settings = PipelineConfig::default().csv_settings().unwrap();

        let loaded = Dictionary::load(&path, &settings).expect("load");
        assert_eq!(loaded.declared_type("DEM_01"), Some(DeclaredType::Real));
        assert_eq!(loaded.declared_type("COD_ID"), Some(DeclaredType::Text));
        assert_eq!(loaded.entries[0].sample_type, "");
    }

    #[test]
    fn blank_field_names_are_rejected() {
        let err = Dictionary::new(vec![
            entry("COD_ID", "object", DeclaredType::Text),
            entry(" ", "object", DeclaredType::Text),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Field 2 has an empty name"));
    }

    #[test]
    fn load_rejects_unknown_types_and_duplicates() {
        let dir = tempdir().expect("temp dir");
        let settings = PipelineConfig::default().csv_settings().unwrap();

        let bad_type = dir.path().join("bad_type.csv");
        fs::write(&bad_type, "campo;pandas_dtype;tipo_aneel\nA;object;DATE\n").unwrap();
        let err = Dictionary::load(&bad_type, &settings).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown declared type"));

        let duplicate = dir.path().join("duplicate.csv");
        fs::write(
            &duplicate,
            "campo;pandas_dtype;tipo_aneel\nA;object;TEXT\nA;object;TEXT\n",
        )
        .unwrap();
        let err = Dictionary::load(&duplicate, &settings).unwrap_err();
        assert!(format!("{err:#}").contains("Duplicate field 'A'"));

        let missing_column = dir.path().join("missing.csv");
        fs::write(&missing_column, "campo;pandas_dtype\nA;object\n").unwrap();
        assert!(Dictionary::load(&missing_column, &settings).is_err());
    }
}
