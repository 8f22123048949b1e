//! Access to dataset sources: plain delimited files or zip containers.
//!
//! A zip container must hold a delimited entry; the first entry whose name ends
//! with the configured extension (case-insensitive) is streamed. Both kinds are
//! exposed to callers as a plain `Read` inside a closure, so the decompressor
//! never outlives the archive it borrows from.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No entry ending in '{extension}' found inside {container:?}")]
    NoDelimitedEntry { container: PathBuf, extension: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Container,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zip") => SourceKind::Container,
            _ => SourceKind::Delimited,
        }
    }
}

/// Opens `path` and hands a reader over its delimited text to `consume`.
pub fn with_source_reader<T, F>(path: &Path, inner_extension: &str, consume: F) -> Result<T>
where
    F: FnOnce(&mut dyn Read) -> Result<T>,
{
    let file = File::open(path).with_context(|| format!("Opening source {path:?}"))?;
    match SourceKind::detect(path) {
        SourceKind::Delimited => {
            let mut reader = BufReader::new(file);
            consume(&mut reader)
        }
        SourceKind::Container => {
            let mut archive = zip::ZipArchive::new(BufReader::new(file))
                .with_context(|| format!("Opening zip container {path:?}"))?;
            let index = find_delimited_entry(&mut archive, inner_extension)?.ok_or_else(|| {
                SourceError::NoDelimitedEntry {
                    container: path.to_path_buf(),
                    extension: inner_extension.to_string(),
                }
            })?;
            let mut entry = archive
                .by_index(index)
                .with_context(|| format!("Reading entry {index} of {path:?}"))?;
            debug!("Streaming '{}' from {:?}", entry.name(), path);
            let mut reader = BufReader::new(&mut entry);
            consume(&mut reader)
        }
    }
}

fn find_delimited_entry<R>(
    archive: &mut zip::ZipArchive<R>,
    inner_extension: &str,
) -> Result<Option<usize>>
where
    R: Read + std::io::Seek,
{
    let wanted = inner_extension.to_ascii_lowercase();
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() {
            continue;
        }
        if entry.name().to_ascii_lowercase().ends_with(&wanted) {
            return Ok(Some(index));
        }
    }
    Ok(None)
}
