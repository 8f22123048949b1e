//! Environment checks run before either stage touches any data.
//!
//! Every violation is collected first and reported together, so a user fixing
//! a broken setup sees the whole list in one run.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{error, info};
use thiserror::Error;

use crate::config::{PipelineConfig, Tier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingItem {
    InputDir(PathBuf),
    DictionaryDir(PathBuf),
    SourceFile { tier: Tier, path: PathBuf },
    DictionaryFile { tier: Tier, path: PathBuf },
}

impl fmt::Display for MissingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingItem::InputDir(path) => write!(f, "Input directory not found: {path:?}"),
            MissingItem::DictionaryDir(path) => {
                write!(f, "Dictionary directory not found: {path:?}")
            }
            MissingItem::SourceFile { tier, path } => {
                write!(f, "Source file not found ({tier}): {path:?}")
            }
            MissingItem::DictionaryFile { tier, path } => {
                write!(f, "Dictionary file not found ({tier}): {path:?}")
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("{} required path(s) missing:\n  {}", .missing.len(), .missing.iter().join("\n  "))]
pub struct EnvironmentError {
    pub missing: Vec<MissingItem>,
}

/// Requirements of the dictionary builder: input and dictionary directories
/// plus every configured source file.
pub fn check_builder(config: &PipelineConfig) -> Result<(), EnvironmentError> {
    let mut missing = Vec::new();
    require_dir(&config.input_dir, MissingItem::InputDir, &mut missing);
    require_dir(&config.dictionary_dir, MissingItem::DictionaryDir, &mut missing);
    require_sources(config, &mut missing);
    finish(missing)
}

/// Requirements of the typed loader: the builder's requirements plus one
/// dictionary file per configured dataset.
pub fn check_loader(config: &PipelineConfig) -> Result<(), EnvironmentError> {
    let mut missing = Vec::new();
    require_dir(&config.input_dir, MissingItem::InputDir, &mut missing);
    require_dir(&config.dictionary_dir, MissingItem::DictionaryDir, &mut missing);
    require_sources(config, &mut missing);
    for dataset in &config.datasets {
        let path = config.dictionary_path(dataset.tier);
        if !path.is_file() {
            missing.push(MissingItem::DictionaryFile {
                tier: dataset.tier,
                path,
            });
        }
    }
    finish(missing)
}

fn require_dir(path: &Path, item: fn(PathBuf) -> MissingItem, missing: &mut Vec<MissingItem>) {
    if !path.is_dir() {
        missing.push(item(path.to_path_buf()));
    }
}

fn require_sources(config: &PipelineConfig, missing: &mut Vec<MissingItem>) {
    for dataset in &config.datasets {
        let path = config.source_path(dataset);
        if !path.is_file() {
            missing.push(MissingItem::SourceFile {
                tier: dataset.tier,
                path,
            });
        }
    }
}

fn finish(missing: Vec<MissingItem>) -> Result<(), EnvironmentError> {
    if missing.is_empty() {
        info!("Required directories and files found");
        return Ok(());
    }
    for item in &missing {
        error!("{item}");
    }
    Err(EnvironmentError { missing })
}
