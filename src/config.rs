//! Run configuration shared by the dictionary builder and the typed loader.
//!
//! Every tunable of a run lives in [`PipelineConfig`]. A YAML file can supply
//! it (`--config`), individual command-line flags override single fields, and
//! the resolved value is passed explicitly into each stage entry point.

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::io_utils;

pub const DEFAULT_SAMPLE_ROWS: usize = 10_000;
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_DATABASE_NAME: &str = "mercadoucpj.db";

/// Tokens read as missing values besides empty fields.
pub const DEFAULT_NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    At,
    Mt,
    Bt,
}

impl Tier {
    pub fn all() -> [Tier; 3] {
        [Tier::At, Tier::Mt, Tier::Bt]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::At => "at",
            Tier::Mt => "mt",
            Tier::Bt => "bt",
        }
    }

    pub fn table_name(&self) -> String {
        format!("uc_{}_pj", self.as_str())
    }

    pub fn dictionary_file_name(&self) -> String {
        format!("DDA_ANEEL_uc{}_pj.csv", self.as_str())
    }

    pub fn default_source_file(&self) -> &'static str {
        match self {
            Tier::At => "ucat_pj.csv",
            Tier::Mt => "ucmt_pj.csv",
            Tier::Bt => "ucbt_pj.zip",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "at" => Ok(Tier::At),
            "mt" => Ok(Tier::Mt),
            "bt" => Ok(Tier::Bt),
            other => Err(anyhow!("Unknown tier '{other}'. Supported tiers: at, mt, bt")),
        }
    }
}

/// What a stage does when one dataset fails after pre-flight succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and move on to the next dataset.
    Continue,
    /// Stop the run at the first failing dataset.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(anyhow!(
                "Unknown failure policy '{other}'. Supported policies: continue, abort"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub tier: Tier,
    /// Source file name, resolved against `input_dir`.
    pub file: String,
}

impl DatasetConfig {
    pub fn table_name(&self) -> String {
        self.tier.table_name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub dictionary_dir: PathBuf,
    pub database: PathBuf,
    pub encoding: String,
    pub delimiter: char,
    pub decimal_separator: char,
    /// Rows sampled per dataset by the dictionary builder (0 reads everything).
    pub sample_rows: usize,
    pub chunk_size: usize,
    pub recreate: bool,
    pub date_fields: Vec<String>,
    pub null_tokens: Vec<String>,
    /// Extension of the delimited entry looked up inside zip containers.
    pub inner_extension: String,
    pub datasets: Vec<DatasetConfig>,
    pub builder_failure_policy: FailurePolicy,
    pub loader_failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            dictionary_dir: PathBuf::from("."),
            database: PathBuf::from(DEFAULT_DATABASE_NAME),
            encoding: "latin1".to_string(),
            delimiter: ';',
            decimal_separator: ',',
            sample_rows: DEFAULT_SAMPLE_ROWS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            recreate: true,
            date_fields: vec!["DATA_BASE".to_string()],
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|t| t.to_string()).collect(),
            inner_extension: ".csv".to_string(),
            datasets: Tier::all()
                .into_iter()
                .map(|tier| DatasetConfig {
                    tier,
                    file: tier.default_source_file().to_string(),
                })
                .collect(),
            builder_failure_policy: FailurePolicy::Continue,
            loader_failure_policy: FailurePolicy::Abort,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config to YAML")
    }

    pub fn source_path(&self, dataset: &DatasetConfig) -> PathBuf {
        self.input_dir.join(&dataset.file)
    }

    pub fn dictionary_path(&self, tier: Tier) -> PathBuf {
        self.dictionary_dir.join(tier.dictionary_file_name())
    }

    /// Keeps only the datasets whose tier is listed; an empty selection keeps all.
    pub fn retain_tiers(&mut self, tiers: &[Tier]) {
        if tiers.is_empty() {
            return;
        }
        self.datasets.retain(|dataset| tiers.contains(&dataset.tier));
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.chunk_size > 0, "chunk_size must be greater than zero");
        ensure!(
            self.delimiter.is_ascii(),
            "Delimiter '{}' must be ASCII",
            self.delimiter
        );
        ensure!(
            self.delimiter != self.decimal_separator,
            "Delimiter and decimal separator cannot both be '{}'",
            self.delimiter
        );
        ensure!(
            !self.datasets.is_empty(),
            "No datasets configured for this run"
        );
        let mut tiers = self.datasets.iter().map(|d| d.tier).collect::<Vec<_>>();
        tiers.sort();
        let before = tiers.len();
        tiers.dedup();
        ensure!(
            tiers.len() == before,
            "Each tier may be configured only once"
        );
        io_utils::resolve_encoding(&self.encoding)?;
        Ok(())
    }

    pub fn csv_settings(&self) -> Result<CsvSettings> {
        ensure!(
            self.delimiter.is_ascii(),
            "Delimiter '{}' must be ASCII",
            self.delimiter
        );
        Ok(CsvSettings {
            encoding: io_utils::resolve_encoding(&self.encoding)?,
            delimiter: self.delimiter as u8,
            decimal_separator: self.decimal_separator,
            null_tokens: self.null_tokens.clone(),
        })
    }
}

/// Parsing conventions shared by source files and dictionary files.
#[derive(Debug, Clone)]
pub struct CsvSettings {
    pub encoding: &'static Encoding,
    pub delimiter: u8,
    pub decimal_separator: char,
    pub null_tokens: Vec<String>,
}

impl CsvSettings {
    /// Empty, whitespace-only, or a configured null token.
    pub fn is_missing(&self, value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty() || self.null_tokens.iter().any(|token| token == trimmed)
    }
}
