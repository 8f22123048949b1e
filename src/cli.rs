use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::{FailurePolicy, PipelineConfig, Tier};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Build type dictionaries for ANEEL consumer-unit datasets and load them into SQLite",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sample each dataset and write its DDA dictionary file
    Dictionary(DictionaryArgs),
    /// Stream each dataset into its typed SQLite table using the dictionaries
    Load(LoadArgs),
    /// Print the declared type inferred for one or more field names
    Infer(InferArgs),
    /// Show a persisted dictionary as a table
    Inspect(InspectArgs),
    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

/// Settings shared by every subcommand that reads datasets. Flags override
/// values from `--config`, which override the built-in defaults.
#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory holding the source datasets
    #[arg(long = "input-dir")]
    pub input_dir: Option<PathBuf>,
    /// Directory holding the DDA dictionary files
    #[arg(long = "dictionary-dir")]
    pub dictionary_dir: Option<PathBuf>,
    /// SQLite database file
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Character encoding of sources and dictionaries (defaults to latin1)
    #[arg(long)]
    pub encoding: Option<String>,
    /// Field delimiter (supports ';', ',', 'tab', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Decimal separator used by numeric fields
    #[arg(long = "decimal")]
    pub decimal_separator: Option<char>,
    /// Rows sampled per dataset by the dictionary builder (0 reads everything)
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Rows per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Delete the database before loading
    #[arg(long, overrides_with = "no_recreate")]
    pub recreate: bool,
    /// Keep the existing database file
    #[arg(long = "no-recreate", overrides_with = "recreate")]
    pub no_recreate: bool,
    /// Field parsed as a date (repeatable; replaces the configured list)
    #[arg(long = "date-field", action = clap::ArgAction::Append)]
    pub date_fields: Vec<String>,
    /// Restrict the run to these tiers (repeatable or comma-separated)
    #[arg(long = "tier", value_delimiter = ',', value_parser = parse_tier)]
    pub tiers: Vec<Tier>,
    /// What the dictionary builder does when a dataset fails (continue, abort)
    #[arg(long = "builder-failure", value_parser = parse_policy)]
    pub builder_failure_policy: Option<FailurePolicy>,
    /// What the loader does when a dataset fails (continue, abort)
    #[arg(long = "loader-failure", value_parser = parse_policy)]
    pub loader_failure_policy: Option<FailurePolicy>,
}

impl PipelineArgs {
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.dictionary_dir {
            config.dictionary_dir = dir.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.clone();
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter as char;
        }
        if let Some(separator) = self.decimal_separator {
            config.decimal_separator = separator;
        }
        if let Some(rows) = self.sample_rows {
            config.sample_rows = rows;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if self.recreate {
            config.recreate = true;
        } else if self.no_recreate {
            config.recreate = false;
        }
        if !self.date_fields.is_empty() {
            config.date_fields = self.date_fields.clone();
        }
        if let Some(policy) = self.builder_failure_policy {
            config.builder_failure_policy = policy;
        }
        if let Some(policy) = self.loader_failure_policy {
            config.loader_failure_policy = policy;
        }
        config.retain_tiers(&self.tiers);
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct DictionaryArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// Log sample statistics and print each dictionary with a sample preview
    #[arg(long)]
    pub diagnostics: bool,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// Field names to classify
    #[arg(required = true)]
    pub fields: Vec<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// Write the YAML here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_tier(value: &str) -> Result<Tier, String> {
    value.parse::<Tier>().map_err(|err| err.to_string())
}

fn parse_policy(value: &str) -> Result<FailurePolicy, String> {
    value
        .parse::<FailurePolicy>()
        .map_err(|err| err.to_string())
}
