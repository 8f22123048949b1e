//! Dictionary builder: samples each dataset and writes its DDA file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::{
    chunk::{ChunkReader, RecordChunk},
    coerce::{ColumnRule, CoercionPlan},
    config::{CsvSettings, DatasetConfig, FailurePolicy, PipelineConfig, Tier},
    data::{Value, parse_number, parse_whole_number},
    dictionary::{Dictionary, FieldEntry},
    io_utils, preflight, report, source,
};

const PREVIEW_ROWS: usize = 5;
const NULL_DISPLAY: &str = "<NA>";

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Log sample statistics and print the dictionary and a sample preview.
    pub diagnostics: bool,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub written: Vec<(Tier, PathBuf)>,
    pub failed: Vec<Tier>,
}

/// Outcome of sampling one dataset.
#[derive(Debug)]
pub struct SampleReport {
    pub dictionary: Dictionary,
    pub rows_read: usize,
    /// First adjusted rows, formatted for display.
    pub preview: Vec<Vec<String>>,
}

/// Observations for one column across the sample.
#[derive(Debug, Clone, Default)]
struct SampleProfile {
    rows: usize,
    present: usize,
    whole: usize,
    numeric: usize,
}

impl SampleProfile {
    fn observe(&mut self, present: Option<&str>, decimal_separator: char) {
        self.rows += 1;
        let Some(value) = present else {
            return;
        };
        self.present += 1;
        if parse_whole_number(value).is_some() {
            self.whole += 1;
            self.numeric += 1;
        } else if parse_number(value, decimal_separator).is_some() {
            self.numeric += 1;
        }
    }

    fn runtime_type(&self, rule: ColumnRule) -> &'static str {
        if self.rows == 0 {
            return "object";
        }
        let all_whole = self.whole == self.rows;
        match rule {
            ColumnRule::Numeric(_) if all_whole => "int64",
            ColumnRule::Numeric(_) => "float64",
            _ if all_whole => "int64",
            _ if self.present > 0 && self.numeric == self.present => "float64",
            _ => "object",
        }
    }
}

pub fn run(config: &PipelineConfig, options: &BuildOptions) -> Result<BuildSummary> {
    config.validate()?;
    preflight::check_builder(config)?;
    let settings = config.csv_settings()?;

    let mut summary = BuildSummary::default();
    for dataset in &config.datasets {
        info!(
            "Building dictionary for '{}' from {:?}",
            dataset.tier,
            config.source_path(dataset)
        );
        match build_dataset(config, dataset, &settings, options) {
            Ok(path) => {
                info!("Dictionary for '{}' written to {:?}", dataset.tier, path);
                summary.written.push((dataset.tier, path));
            }
            Err(err) => {
                error!("Failed to build dictionary for '{}': {err:?}", dataset.tier);
                summary.failed.push(dataset.tier);
                if config.builder_failure_policy == FailurePolicy::Abort {
                    return Err(
                        err.context(format!("Building dictionary for '{}'", dataset.tier))
                    );
                }
            }
        }
    }

    info!(
        "{} dictionary file(s) written, {} dataset(s) failed",
        summary.written.len(),
        summary.failed.len()
    );
    if !summary.failed.is_empty() {
        warn!(
            "Datasets without a dictionary: {}",
            itertools::join(&summary.failed, ", ")
        );
    }
    Ok(summary)
}

fn build_dataset(
    config: &PipelineConfig,
    dataset: &DatasetConfig,
    settings: &CsvSettings,
    options: &BuildOptions,
) -> Result<PathBuf> {
    let source_path = config.source_path(dataset);
    let sample = sample_dataset(config, dataset, settings)
        .with_context(|| format!("Sampling {source_path:?}"))?;

    if options.diagnostics {
        info!("'{}': {} sample row(s) read", dataset.tier, sample.rows_read);
        info!(
            "'{}' columns: {}",
            dataset.tier,
            itertools::join(sample.dictionary.entries.iter().map(|e| &e.name), ", ")
        );
        report::print_dictionary(&sample.dictionary);
        let headers = sample
            .dictionary
            .entries
            .iter()
            .map(|entry| entry.name.clone())
            .collect::<Vec<_>>();
        report::print_table(&headers, &sample.preview);
    }

    let path = config.dictionary_path(dataset.tier);
    sample
        .dictionary
        .save(&path, settings)
        .with_context(|| format!("Writing dictionary {path:?}"))?;
    Ok(path)
}

/// Reads at most `sample_rows` rows of `dataset` (all rows when zero) and
/// derives its field entries.
pub fn sample_dataset(
    config: &PipelineConfig,
    dataset: &DatasetConfig,
    settings: &CsvSettings,
) -> Result<SampleReport> {
    let path = config.source_path(dataset);
    let cap = match config.sample_rows {
        0 => usize::MAX,
        rows => rows,
    };
    source::with_source_reader(&path, &config.inner_extension, |reader| {
        let mut chunks = ChunkReader::new(
            reader,
            settings.delimiter,
            settings.encoding,
            config.chunk_size,
        )?;
        let headers = chunks.headers().to_vec();
        let plan = CoercionPlan::for_sample(&headers, settings);
        let mut profiles = vec![SampleProfile::default(); headers.len()];
        let mut preview = Vec::new();
        let mut chunk = RecordChunk::with_capacity(config.chunk_size.min(cap));

        loop {
            let remaining = cap - chunks.rows_read();
            if remaining == 0 || !chunks.next_chunk_at_most(&mut chunk, remaining)? {
                break;
            }
            for (offset, record) in chunk.records().iter().enumerate() {
                let line = chunk.first_line() + offset;
                let mut display = Vec::new();
                for (column, profile) in profiles.iter_mut().enumerate() {
                    let raw = match record.get(column) {
                        Some(bytes) => Some(
                            io_utils::decode_bytes(bytes, settings.encoding)
                                .with_context(|| format!("Decoding line {line}"))?,
                        ),
                        None => None,
                    };
                    let present = raw.as_deref().filter(|value| !settings.is_missing(value));
                    profile.observe(present, settings.decimal_separator);
                    if preview.len() < PREVIEW_ROWS {
                        display.push(
                            plan.coerce_value(column, raw.as_deref())
                                .as_ref()
                                .map(Value::as_display)
                                .unwrap_or_else(|| NULL_DISPLAY.to_string()),
                        );
                    }
                }
                if preview.len() < PREVIEW_ROWS {
                    preview.push(display);
                }
            }
        }

        let entries = plan
            .layout()
            .iter()
            .zip(plan.rules())
            .zip(&profiles)
            .map(|((column, rule), profile)| FieldEntry {
                name: column.name.clone(),
                sample_type: profile.runtime_type(*rule).to_string(),
                declared_type: column.declared_type,
            })
            .collect();
        let dictionary = Dictionary::new(entries)?;
        Ok(SampleReport {
            dictionary,
            rows_read: chunks.rows_read(),
            preview,
        })
    })
}
