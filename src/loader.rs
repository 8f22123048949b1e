//! Typed loader: streams every dataset into its table, chunk by chunk.

use std::fs;

use anyhow::{Context, Result, bail};
use log::{debug, error, info};

use crate::{
    chunk::{ChunkReader, RecordChunk},
    coerce::{CoercionPlan, TypedChunk},
    config::{CsvSettings, DatasetConfig, FailurePolicy, PipelineConfig, Tier},
    dictionary::Dictionary,
    preflight,
    sink::{SqliteSink, TableSink, WriteMode},
    source,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub tier: Tier,
    pub table: String,
    pub batches: usize,
    pub rows: usize,
}

pub fn run(config: &PipelineConfig) -> Result<Vec<LoadReport>> {
    config.validate()?;
    preflight::check_loader(config)?;
    let settings = config.csv_settings()?;

    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating database directory {parent:?}"))?;
    }
    if config.recreate && config.database.exists() {
        fs::remove_file(&config.database)
            .with_context(|| format!("Removing existing database {:?}", config.database))?;
        info!("Removed existing database {:?}", config.database);
    }
    let mut sink = SqliteSink::open(&config.database)?;

    let mut reports = Vec::new();
    let mut failed = Vec::new();
    for dataset in &config.datasets {
        info!(
            "Loading '{}' from {:?} into {}",
            dataset.tier,
            config.source_path(dataset),
            dataset.table_name()
        );
        match load_dataset(config, dataset, &settings, &mut sink) {
            Ok(report) => {
                info!(
                    "{} completed, {} batch(es), {} row(s)",
                    report.tier, report.batches, report.rows
                );
                reports.push(report);
            }
            Err(err) => {
                let err = err.context(format!("Loading '{}'", dataset.tier));
                if config.loader_failure_policy == FailurePolicy::Abort {
                    return Err(err);
                }
                error!("{err:?}");
                failed.push(dataset.tier);
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} dataset(s) failed to load: {}",
            failed.len(),
            itertools::join(&failed, ", ")
        );
    }
    info!(
        "Loaded {} dataset(s) into {:?}",
        reports.len(),
        config.database
    );
    Ok(reports)
}

/// Loads one dataset through `sink`. The table is replaced by the first chunk
/// and appended to by the rest; a header-only source writes nothing.
pub fn load_dataset<S: TableSink>(
    config: &PipelineConfig,
    dataset: &DatasetConfig,
    settings: &CsvSettings,
    sink: &mut S,
) -> Result<LoadReport> {
    let dictionary = Dictionary::load(&config.dictionary_path(dataset.tier), settings)?;
    debug!(
        "Dictionary for '{}' declares {} field(s)",
        dataset.tier,
        dictionary.len()
    );
    let table = dataset.table_name();
    let path = config.source_path(dataset);

    source::with_source_reader(&path, &config.inner_extension, |reader| {
        let mut chunks = ChunkReader::new(
            reader,
            settings.delimiter,
            settings.encoding,
            config.chunk_size,
        )?;
        let plan = CoercionPlan::for_load(
            chunks.headers(),
            &dictionary,
            &config.date_fields,
            settings,
        )?;
        let mut chunk = RecordChunk::with_capacity(config.chunk_size);
        let mut typed = TypedChunk::default();
        let mut batches = 0usize;
        let mut rows = 0usize;

        while chunks.next_chunk(&mut chunk)? {
            plan.coerce_chunk(&chunk, &mut typed)
                .with_context(|| format!("Coercing chunk starting at line {}", chunk.first_line()))?;
            let mode = if batches == 0 {
                WriteMode::Replace
            } else {
                WriteMode::Append
            };
            rows += sink.write_chunk(&table, plan.layout(), &typed, mode)?;
            batches += 1;
            debug!("'{}' batch {batches}: {rows} row(s) so far", dataset.tier);
            typed.release();
            chunk.release();
        }

        Ok(LoadReport {
            tier: dataset.tier,
            table: table.clone(),
            batches,
            rows,
        })
    })
    .with_context(|| format!("Streaming {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{coerce::ColumnDef, dictionary::FieldEntry, inference};
    use tempfile::tempdir;

    /// Records every call instead of storing anything.
    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<(String, WriteMode, usize)>,
    }

    impl TableSink for RecordingSink {
        fn write_chunk(
            &mut self,
            table: &str,
            _layout: &[ColumnDef],
            chunk: &TypedChunk,
            mode: WriteMode,
        ) -> Result<usize> {
            self.calls.push((table.to_string(), mode, chunk.len()));
            Ok(chunk.len())
        }
    }

    fn setup(source: &str) -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("ucmt_pj.csv"), source).unwrap();
        let config = PipelineConfig {
            input_dir: dir.path().to_path_buf(),
            dictionary_dir: dir.path().to_path_buf(),
            database: dir.path().join("out.db"),
            encoding: "utf-8".to_string(),
            chunk_size: 2,
            datasets: vec![DatasetConfig {
                tier: Tier::Mt,
                file: "ucmt_pj.csv".to_string(),
            }],
            ..PipelineConfig::default()
        };
        let settings = config.csv_settings().unwrap();
        let entries = source
            .lines()
            .next()
            .unwrap_or_default()
            .split(';')
            .map(|name| FieldEntry {
                name: name.to_string(),
                sample_type: String::new(),
                declared_type: inference::infer(name),
            })
            .collect();
        Dictionary::new(entries)
            .unwrap()
            .save(&config.dictionary_path(Tier::Mt), &settings)
            .unwrap();
        (dir, config)
    }

    #[test]
    fn first_chunk_replaces_and_rest_append() {
        let (_dir, config) = setup("COD_ID;FIC_01\na;1\nb;2\nc;3\nd;4\ne;5\n");
        let settings = config.csv_settings().unwrap();
        let mut sink = RecordingSink::default();
        let report = load_dataset(&config, &config.datasets[0], &settings, &mut sink).unwrap();

        assert_eq!(
            report,
            LoadReport {
                tier: Tier::Mt,
                table: "uc_mt_pj".to_string(),
                batches: 3,
                rows: 5,
            }
        );
        let modes = sink.calls.iter().map(|c| c.1).collect::<Vec<_>>();
        assert_eq!(
            modes,
            vec![WriteMode::Replace, WriteMode::Append, WriteMode::Append]
        );
        assert!(sink.calls.iter().all(|c| c.0 == "uc_mt_pj"));
    }

    #[test]
    fn header_only_source_writes_nothing() {
        let (_dir, config) = setup("COD_ID;FIC_01\n");
        let settings = config.csv_settings().unwrap();
        let mut sink = RecordingSink::default();
        let report = load_dataset(&config, &config.datasets[0], &settings, &mut sink).unwrap();
        assert_eq!(report.batches, 0);
        assert_eq!(report.rows, 0);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn overlong_row_fails_the_dataset() {
        let (_dir, config) = setup("COD_ID;FIC_01\na;1\nb;2;3\n");
        let settings = config.csv_settings().unwrap();
        let mut sink = RecordingSink::default();
        let err = load_dataset(&config, &config.datasets[0], &settings, &mut sink).unwrap_err();
        assert!(format!("{err:#}").contains("Line 3 has 3 field(s)"));
    }

    #[test]
    fn run_loads_into_sqlite_and_recreates() {
        let (_dir, config) = setup("COD_ID;FIC_01;DEM_01\na;1;2,5\nb;x;\nc;3;1\n");
        let reports = run(&config).unwrap();
        assert_eq!(reports[0].rows, 3);
        let reports = run(&config).unwrap();
        assert_eq!(reports[0].rows, 3);

        let conn = rusqlite::Connection::open(&config.database).unwrap();
        let (count, total): (i64, i64) = conn
            .query_row("SELECT COUNT(*), SUM(FIC_01) FROM uc_mt_pj", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((count, total), (3, 4));
    }
}
