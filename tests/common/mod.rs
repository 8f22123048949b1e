#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use aneel_uc_loader::config::PipelineConfig;
use tempfile::{TempDir, tempdir};
use zip::write::SimpleFileOptions;

pub const AT_SOURCE: &str = "COD_ID;DATA_BASE;FIC_01;DIC_01;DEM_01;ENE_01;POINT_X;NOM_RAZAO\n\
1;31DEC2023:00:00:00.0000000;2;1,5;10,25;100;-47,9;SITUAÇÃO ATIVA\n\
2;bad-date;;;x;7;-48;NULL\n\
3;01JAN2024:12:30:45.5;4,0;2;3;;;Comércio\n";

pub const MT_SOURCE: &str = "COD_ID;FIC_01;DEM_01\nm1;1;2,5\nm2;2;3\n";

pub const BT_SOURCE: &str = "COD_ID;FIC_01;ENE_01\nb1;5;1,5\nb2;6;2,5\nb3;7;3,5\n";

/// Scratch directory laid out like a real run: `downloads/` for sources,
/// `dda/` for dictionaries and `db/` for the database.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let workspace = Self {
            temp_dir: tempdir().expect("temp dir"),
        };
        fs::create_dir_all(workspace.input_dir()).expect("create input dir");
        fs::create_dir_all(workspace.dictionary_dir()).expect("create dictionary dir");
        workspace
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.path().join("downloads")
    }

    pub fn dictionary_dir(&self) -> PathBuf {
        self.path().join("dda")
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("db").join("mercadoucpj.db")
    }

    /// Default configuration rooted in this workspace.
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            input_dir: self.input_dir(),
            dictionary_dir: self.dictionary_dir(),
            database: self.database(),
            ..PipelineConfig::default()
        }
    }

    /// Writes `contents` under the workspace root and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Writes `contents` encoded as latin1 into the input directory.
    pub fn write_source(&self, name: &str, contents: &str) -> PathBuf {
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(contents);
        self.write_bytes(&format!("downloads/{name}"), &encoded)
    }

    /// Writes a zip container into the input directory holding latin1 entries.
    pub fn write_source_zip(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = self.input_dir().join(name);
        let file = File::create(&path).expect("create zip");
        let mut writer = zip::ZipWriter::new(file);
        for (entry, contents) in entries {
            let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(contents);
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .expect("start zip entry");
            writer.write_all(&encoded).expect("write zip entry");
        }
        writer.finish().expect("finish zip");
        path
    }

    /// Writes the three default sources (AT, MT plain; BT zipped).
    pub fn write_default_sources(&self) {
        self.write_source("ucat_pj.csv", AT_SOURCE);
        self.write_source("ucmt_pj.csv", MT_SOURCE);
        self.write_source_zip("ucbt_pj.zip", &[("ucbt_pj.csv", BT_SOURCE)]);
    }

    pub fn dictionary_text(&self, tier: &str) -> String {
        let path = self.dictionary_dir().join(format!("DDA_ANEEL_uc{tier}_pj.csv"));
        let bytes = fs::read(&path).expect("read dictionary");
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
        decoded.into_owned()
    }

    fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}
