use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::mapping_file::SampleMapping;
use crate::discover::FilePair;
use crate::runtime::Error;

pub const CHECKPOINT_FILENAME: &str = ".checkpoint.json";

/// Outputs of one finished target as they were written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTarget {
    pub r1_output: PathBuf,
    pub r2_output: PathBuf,
    pub r1_reads: u64,
    pub r2_reads: u64,
    pub r1_checksum: String,
    pub r2_checksum: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: String,
    pub mapping: SampleMapping,
    pub file_pairs: BTreeMap<String, FilePair>,
    pub completed: BTreeMap<String, CompletedTarget>,
}

impl Checkpoint {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CHECKPOINT_FILENAME)
    }

    /// Read the checkpoint of an output directory, if there is one
    pub fn load(dir: &Path) -> Result<Option<Checkpoint>, Error> {
        let path = Checkpoint::path_in(dir);
        if !path.exists() {
            debug!("No checkpoint at {}", path.display());
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| Error::read_failed(&path, e))?;
        let checkpoint: Checkpoint = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::file_not_valid(&path, Some(e.to_string())))?;
        info!(
            "Loaded checkpoint from {} with {} completed targets",
            checkpoint.timestamp,
            checkpoint.completed.len()
        );
        Ok(Some(checkpoint))
    }

    /// Write to a temporary file, then rename over the previous checkpoint
    pub fn save(&self, dir: &Path) -> Result<PathBuf, Error> {
        let path = Checkpoint::path_in(dir);
        let path_tmp = dir.join(format!("{}.tmp", CHECKPOINT_FILENAME));

        let file = File::create(&path_tmp).map_err(|e| Error::output_not_creatable(&path_tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| Error::write_failed(&path_tmp, e.into()))?;
        writer
            .flush()
            .map_err(|e| Error::write_failed(&path_tmp, e))?;
        drop(writer);

        fs::rename(&path_tmp, &path).map_err(|e| Error::write_failed(&path, e))?;
        info!("Checkpoint saved to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileformat::MappingEntry;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Checkpoint::load(dir.path()).unwrap().is_none());

        let mut checkpoint = Checkpoint {
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            mapping: vec![MappingEntry {
                target: "pool".into(),
                sources: vec!["a".into()],
            }]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        checkpoint.completed.insert(
            "pool".into(),
            CompletedTarget {
                r1_output: "pool_S1_R1_001.fastq.gz".into(),
                r2_output: "pool_S1_R2_001.fastq.gz".into(),
                r1_reads: 3,
                r2_reads: 3,
                r1_checksum: "ab".into(),
                r2_checksum: "cd".into(),
            },
        );
        checkpoint.save(dir.path()).unwrap();
        checkpoint.save(dir.path()).unwrap();

        let loaded = Checkpoint::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.completed, checkpoint.completed);
        assert_eq!(loaded.mapping, checkpoint.mapping);
        assert!(!dir.path().join(".checkpoint.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CHECKPOINT_FILENAME), b"{ not json").unwrap();
        assert!(Checkpoint::load(dir.path()).is_err());
    }
}
