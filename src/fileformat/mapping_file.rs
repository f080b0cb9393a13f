use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::runtime::Error;

/// First-cell values that mark the first row as a header
pub const HEADER_TOKENS: [&str; 4] = ["target", "target_sample", "output", "sample"];

/// One target and the sources declared for it, in file order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub target: String,
    pub sources: Vec<String>,
}

/// Target -> sources table as given by the user. Targets keep their first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMapping {
    entries: Vec<MappingEntry>,
}

impl SampleMapping {
    /// Parse comma-separated rows: target first, then any number of sources.
    /// Rows repeating a target extend its source list
    pub fn from_reader<R: Read>(src: R) -> Result<SampleMapping, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(src);

        let mut entries: Vec<MappingEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (row_num, result) in reader.records().enumerate() {
            let row = result?;
            let target = match row.get(0) {
                Some(t) if !t.is_empty() => t.to_string(),
                _ => continue,
            };

            if row_num == 0 && HEADER_TOKENS.contains(&target.to_lowercase().as_str()) {
                info!("Detected header row in mapping file, skipping it");
                continue;
            }

            let sources: Vec<String> = row
                .iter()
                .skip(1)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            if sources.is_empty() {
                warn!(
                    "No source files for target '{}' on row {}",
                    target,
                    row_num + 1
                );
                continue;
            }

            match index.get(&target) {
                Some(&i) => entries[i].sources.extend(sources),
                None => {
                    index.insert(target.clone(), entries.len());
                    entries.push(MappingEntry { target, sources });
                }
            }
        }
        Ok(SampleMapping { entries })
    }

    /// Load the mapping file. A missing, unparsable or empty mapping is an error
    pub fn read_mapping_file(path: &Path) -> Result<SampleMapping, Error> {
        info!("Reading mapping file: {}", path.display());
        let file = File::open(path).map_err(|e| Error::mapping_unreadable(path, Some(e.to_string())))?;
        let mapping = SampleMapping::from_reader(BufReader::new(file))
            .map_err(|e| Error::mapping_unreadable(path, Some(e.to_string())))?;
        if mapping.is_empty() {
            return Err(Error::empty_mapping(path));
        }
        info!(
            "Loaded {} target samples with {} declared sources",
            mapping.len(),
            mapping.num_sources()
        );
        Ok(mapping)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn get(&self, target: &str) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.target == target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_sources(&self) -> usize {
        self.entries.iter().map(|e| e.sources.len()).sum()
    }
}

impl FromIterator<MappingEntry> for SampleMapping {
    fn from_iter<I: IntoIterator<Item = MappingEntry>>(iter: I) -> Self {
        SampleMapping {
            entries: iter.into_iter().collect(),
        }
    }
}
