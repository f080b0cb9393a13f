use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use itertools::iproduct;
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::sample_key::{extract_sample_key, find_mate2, SampleKey};
use crate::runtime::Error;
use crate::utils::absolute_path;

const R1_STEMS: [&str; 4] = ["*_R1_*", "*_R1", "*_1", "*.R1"];
const FASTQ_EXTENSIONS: [&str; 4] = [".fastq.gz", ".fastq", ".fq.gz", ".fq"];

/// Mate-1 file name globs used when none are given
pub fn default_r1_patterns() -> Vec<String> {
    iproduct!(R1_STEMS.iter(), FASTQ_EXTENSIONS.iter())
        .map(|(stem, ext)| format!("{}{}", stem, ext))
        .collect()
}

/// Absolute paths of the two mate files of one sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilePair {
    pub r1: PathBuf,
    pub r2: PathBuf,
}

/// How a pair ended up in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// Stored under its derived key
    Primary,
    /// Derived key already taken by another file; stored under the mate-1 absolute path
    Fallback(SampleKey),
    /// Same mate-1 file seen before, nothing stored
    Duplicate,
}

///////////////////////////////
/// SampleKey -> FilePair table. Keys are the derived short key, or the absolute
/// mate-1 path for pairs whose short key collided with an earlier pair
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pairs: BTreeMap<SampleKey, FilePair>,
    fallback_keys: BTreeMap<SampleKey, Vec<SampleKey>>,
    seen_r1: FxHashSet<PathBuf>,
}

impl SampleTable {
    pub fn new() -> SampleTable {
        SampleTable::default()
    }

    pub fn insert(&mut self, key: SampleKey, pair: FilePair) -> Insertion {
        if !self.seen_r1.insert(pair.r1.clone()) {
            return Insertion::Duplicate;
        }
        if self.pairs.contains_key(&key) {
            let alt = pair.r1.to_string_lossy().to_string();
            self.fallback_keys
                .entry(key)
                .or_default()
                .push(alt.clone());
            self.pairs.insert(alt.clone(), pair);
            Insertion::Fallback(alt)
        } else {
            self.pairs.insert(key, pair);
            Insertion::Primary
        }
    }

    pub fn get(&self, key: &str) -> Option<&FilePair> {
        self.pairs.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    /// All keys in sorted order, short and fallback alike
    pub fn keys(&self) -> impl Iterator<Item = &SampleKey> {
        self.pairs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SampleKey, &FilePair)> {
        self.pairs.iter()
    }

    /// Absolute-path keys given to pairs that collided on `key`
    pub fn fallback_keys(&self, key: &str) -> &[SampleKey] {
        self.fallback_keys
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Snapshot for the checkpoint file
    pub fn to_map(&self) -> BTreeMap<SampleKey, FilePair> {
        self.pairs.clone()
    }
}

/// Result of one scan. Nothing in here is fatal
#[derive(Debug, Default)]
pub struct Discovery {
    pub table: SampleTable,
    pub warnings: Vec<String>,
    /// Mate-1 files for which no mate-2 file exists
    pub unpaired: Vec<PathBuf>,
    /// Files matching a mate-1 pattern but no sample-key rule
    pub unrecognized: Vec<PathBuf>,
}

impl Discovery {
    fn warn(&mut self, msg: String) {
        warn!("{}", msg);
        self.warnings.push(msg);
    }
}

///////////////////////////////
/// Recursive scan for paired FASTQ files
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    r1_patterns: Vec<Pattern>,
    r2_patterns: Vec<Pattern>,
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, Error> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| Error::parse_error(format!("glob pattern '{}'", p), Some(e.to_string())))
        })
        .collect()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl FileDiscovery {
    /// Empty mate-1 patterns select the defaults. Mate-2 patterns, if any,
    /// restrict which mate-2 candidates are accepted
    pub fn new(r1_patterns: &[String], r2_patterns: &[String]) -> Result<FileDiscovery, Error> {
        let r1_patterns = if r1_patterns.is_empty() {
            compile_patterns(&default_r1_patterns())?
        } else {
            compile_patterns(r1_patterns)?
        };
        Ok(FileDiscovery {
            r1_patterns,
            r2_patterns: compile_patterns(r2_patterns)?,
        })
    }

    fn is_r1_candidate(&self, name: &str) -> bool {
        self.r1_patterns.iter().any(|p| p.matches(name))
    }

    fn accepts_r2(&self, path: &Path) -> bool {
        if self.r2_patterns.is_empty() {
            return true;
        }
        let name = file_name_of(path);
        self.r2_patterns.iter().any(|p| p.matches(&name))
    }

    /// Walk every root (the current directory if none are given) and pair up mate files.
    /// Roots are walked in the order given, directory entries in name order
    pub fn scan(&self, roots: &[PathBuf]) -> Discovery {
        let roots: Vec<PathBuf> = if roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            roots.to_vec()
        };

        let mut discovery = Discovery::default();
        for root in &roots {
            if !root.is_dir() {
                discovery.warn(format!(
                    "Search directory {} does not exist or is not a directory",
                    root.display()
                ));
                continue;
            }
            info!("Scanning {}", root.display());
            self.scan_root(root, &mut discovery);
        }

        info!(
            "Discovered {} paired samples ({} unpaired, {} unrecognized mate-1 files)",
            discovery.table.len(),
            discovery.unpaired.len(),
            discovery.unrecognized.len()
        );
        discovery
    }

    fn scan_root(&self, root: &Path, discovery: &mut Discovery) {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let at = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    discovery.warn(format!("Cannot read {}: {}", at, e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.is_r1_candidate(&name) {
                continue;
            }
            self.add_r1_file(entry.path(), &name, discovery);
        }
    }

    fn add_r1_file(&self, path: &Path, name: &str, discovery: &mut Discovery) {
        let r1 = match absolute_path(path) {
            Ok(p) => p,
            Err(e) => {
                discovery.warn(format!("Cannot resolve {}: {}", path.display(), e));
                return;
            }
        };
        if discovery.table.seen_r1.contains(&r1) {
            return;
        }

        let key = match extract_sample_key(name) {
            Some(key) => key,
            None => {
                debug!("No sample key in {}", name);
                discovery.unrecognized.push(r1);
                return;
            }
        };

        let r2 = match find_mate2(&r1, |p| self.accepts_r2(p)) {
            Some(r2) => absolute_path(&r2).unwrap_or(r2),
            None => {
                warn!("No mate-2 file found for {}", r1.display());
                discovery.unpaired.push(r1);
                return;
            }
        };

        let pair = FilePair { r1, r2 };
        match discovery.table.insert(key.clone(), pair) {
            Insertion::Primary => debug!("Sample {} paired", key),
            Insertion::Fallback(alt) => discovery.warn(format!(
                "Sample key '{}' is already taken; storing the pair under {}",
                key, alt
            )),
            Insertion::Duplicate => {}
        }
    }
}
