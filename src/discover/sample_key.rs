use std::path::{Path, PathBuf};

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

/// Canonical name of one sequencing sample, derived from its R1 file name
pub type SampleKey = String;

/// R1 markers and their R2 counterparts, in the order they are tried
pub const MATE_MARKERS: [(&str, &str); 4] = [
    ("_R1_", "_R2_"),
    ("_R1.", "_R2."),
    ("_1.", "_2."),
    (".R1.", ".R2."),
];

lazy_static! {
    // sample_S1_R1_001.fastq.gz; the index must sit right before R1
    static ref ILLUMINA_INDEX: Regex =
        Regex::new(r"^(.+)_S\d+_R1_").expect("invalid sample index regex");
}

fn prefix_before<'a>(file_name: &'a str, marker: &str) -> Option<&'a str> {
    file_name.find(marker).map(|pos| &file_name[..pos])
}

/// Derive the sample key from an R1 file name. First rule that applies wins:
/// sample index before R1, then `_R1_`, `_R1.`, `_1.`, `.R1.`.
/// Returns None if the name is not an R1 file
pub fn extract_sample_key(file_name: &str) -> Option<SampleKey> {
    let key = if let Some(caps) = ILLUMINA_INDEX.captures(file_name) {
        caps.get(1).map(|m| m.as_str())
    } else {
        MATE_MARKERS
            .iter()
            .find_map(|(r1, _)| prefix_before(file_name, r1))
    };
    key.filter(|k| !k.is_empty()).map(|k| k.to_string())
}

fn toggle_compression_suffix(name: &str) -> String {
    match name.strip_suffix(".gz") {
        Some(stem) => stem.to_string(),
        None => format!("{}.gz", name),
    }
}

/// Candidate R2 paths for an R1 path, most likely first.
/// Each R1 marker present in the file name is swapped for its R2 marker (last occurrence),
/// then the same names are tried with the .gz suffix added or removed
pub fn mate2_candidates(r1_path: &Path) -> Vec<PathBuf> {
    let name = match r1_path.file_name() {
        Some(n) => n.to_string_lossy().to_string(),
        None => return Vec::new(),
    };
    let dir = r1_path.parent().unwrap_or_else(|| Path::new(""));

    let swapped: Vec<String> = MATE_MARKERS
        .iter()
        .filter_map(|(r1, r2)| {
            name.rfind(r1)
                .map(|pos| format!("{}{}{}", &name[..pos], r2, &name[pos + r1.len()..]))
        })
        .collect();
    let toggled: Vec<String> = swapped
        .iter()
        .map(|n| toggle_compression_suffix(n))
        .collect();

    swapped
        .into_iter()
        .chain(toggled)
        .unique()
        .filter(|n| *n != name)
        .map(|n| dir.join(n))
        .collect()
}

/// First existing R2 candidate accepted by the filter
pub fn find_mate2<F>(r1_path: &Path, accept: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    mate2_candidates(r1_path)
        .into_iter()
        .find(|p| p.is_file() && accept(p))
}
