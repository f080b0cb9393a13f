use std::fs::File;
use std::path::Path;

use log::warn;

use crate::runtime::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFileformat {
    /// FASTQ behind a compression suffix (.gz, .bz2, .xz, .zst)
    CompressedFASTQ,
    PlainFASTQ,
    Other,
}

const COMPRESSION_SUFFIXES: [&str; 4] = [".gz", ".bz2", ".xz", ".zst"];
const FASTQ_SUFFIXES: [&str; 2] = [".fastq", ".fq"];

/// Whether the file name carries a compression suffix we decompress transparently
pub fn has_compression_suffix(p: &Path) -> bool {
    let name = p
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    COMPRESSION_SUFFIXES.iter().any(|s| name.ends_with(s))
}

pub fn detect_fastq_format(p: &Path) -> DetectedFileformat {
    let name = match p.file_name() {
        Some(n) => n.to_string_lossy().to_string(),
        None => return DetectedFileformat::Other,
    };

    let stem = COMPRESSION_SUFFIXES
        .iter()
        .find_map(|s| name.strip_suffix(s))
        .unwrap_or(&name);
    let is_fastq = FASTQ_SUFFIXES.iter().any(|s| stem.ends_with(s));

    if !is_fastq {
        DetectedFileformat::Other
    } else if stem.len() != name.len() {
        DetectedFileformat::CompressedFASTQ
    } else {
        DetectedFileformat::PlainFASTQ
    }
}

/////// Check that the specified file is a FASTQ file that can be opened
pub fn verify_input_fq_file(path_in: &Path) -> Result<(), Error> {
    if detect_fastq_format(path_in) == DetectedFileformat::Other {
        return Err(Error::file_not_valid(
            path_in,
            Some("expected a .fastq/.fq file, optionally compressed"),
        ));
    }
    match File::open(path_in) {
        Ok(file) => {
            let len = file
                .metadata()
                .map_err(|e| Error::read_failed(path_in, e))?
                .len();
            if len == 0 {
                warn!("Input file {} is empty", path_in.display());
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::file_not_found(path_in)),
        Err(e) => Err(Error::read_failed(path_in, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_fastq_format(&PathBuf::from("a_R1_001.fastq.gz")),
            DetectedFileformat::CompressedFASTQ
        );
        assert_eq!(
            detect_fastq_format(&PathBuf::from("a.R1.fq")),
            DetectedFileformat::PlainFASTQ
        );
        assert_eq!(
            detect_fastq_format(&PathBuf::from("a.bam")),
            DetectedFileformat::Other
        );
    }

    #[test]
    fn test_compression_suffix() {
        assert!(has_compression_suffix(&PathBuf::from("x/a_1.fq.zst")));
        assert!(!has_compression_suffix(&PathBuf::from("x/a_1.fq")));
    }
}
