use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::fastq::{open_fastq_stream, FastqRecord, FastqRecordReader};
use crate::runtime::Error;

/// Warnings kept per file; later ones are only counted
pub const MAX_WARNINGS_PER_FILE: usize = 100;

/// Highest character of the Phred+33 range used by Illumina 1.8+ ('J', Q41)
const PHRED33_MAX: u8 = b'J';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityEncoding {
    /// Uses characters below '@', so it can only be Phred+33
    Phred33,
    /// Only characters from '@' and uses some above 'J', so Phred+64
    Phred64,
    /// Fits both Phred+33 and Phred+64
    Ambiguous,
    /// Characters outside printable ASCII 33-126
    OutOfRange,
}

pub fn detect_quality_encoding(qual: &[u8]) -> QualityEncoding {
    let (min, max) = match (qual.iter().min(), qual.iter().max()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => return QualityEncoding::Ambiguous,
    };
    if min < 33 || max > 126 {
        QualityEncoding::OutOfRange
    } else if min < 64 {
        QualityEncoding::Phred33
    } else if max > PHRED33_MAX {
        QualityEncoding::Phred64
    } else {
        QualityEncoding::Ambiguous
    }
}

fn is_nucleotide(b: u8) -> bool {
    matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N')
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    /// Four-line groups inspected, including malformed ones
    pub records: u64,
    pub warnings: Vec<String>,
    pub num_warnings: usize,
    pub encodings: BTreeSet<QualityEncoding>,
    pub truncated: bool,
}

impl ValidationReport {
    fn warn(&mut self, msg: String) {
        self.num_warnings += 1;
        if self.warnings.len() < MAX_WARNINGS_PER_FILE {
            self.warnings.push(msg);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.num_warnings == 0
    }

    /// The encoding of the file if all quality lines agree on one
    pub fn encoding(&self) -> Option<QualityEncoding> {
        let definite: Vec<_> = self
            .encodings
            .iter()
            .filter(|e| **e != QualityEncoding::Ambiguous)
            .collect();
        match definite.as_slice() {
            [] if !self.encodings.is_empty() => Some(QualityEncoding::Ambiguous),
            [one] => Some(**one),
            _ => None,
        }
    }
}

pub fn validate_reader<R: BufRead>(
    reader: R,
    path: &Path,
) -> Result<ValidationReport, std::io::Error> {
    let mut report = ValidationReport {
        path: path.to_path_buf(),
        ..Default::default()
    };
    let mut reader = FastqRecordReader::new(reader);
    let mut record = FastqRecord::default();

    while reader.read_framed(&mut record)? {
        report.records += 1;
        let n = report.records;
        let line = (n - 1) * 4 + 1;

        if !record.has_valid_head() {
            report.warn(format!("Invalid header at line {}", line));
        }
        if record.sep.first() != Some(&b'+') {
            report.warn(format!("Invalid separator line at line {}", line + 2));
        }
        if !record.seq.iter().all(|b| is_nucleotide(*b)) {
            report.warn(format!("Invalid characters in sequence at read {}", n));
        }
        if record.seq.len() != record.qual.len() {
            report.warn(format!(
                "Quality length mismatch at read {} ({} vs {})",
                n,
                record.seq.len(),
                record.qual.len()
            ));
        }

        let encoding = detect_quality_encoding(&record.qual);
        if encoding == QualityEncoding::OutOfRange {
            report.warn(format!("Quality scores out of range at read {}", n));
        }
        report.encodings.insert(encoding);
    }

    if reader.is_truncated() {
        report.truncated = true;
        report.warn("Incomplete FASTQ file: trailing partial record".to_string());
    }
    if report.encodings.contains(&QualityEncoding::Phred33)
        && report.encodings.contains(&QualityEncoding::Phred64)
    {
        report.warn("Mixed quality encodings detected (Phred+33 and Phred+64)".to_string());
    }
    Ok(report)
}

/// Check every record of a file and collect line-level anomalies as warnings
pub fn validate_fastq(path: &Path, buffer_size: usize) -> Result<ValidationReport, Error> {
    let stream = open_fastq_stream(path, buffer_size)?;
    validate_reader(stream, path).map_err(|e| Error::read_failed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn validate_text(text: &str) -> ValidationReport {
        validate_reader(Cursor::new(text.as_bytes().to_vec()), Path::new("test.fq")).unwrap()
    }

    #[test]
    fn test_clean_file() {
        let report = validate_text("@r1\nACGTN\n+\nFFFF#\n@r2\nacgt\n+\nFFFF\n");
        assert!(report.is_clean(), "{:?}", report.warnings);
        assert_eq!(report.records, 2);
        assert_eq!(report.encoding(), Some(QualityEncoding::Phred33));
    }

    #[test]
    fn test_line_level_anomalies() {
        let report = validate_text("r1\nACXT\n-\nFFF\n");
        assert_eq!(report.num_warnings, 4);
        assert!(report.warnings[0].contains("Invalid header"));
        assert!(report.warnings[1].contains("separator"));
        assert!(report.warnings[2].contains("Invalid characters"));
        assert!(report.warnings[3].contains("length mismatch"));
    }

    #[test]
    fn test_truncated_and_mixed_encodings() {
        let report = validate_text("@r1\nAC\n+\n#F\n@r2\nAC\n+\nhh\n@r3\nAC\n");
        assert!(report.truncated);
        assert!(report.warnings.iter().any(|w| w.contains("Mixed quality")));
        assert_eq!(report.encoding(), None);
    }

    #[test]
    fn test_detect_quality_encoding() {
        assert_eq!(detect_quality_encoding(b"II#"), QualityEncoding::Phred33);
        assert_eq!(detect_quality_encoding(b"hhB"), QualityEncoding::Phred64);
        assert_eq!(detect_quality_encoding(b"FFJ"), QualityEncoding::Ambiguous);
        assert_eq!(detect_quality_encoding(b"F\x7f"), QualityEncoding::OutOfRange);
    }

    #[test]
    fn test_warnings_are_capped() {
        let text: String = (0..150).map(|i| format!("@r{}\nAC\n+\nF\n", i)).collect();
        let report = validate_text(&text);
        assert_eq!(report.num_warnings, 150);
        assert_eq!(report.warnings.len(), MAX_WARNINGS_PER_FILE);
    }
}
