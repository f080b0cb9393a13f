use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use serde::Serialize;

use crate::fileformat::FastqRecord;

/// Distinct barcodes remembered per stream
pub const MAX_DISTINCT_BARCODES: usize = 10_000;

/// Adapter name and the sequence searched for
pub const KNOWN_ADAPTERS: [(&str, &str); 3] = [
    ("illumina", "AGATCGGAAGAG"),
    ("nextera", "CTGTCTCTTATA"),
    ("truseq", "AATGATACGGCG"),
];

lazy_static! {
    static ref BARCODE_HEURISTICS: Vec<Regex> = ["[A-Z]{6,8}", "[0-9]{4,6}", "[A-Z0-9]{8,10}"]
        .iter()
        .map(|p| Regex::new(p).expect("invalid barcode regex"))
        .collect();
    static ref INDEX_FIELD: Regex = Regex::new(r"^[ACGTN+]+$").expect("invalid index regex");
}

/// Which side observations to collect while combining
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub barcodes: bool,
    pub gc_content: bool,
    pub adapters: bool,
}

impl AnalysisOptions {
    pub fn any(&self) -> bool {
        self.barcodes || self.gc_content || self.adapters
    }
}

/// Barcode of a read header: the index field of an Illumina comment
/// (`@id 1:N:0:ACGTACGT+TTGCAATG`), else the first match of a few loose patterns
pub fn extract_barcode(head: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(head);
    let head = head.strip_prefix('@').unwrap_or(&head);

    if let Some((_, comment)) = head.split_once(' ') {
        if let Some(field) = comment.rsplit(':').next() {
            if INDEX_FIELD.is_match(field) {
                return Some(field.to_string());
            }
        }
    }
    BARCODE_HEURISTICS
        .iter()
        .find_map(|re| re.find(head))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub distinct_barcodes: usize,
    /// Barcodes beyond the distinct limit were not tracked
    pub barcodes_truncated: bool,
    pub gc_percent: Option<f64>,
    pub adapter_hits: BTreeMap<String, u64>,
}

///////////////////////////////
/// Observes records as they pass; never changes what is written
#[derive(Debug, Default)]
pub struct RecordAnalyzer {
    options: AnalysisOptions,
    barcodes: BTreeMap<String, u64>,
    barcodes_truncated: bool,
    gc_bases: u64,
    total_bases: u64,
    adapter_hits: BTreeMap<String, u64>,
}

impl RecordAnalyzer {
    pub fn new(options: AnalysisOptions) -> RecordAnalyzer {
        RecordAnalyzer {
            options,
            ..Default::default()
        }
    }

    pub fn observe(&mut self, record: &FastqRecord) {
        if self.options.barcodes {
            if let Some(barcode) = extract_barcode(&record.head) {
                if let Some(n) = self.barcodes.get_mut(&barcode) {
                    *n += 1;
                } else if self.barcodes.len() < MAX_DISTINCT_BARCODES {
                    self.barcodes.insert(barcode, 1);
                } else {
                    self.barcodes_truncated = true;
                }
            }
        }

        if self.options.gc_content {
            self.total_bases += record.seq.len() as u64;
            self.gc_bases += record
                .seq
                .iter()
                .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
                .count() as u64;
        }

        if self.options.adapters {
            let seq = record.seq.to_ascii_uppercase();
            for (name, adapter) in KNOWN_ADAPTERS {
                if seq
                    .windows(adapter.len())
                    .any(|w| w == adapter.as_bytes())
                {
                    *self.adapter_hits.entry(name.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn summary(&self) -> Option<AnalysisSummary> {
        if !self.options.any() {
            return None;
        }
        let gc_percent = if self.options.gc_content && self.total_bases > 0 {
            Some(self.gc_bases as f64 * 100.0 / self.total_bases as f64)
        } else {
            None
        };
        Some(AnalysisSummary {
            distinct_barcodes: self.barcodes.len(),
            barcodes_truncated: self.barcodes_truncated,
            gc_percent,
            adapter_hits: self.adapter_hits.clone(),
        })
    }

    pub fn log_summary(&self, label: &str) {
        let summary = match self.summary() {
            Some(s) => s,
            None => return,
        };
        if self.options.barcodes && summary.distinct_barcodes > 0 {
            info!("Found {} unique barcodes in {}", summary.distinct_barcodes, label);
        }
        if let Some(gc) = summary.gc_percent {
            info!("Average GC content in {}: {:.1}%", label, gc);
        }
        for (name, hits) in &summary.adapter_hits {
            info!("Detected {} adapter in {} reads of {}", name, hits, label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(head: &str, seq: &str) -> FastqRecord {
        FastqRecord {
            head: head.as_bytes().to_vec(),
            seq: seq.as_bytes().to_vec(),
            sep: b"+".to_vec(),
            qual: vec![b'F'; seq.len()],
        }
    }

    #[test]
    fn test_extract_barcode() {
        assert_eq!(
            extract_barcode(b"@M01:5:FC:1:1101:100:200 1:N:0:ACGTACGT+TTGCAATG").as_deref(),
            Some("ACGTACGT+TTGCAATG")
        );
        assert_eq!(extract_barcode(b"@read_GATTACAA_x").as_deref(), Some("GATTACAA"));
        assert_eq!(extract_barcode(b"@r1"), None);
    }

    #[test]
    fn test_gc_and_adapters() {
        let mut analyzer = RecordAnalyzer::new(AnalysisOptions {
            barcodes: false,
            gc_content: true,
            adapters: true,
        });
        analyzer.observe(&rec("@a", "GGCC"));
        analyzer.observe(&rec("@b", "aatt"));
        analyzer.observe(&rec("@c", "TTAGATCGGAAGAGTT"));
        let summary = analyzer.summary().unwrap();
        assert!((summary.gc_percent.unwrap() - 41.667).abs() < 0.01);
        assert_eq!(summary.adapter_hits.get("illumina"), Some(&1));
        assert_eq!(summary.distinct_barcodes, 0);
    }

    #[test]
    fn test_disabled_analysis_has_no_summary() {
        let mut analyzer = RecordAnalyzer::new(AnalysisOptions::default());
        analyzer.observe(&rec("@a", "GGCC"));
        assert!(analyzer.summary().is_none());
    }
}
