mod analysis;
mod combiner;
mod dedup;
mod hashing;

pub use analysis::{extract_barcode, AnalysisOptions, AnalysisSummary, RecordAnalyzer, KNOWN_ADAPTERS};
pub use combiner::{
    CombinerSettings, DedupMode, SourceReport, SourceStatus, StreamCombiner, StreamReport,
    DEFAULT_COMPRESSION_LEVEL,
};
pub use dedup::{DedupSet, DEFAULT_DEDUP_LIMIT};
pub use hashing::{checksum_file, HashingWriter};
