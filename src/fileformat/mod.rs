pub mod checkpoint;
pub mod fastq;
pub mod mapping_file;
pub mod validate;
mod detect_fileformat;

pub use detect_fileformat::detect_fastq_format;
pub use detect_fileformat::has_compression_suffix;
pub use detect_fileformat::verify_input_fq_file;
pub use detect_fileformat::DetectedFileformat;

pub use fastq::count_records;
pub use fastq::open_fastq;
pub use fastq::open_fastq_stream;
pub use fastq::FastqRecord;
pub use fastq::FastqRecordReader;
pub use fastq::DEFAULT_BUFFER_SIZE;

pub use mapping_file::MappingEntry;
pub use mapping_file::SampleMapping;

pub use validate::validate_fastq;
pub use validate::QualityEncoding;
pub use validate::ValidationReport;

pub use checkpoint::Checkpoint;
pub use checkpoint::CompletedTarget;
