use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use log::{debug, info, warn};
use serde::Serialize;

use super::analysis::{AnalysisOptions, AnalysisSummary, RecordAnalyzer};
use super::dedup::{DedupSet, DEFAULT_DEDUP_LIMIT};
use super::hashing::HashingWriter;
use crate::discover::FilePair;
use crate::fileformat::{open_fastq, FastqRecord, DEFAULT_BUFFER_SIZE};
use crate::runtime::{CancelFlag, Error};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Records between two looks at the cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    #[default]
    Off,
    /// A single output drops sequences it has already written.
    /// Mate pairs are still deduplicated in lockstep so the outputs stay aligned
    Independent,
    /// Mate files are read in lockstep and the mate-1 sequence decides for both
    PairedAware,
}

#[derive(Debug, Clone)]
pub struct CombinerSettings {
    pub buffer_size: usize,
    pub compression_level: u32,
    pub dedup: DedupMode,
    pub dedup_limit: usize,
    pub analysis: AnalysisOptions,
}

impl Default for CombinerSettings {
    fn default() -> Self {
        CombinerSettings {
            buffer_size: DEFAULT_BUFFER_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            dedup: DedupMode::Off,
            dedup_limit: DEFAULT_DEDUP_LIMIT,
            analysis: AnalysisOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    /// Could not be opened; contributed nothing
    Unreadable(String),
    /// Failed part way; records before the failure were kept
    ReadFailed(String),
}

/// What happened to one input file
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub path: PathBuf,
    /// Complete records read
    pub records: u64,
    pub malformed: u64,
    pub truncated: bool,
    pub status: SourceStatus,
}

impl SourceReport {
    fn skipped(path: &Path, err: Option<Error>) -> SourceReport {
        let reason = match err {
            Some(e) => e.to_string(),
            None => "mate file cannot be opened".to_string(),
        };
        warn!("Skipping input {}: {}", path.display(), reason);
        SourceReport {
            path: path.to_path_buf(),
            records: 0,
            malformed: 0,
            truncated: false,
            status: SourceStatus::Unreadable(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SourceStatus::Ok
    }
}

/// Result of writing one output file
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub output: PathBuf,
    /// Records written
    pub records: u64,
    pub duplicates: u64,
    pub dedup_exhausted: bool,
    /// Size on disk of the inputs that could be opened
    pub input_bytes: u64,
    pub checksum: String,
    pub sources: Vec<SourceReport>,
    pub analysis: Option<AnalysisSummary>,
}

impl StreamReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| !s.is_ok())
    }
}

/// Removes the file on drop unless committed
struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Removed partial output {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove partial output {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

type GzOutput = BufWriter<GzEncoder<HashingWriter<File>>>;

struct OutputStream {
    writer: GzOutput,
    guard: PartialOutput,
    records: u64,
}

impl OutputStream {
    fn create(path: &Path, settings: &CombinerSettings) -> Result<OutputStream, Error> {
        let file = File::create(path).map_err(|e| Error::output_not_creatable(path, e))?;
        let guard = PartialOutput {
            path: path.to_path_buf(),
            committed: false,
        };
        // zero mtime keeps the gzip header identical between runs
        let encoder = GzBuilder::new().mtime(0).write(
            HashingWriter::new(file),
            Compression::new(settings.compression_level),
        );
        Ok(OutputStream {
            writer: BufWriter::with_capacity(settings.buffer_size, encoder),
            guard,
            records: 0,
        })
    }

    fn write(&mut self, record: &FastqRecord) -> Result<(), Error> {
        record
            .write(&mut self.writer)
            .map_err(|e| Error::write_failed(&self.guard.path, e))?;
        self.records += 1;
        Ok(())
    }

    /// Flush everything and return the record count and checksum
    fn finish(self) -> Result<(u64, String), Error> {
        let OutputStream {
            writer,
            guard,
            records,
        } = self;
        let encoder = writer
            .into_inner()
            .map_err(|e| Error::write_failed(&guard.path, e.into_error()))?;
        let hashing = encoder
            .finish()
            .map_err(|e| Error::write_failed(&guard.path, e))?;
        let (file, checksum) = hashing.finalize();
        file.sync_all()
            .map_err(|e| Error::write_failed(&guard.path, e))?;
        guard.commit();
        Ok((records, checksum))
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Status of one mate after the pair stopped on a read error.
/// A mate that still had records left is cut short too
fn lockstep_status(path: &Path, res: io::Result<bool>) -> SourceStatus {
    match res {
        Ok(false) => SourceStatus::Ok,
        Ok(true) => {
            warn!("Stopped reading {} because its mate failed", path.display());
            SourceStatus::ReadFailed("mate read failed".to_string())
        }
        Err(e) => {
            warn!("Read failed in {}: {}", path.display(), e);
            SourceStatus::ReadFailed(e.to_string())
        }
    }
}

fn remove_output(path: &Path) {
    if fs::remove_file(path).is_ok() {
        info!("Removed output {}", path.display());
    }
}

///////////////////////////////
/// Concatenates FASTQ files into gzip outputs in bounded memory
pub struct StreamCombiner {
    settings: CombinerSettings,
    cancel: CancelFlag,
}

impl StreamCombiner {
    pub fn new(settings: CombinerSettings, cancel: CancelFlag) -> StreamCombiner {
        StreamCombiner { settings, cancel }
    }

    fn check_cancelled(&self, processed: u64) -> Result<(), Error> {
        if processed % CANCEL_CHECK_INTERVAL == 0 && self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Write every complete record of the inputs, in order, to one gzip file.
    /// Inputs that cannot be opened are skipped and reported
    pub fn combine_files(&self, inputs: &[PathBuf], output: &Path) -> Result<StreamReport, Error> {
        let label = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut dedup = match self.settings.dedup {
            DedupMode::Off => None,
            _ => Some(DedupSet::new(self.settings.dedup_limit, &label)),
        };

        let mut out = OutputStream::create(output, &self.settings)?;
        let mut analyzer = RecordAnalyzer::new(self.settings.analysis);
        let mut sources = Vec::with_capacity(inputs.len());
        let mut input_bytes = 0;
        let mut record = FastqRecord::default();
        let mut processed: u64 = 0;

        for input in inputs {
            let mut reader = match open_fastq(input, self.settings.buffer_size) {
                Ok(reader) => reader,
                Err(e) => {
                    sources.push(SourceReport::skipped(input, Some(e)));
                    continue;
                }
            };
            input_bytes += file_size(input);
            debug!("Streaming {}", input.display());

            let mut records = 0;
            let status = loop {
                match reader.read_record(&mut record) {
                    Ok(true) => {}
                    Ok(false) => break SourceStatus::Ok,
                    Err(e) => {
                        warn!("Read failed in {} after {} records: {}", input.display(), records, e);
                        break SourceStatus::ReadFailed(e.to_string());
                    }
                }
                records += 1;
                processed += 1;
                self.check_cancelled(processed)?;

                if let Some(dedup) = dedup.as_mut() {
                    if !dedup.is_new(&record.seq) {
                        continue;
                    }
                }
                analyzer.observe(&record);
                out.write(&record)?;
            };

            if reader.num_malformed() > 0 {
                warn!(
                    "Skipped {} malformed records in {}",
                    reader.num_malformed(),
                    input.display()
                );
            }
            sources.push(SourceReport {
                path: input.clone(),
                records,
                malformed: reader.num_malformed(),
                truncated: reader.is_truncated(),
                status,
            });
        }

        let (records, checksum) = out.finish()?;
        analyzer.log_summary(&label);
        Ok(StreamReport {
            output: output.to_path_buf(),
            records,
            duplicates: dedup.as_ref().map_or(0, |d| d.num_duplicates()),
            dedup_exhausted: dedup.as_ref().map_or(false, |d| d.is_exhausted()),
            input_bytes,
            checksum,
            sources,
            analysis: analyzer.summary(),
        })
    }

    /// Combine the mate-1 files of all pairs into one output and the mate-2 files into another.
    /// Either both outputs are left complete, or neither is left at all
    pub fn combine_pairs(
        &self,
        pairs: &[FilePair],
        out_r1: &Path,
        out_r2: &Path,
    ) -> Result<(StreamReport, StreamReport), Error> {
        if self.settings.dedup != DedupMode::Off {
            return self.combine_lockstep(pairs, out_r1, out_r2);
        }

        let r1: Vec<PathBuf> = pairs.iter().map(|p| p.r1.clone()).collect();
        let r2: Vec<PathBuf> = pairs.iter().map(|p| p.r2.clone()).collect();
        let report_r1 = self.combine_files(&r1, out_r1)?;
        match self.combine_files(&r2, out_r2) {
            Ok(report_r2) => Ok((report_r1, report_r2)),
            Err(e) => {
                remove_output(out_r1);
                Err(e)
            }
        }
    }

    fn combine_lockstep(
        &self,
        pairs: &[FilePair],
        out_r1: &Path,
        out_r2: &Path,
    ) -> Result<(StreamReport, StreamReport), Error> {
        let buffer_size = self.settings.buffer_size;
        let mut out1 = OutputStream::create(out_r1, &self.settings)?;
        let mut out2 = OutputStream::create(out_r2, &self.settings)?;
        let mut dedup = DedupSet::new(self.settings.dedup_limit, "read pairs");
        let mut analyzer1 = RecordAnalyzer::new(self.settings.analysis);
        let mut analyzer2 = RecordAnalyzer::new(self.settings.analysis);
        let mut sources1 = Vec::with_capacity(pairs.len());
        let mut sources2 = Vec::with_capacity(pairs.len());
        let (mut bytes1, mut bytes2) = (0, 0);
        let mut rec1 = FastqRecord::default();
        let mut rec2 = FastqRecord::default();
        let mut processed: u64 = 0;

        for pair in pairs {
            let (mut reader1, mut reader2) = match (
                open_fastq(&pair.r1, buffer_size),
                open_fastq(&pair.r2, buffer_size),
            ) {
                (Ok(a), Ok(b)) => (a, b),
                (a, b) => {
                    sources1.push(SourceReport::skipped(&pair.r1, a.err()));
                    sources2.push(SourceReport::skipped(&pair.r2, b.err()));
                    continue;
                }
            };
            bytes1 += file_size(&pair.r1);
            bytes2 += file_size(&pair.r2);

            let (mut n1, mut n2) = (0, 0);
            let mut status1 = SourceStatus::Ok;
            let mut status2 = SourceStatus::Ok;
            let mut uneven = false;
            loop {
                processed += 1;
                self.check_cancelled(processed)?;

                match (reader1.read_record(&mut rec1), reader2.read_record(&mut rec2)) {
                    (Ok(true), Ok(true)) => {
                        n1 += 1;
                        n2 += 1;
                        if dedup.is_new(&rec1.seq) {
                            analyzer1.observe(&rec1);
                            analyzer2.observe(&rec2);
                            out1.write(&rec1)?;
                            out2.write(&rec2)?;
                        }
                    }
                    (Ok(false), Ok(false)) => break,
                    // one mate ran out; the rest of the other is copied as is
                    (Ok(true), Ok(false)) => {
                        n1 += 1;
                        uneven = true;
                        out1.write(&rec1)?;
                    }
                    (Ok(false), Ok(true)) => {
                        n2 += 1;
                        uneven = true;
                        out2.write(&rec2)?;
                    }
                    (res1, res2) => {
                        status1 = lockstep_status(&pair.r1, res1);
                        status2 = lockstep_status(&pair.r2, res2);
                        break;
                    }
                }
            }
            if uneven {
                warn!(
                    "Mate files differ in length ({} vs {} records): {} / {}",
                    n1,
                    n2,
                    pair.r1.display(),
                    pair.r2.display()
                );
            }

            sources1.push(SourceReport {
                path: pair.r1.clone(),
                records: n1,
                malformed: reader1.num_malformed(),
                truncated: reader1.is_truncated(),
                status: status1,
            });
            sources2.push(SourceReport {
                path: pair.r2.clone(),
                records: n2,
                malformed: reader2.num_malformed(),
                truncated: reader2.is_truncated(),
                status: status2,
            });
        }

        let (records1, checksum1) = out1.finish()?;
        let (records2, checksum2) = match out2.finish() {
            Ok(done) => done,
            Err(e) => {
                remove_output(out_r1);
                return Err(e);
            }
        };
        analyzer1.log_summary(&out_r1.display().to_string());
        analyzer2.log_summary(&out_r2.display().to_string());
        if dedup.num_duplicates() > 0 {
            info!("Removed {} duplicate read pairs", dedup.num_duplicates());
        }

        let report1 = StreamReport {
            output: out_r1.to_path_buf(),
            records: records1,
            duplicates: dedup.num_duplicates(),
            dedup_exhausted: dedup.is_exhausted(),
            input_bytes: bytes1,
            checksum: checksum1,
            sources: sources1,
            analysis: analyzer1.summary(),
        };
        let report2 = StreamReport {
            output: out_r2.to_path_buf(),
            records: records2,
            duplicates: dedup.num_duplicates(),
            dedup_exhausted: dedup.is_exhausted(),
            input_bytes: bytes2,
            checksum: checksum2,
            sources: sources2,
            analysis: analyzer2.summary(),
        };
        Ok((report1, report2))
    }
}
