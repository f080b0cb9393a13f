use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver};
use lazy_static::lazy_static;
use log::{error, info, warn};
use rayon::prelude::*;
use regex::Regex;

use super::report::{write_summary_csv, write_summary_json};
use super::result::{
    CombinationResult, PairCountMismatch, RunSummary, SkipReason, TargetOutcome,
};
use crate::combine::{checksum_file, CombinerSettings, StreamCombiner};
use crate::discover::{FileDiscovery, FilePair, SampleTable};
use crate::fileformat::{
    count_records, validate_fastq, Checkpoint, CompletedTarget, SampleMapping,
};
use crate::resolve::{FuzzyStrategy, MappingResolver, ResolvedSource, ResolvedTarget};
use crate::runtime::{CancelFlag, Error};

pub const SUMMARY_CSV_FILENAME: &str = "combination_summary.csv";
pub const SUMMARY_JSON_FILENAME: &str = "summary.json";

/// Validation warnings kept per target
const MAX_TARGET_WARNINGS: usize = 100;

/// Attempts per target when failed combinations are retried
pub const RETRY_ATTEMPTS: u32 = 3;
/// Wait before the first retry; doubles with every further attempt
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub const BACKUP_SUFFIX: &str = ".backup";

lazy_static! {
    static ref SAMPLE_INDEX_SUFFIX: Regex = Regex::new(r"_S\d+$").expect("invalid suffix regex");
}

/// Output base name for a target: whitespace and '-' become '_', other punctuation is
/// dropped, repeated '_' collapse, a trailing `_S<n>` and boundary '_' are removed
pub fn sanitize_target_name(target: &str) -> String {
    let replaced: String = target
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    let stripped = SAMPLE_INDEX_SUFFIX.replace(collapsed.trim_matches('_'), "");
    stripped.trim_matches('_').to_string()
}

/// `<name>_S1_R<mate>_001.fastq.gz`
pub fn output_file_name(sanitized: &str, mate: u8) -> String {
    format!("{}_S1_R{}_001.fastq.gz", sanitized, mate)
}

#[derive(Debug, Clone)]
pub struct CombineParams {
    pub path_mapping: PathBuf,
    pub path_out: PathBuf,
    pub search_dirs: Vec<PathBuf>,
    pub r1_patterns: Vec<String>,
    pub r2_patterns: Vec<String>,
    pub dry_run: bool,
    pub force: bool,
    pub resume: bool,
    pub checkpoint: bool,
    pub validate: bool,
    /// Copy every source to `<file>.backup` before it is read
    pub create_backups: bool,
    /// Tries per target; 1 means no retry
    pub retry_attempts: u32,
    pub threads: usize,
    pub fuzzy: FuzzyStrategy,
    pub settings: CombinerSettings,
    pub write_csv: bool,
    pub write_json: bool,
}

/// One target ready for a worker
#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub target: String,
    pub output_name: String,
    pub r1_output: PathBuf,
    pub r2_output: PathBuf,
    pub sources: Vec<ResolvedSource>,
    pub pairs: Vec<FilePair>,
    /// Set when the target must be skipped without looking at any file
    pub blocked: Option<SkipReason>,
}

impl TargetPlan {
    fn new_result(&self) -> CombinationResult {
        CombinationResult::new(
            &self.target,
            &self.output_name,
            self.r1_output.clone(),
            self.r2_output.clone(),
            self.sources.clone(),
        )
    }
}

/// Sanitise names and lay out outputs. A name taken by an earlier target, or one that
/// sanitises to nothing, blocks the target
pub fn plan_targets(
    targets: &[ResolvedTarget],
    table: &SampleTable,
    path_out: &Path,
) -> Vec<TargetPlan> {
    let mut used_names: HashSet<String> = HashSet::new();
    targets
        .iter()
        .map(|target| {
            let output_name = sanitize_target_name(&target.target);
            let blocked = if output_name.is_empty() {
                warn!("Target '{}' has no usable characters for a file name", target.target);
                Some(SkipReason::InvalidName)
            } else if !used_names.insert(output_name.clone()) {
                warn!(
                    "Target '{}' would overwrite the outputs of another target named '{}'",
                    target.target, output_name
                );
                Some(SkipReason::OutputNameConflict)
            } else {
                None
            };
            let (r1_output, r2_output) = if output_name.is_empty() {
                (PathBuf::new(), PathBuf::new())
            } else {
                (
                    path_out.join(output_file_name(&output_name, 1)),
                    path_out.join(output_file_name(&output_name, 2)),
                )
            };
            TargetPlan {
                target: target.target.clone(),
                output_name,
                r1_output,
                r2_output,
                sources: target.sources.clone(),
                pairs: target
                    .keys()
                    .filter_map(|k| table.get(k).cloned())
                    .collect(),
                blocked,
            }
        })
        .collect()
}

fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Copy a source next to itself unless a backup is already there.
/// Returns a warning when the copy fails
fn create_backup(path: &Path) -> Option<String> {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    let backup = PathBuf::from(name);
    if backup.exists() {
        return None;
    }
    match fs::copy(path, &backup) {
        Ok(_) => {
            info!("Created backup {}", backup.display());
            None
        }
        Err(e) => {
            let msg = format!("Could not back up {}: {}", path.display(), e);
            warn!("{}", msg);
            Some(msg)
        }
    }
}

/// Run an operation up to `attempts` times, waiting `delay`, then twice that, between tries.
/// Cancellation is never retried
fn retry_with_backoff<T>(
    attempts: u32,
    delay: Duration,
    mut op: impl FnMut() -> Result<T, Error>,
) -> Result<T, Error> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if attempt < attempts && !e.is_cancelled() => {
                let wait = delay * 2u32.pow(attempt - 1);
                warn!("Attempt {} failed: {}. Retrying in {:?}", attempt, e, wait);
                thread::sleep(wait);
                attempt += 1;
            }
            result => return result,
        }
    }
}

///////////////////////////////
/// Runs each target through the overwrite, resume, dry-run and integrity checks and
/// then the combiner. One worker task per target; each task hands back its own result
pub struct TargetOrchestrator {
    params: Arc<CombineParams>,
    cancel: CancelFlag,
    completed: BTreeMap<String, CompletedTarget>,
}

impl TargetOrchestrator {
    pub fn new(
        params: Arc<CombineParams>,
        cancel: CancelFlag,
        completed: BTreeMap<String, CompletedTarget>,
    ) -> TargetOrchestrator {
        TargetOrchestrator {
            params,
            cancel,
            completed,
        }
    }

    pub fn run_all(self: &Arc<Self>, plans: Vec<TargetPlan>) -> Vec<CombinationResult> {
        let thread_pool = threadpool::ThreadPool::new(self.params.threads.max(1));
        info!(
            "Processing {} targets on {} worker threads",
            plans.len(),
            self.params.threads
        );

        let mut pending: Vec<(CombinationResult, Receiver<CombinationResult>)> = Vec::new();
        for plan in plans {
            let (tx, rx) = channel::bounded(1);
            let placeholder = plan.new_result();
            let orchestrator = Arc::clone(self);
            thread_pool.execute(move || {
                let result = orchestrator.process_target(plan);
                let _ = tx.send(result);
            });
            pending.push((placeholder, rx));
        }

        pending
            .into_iter()
            .map(|(placeholder, rx)| match rx.recv() {
                Ok(result) => result,
                Err(_) => {
                    error!("Worker for target '{}' terminated unexpectedly", placeholder.target);
                    placeholder.with_outcome(TargetOutcome::Failed {
                        error: "worker terminated unexpectedly".to_string(),
                    })
                }
            })
            .collect()
    }

    pub fn process_target(&self, plan: TargetPlan) -> CombinationResult {
        let start = Instant::now();
        let mut result = plan.new_result();
        let outcome = self.evaluate_target(&plan, &mut result);
        result.elapsed_secs = start.elapsed().as_secs_f64();
        result.with_outcome(outcome)
    }

    fn evaluate_target(&self, plan: &TargetPlan, result: &mut CombinationResult) -> TargetOutcome {
        if let Some(reason) = plan.blocked {
            return TargetOutcome::Skipped { reason };
        }
        if self.cancel.is_cancelled() {
            return TargetOutcome::Cancelled;
        }
        info!(
            "Processing target {} ({} source pairs) -> {}",
            plan.target,
            plan.pairs.len(),
            plan.output_name
        );
        let params = &self.params;
        let outputs_exist = (plan.r1_output.exists(), plan.r2_output.exists());

        if params.resume && outputs_exist == (true, true) {
            match self.resume_target(plan, result) {
                Ok(()) => {
                    info!("Resumed {}: {} read pairs already combined", plan.target, result.r1_reads);
                    return TargetOutcome::Resumed;
                }
                Err(e) => {
                    let msg = format!("Existing outputs cannot be reused: {}", e);
                    warn!("{}: {}", plan.target, msg);
                    result.warnings.push(msg);
                }
            }
        }

        if params.dry_run {
            let missing: Vec<PathBuf> = plan
                .pairs
                .iter()
                .flat_map(|p| [&p.r1, &p.r2])
                .filter(|p| !is_readable(p))
                .cloned()
                .collect();
            for path in &missing {
                warn!("Dry run: {} is missing or unreadable", path.display());
            }
            return TargetOutcome::DryRun { missing };
        }

        if !params.force && (outputs_exist.0 || outputs_exist.1) {
            warn!(
                "Skipping {}: output files already exist. Use --force to overwrite",
                plan.target
            );
            return TargetOutcome::Skipped {
                reason: SkipReason::FilesExist,
            };
        }

        let readable: Vec<FilePair> = plan
            .pairs
            .iter()
            .filter(|p| {
                let ok = is_readable(&p.r1) && is_readable(&p.r2);
                if !ok {
                    let msg = format!(
                        "Source pair {} / {} cannot be opened and is left out",
                        p.r1.display(),
                        p.r2.display()
                    );
                    warn!("{}", msg);
                    result.warnings.push(msg);
                }
                ok
            })
            .cloned()
            .collect();
        if readable.is_empty() {
            return TargetOutcome::Skipped {
                reason: SkipReason::NoReadableSources,
            };
        }

        if params.validate && !self.validate_sources(&readable, result) && !params.force {
            warn!("Skipping {}: validation found problems. Use --force to proceed", plan.target);
            return TargetOutcome::Skipped {
                reason: SkipReason::ValidationFailed,
            };
        }

        let mismatches = self.check_pair_counts(&readable, result);
        result.mismatches = mismatches;
        if !result.mismatches.is_empty() {
            for m in &result.mismatches {
                warn!(
                    "Paired-end mismatch: {} has {} records, {} has {}",
                    m.r1.display(),
                    m.r1_records,
                    m.r2.display(),
                    m.r2_records
                );
            }
            if !params.force {
                warn!("Skipping {} due to paired-end mismatches. Use --force to proceed", plan.target);
                return TargetOutcome::Skipped {
                    reason: SkipReason::PairedEndMismatch,
                };
            }
            warn!("Combining {} despite paired-end mismatches", plan.target);
        }

        if params.create_backups {
            for path in readable.iter().flat_map(|p| [&p.r1, &p.r2]) {
                if let Some(msg) = create_backup(path) {
                    result.warnings.push(msg);
                }
            }
        }

        let combiner = StreamCombiner::new(params.settings.clone(), self.cancel.clone());
        let start = Instant::now();
        let combined = retry_with_backoff(params.retry_attempts, RETRY_DELAY, || {
            combiner.combine_pairs(&readable, &plan.r1_output, &plan.r2_output)
        });
        match combined {
            Ok((report1, report2)) => {
                let secs = start.elapsed().as_secs_f64();
                let mb = (report1.input_bytes + report2.input_bytes) as f64 / 1024.0 / 1024.0;
                result.speed_mb_per_sec = if secs > 0.0 { mb / secs } else { 0.0 };
                result.r1_reads = report1.records;
                result.r2_reads = report2.records;
                result.r1_checksum = Some(report1.checksum.clone());
                result.r2_checksum = Some(report2.checksum.clone());
                result.duplicates_removed = report1.duplicates.max(report2.duplicates);
                result.dedup_exhausted = report1.dedup_exhausted || report2.dedup_exhausted;
                if result.dedup_exhausted {
                    let msg = format!(
                        "Deduplication limit of {} sequences reached; later duplicates were kept",
                        params.settings.dedup_limit
                    );
                    warn!("{}: {}", plan.target, msg);
                    result.warnings.push(msg);
                }
                for source in report1.failed_sources().chain(report2.failed_sources()) {
                    result
                        .warnings
                        .push(format!("Input {} was not fully read: {:?}", source.path.display(), source.status));
                }
                if report1.records != report2.records {
                    let msg = format!(
                        "R1 ({}) and R2 ({}) read counts do not match",
                        report1.records, report2.records
                    );
                    warn!("{}: {}", plan.target, msg);
                    result.warnings.push(msg);
                }
                result.r1_analysis = report1.analysis.clone();
                result.r2_analysis = report2.analysis.clone();
                result.source_reports = report1.sources.into_iter().chain(report2.sources).collect();
                info!(
                    "Combined {}: {} read pairs at {:.1} MB/s",
                    plan.output_name, result.r1_reads, result.speed_mb_per_sec
                );
                TargetOutcome::Completed
            }
            Err(e) if e.is_cancelled() => {
                warn!("Target {} cancelled; partial outputs removed", plan.target);
                TargetOutcome::Cancelled
            }
            Err(e) => {
                error!("Error processing {}: {}", plan.target, e);
                TargetOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Take counts and checksums from existing outputs, from the checkpoint when it
    /// still describes the same bytes, otherwise by reading the files again
    fn resume_target(&self, plan: &TargetPlan, result: &mut CombinationResult) -> Result<(), Error> {
        let checksum1 = checksum_file(&plan.r1_output)?;
        let checksum2 = checksum_file(&plan.r2_output)?;

        match self.completed.get(&plan.target) {
            Some(done) if done.r1_checksum == checksum1 && done.r2_checksum == checksum2 => {
                result.r1_reads = done.r1_reads;
                result.r2_reads = done.r2_reads;
            }
            _ => {
                let buffer_size = self.params.settings.buffer_size;
                result.r1_reads = count_records(&plan.r1_output, buffer_size)?;
                result.r2_reads = count_records(&plan.r2_output, buffer_size)?;
            }
        }
        result.r1_checksum = Some(checksum1);
        result.r2_checksum = Some(checksum2);
        Ok(())
    }

    /// True if every source is free of warnings
    fn validate_sources(&self, pairs: &[FilePair], result: &mut CombinationResult) -> bool {
        let files: Vec<&PathBuf> = pairs.iter().flat_map(|p| [&p.r1, &p.r2]).collect();
        let buffer_size = self.params.settings.buffer_size;
        let reports: Vec<_> = files
            .par_iter()
            .map(|path| (*path, validate_fastq(path, buffer_size)))
            .collect();

        let mut clean = true;
        for (path, report) in reports {
            let lines: Vec<String> = match report {
                Ok(report) if report.is_clean() => continue,
                Ok(report) => {
                    warn!(
                        "Validation of {} found {} warnings",
                        path.display(),
                        report.num_warnings
                    );
                    report.warnings
                }
                Err(e) => vec![e.to_string()],
            };
            clean = false;
            for line in lines {
                if result.warnings.len() < MAX_TARGET_WARNINGS {
                    result.warnings.push(format!("{}: {}", path.display(), line));
                }
            }
        }
        clean
    }

    /// Count records of both mates of every pair. A file that cannot be read counts as zero
    fn check_pair_counts(
        &self,
        pairs: &[FilePair],
        result: &mut CombinationResult,
    ) -> Vec<PairCountMismatch> {
        let buffer_size = self.params.settings.buffer_size;
        let counts: Vec<_> = pairs
            .par_iter()
            .map(|p| {
                (
                    count_records(&p.r1, buffer_size),
                    count_records(&p.r2, buffer_size),
                )
            })
            .collect();

        let mut count_or_zero = |count: Result<u64, Error>| match count {
            Ok(n) => n,
            Err(e) => {
                let msg = format!("Could not count records: {}", e);
                warn!("{}", msg);
                result.warnings.push(msg);
                0
            }
        };

        pairs
            .iter()
            .zip(counts)
            .filter_map(|(pair, (c1, c2))| {
                let n1 = count_or_zero(c1);
                let n2 = count_or_zero(c2);
                (n1 != n2).then(|| PairCountMismatch {
                    r1: pair.r1.clone(),
                    r1_records: n1,
                    r2: pair.r2.clone(),
                    r2_records: n2,
                })
            })
            .collect()
    }
}

///////////////////////////////
/// The combine pipeline: mapping, discovery, resolution, combination, reports
pub struct CombineTargets {}

impl CombineTargets {
    pub fn run(params: Arc<CombineParams>, cancel: CancelFlag) -> anyhow::Result<RunSummary> {
        let mapping = SampleMapping::read_mapping_file(&params.path_mapping)?;

        let discovery = FileDiscovery::new(&params.r1_patterns, &params.r2_patterns)?
            .scan(&params.search_dirs);
        if discovery.table.is_empty() {
            anyhow::bail!("No paired FASTQ files found in the search directories");
        }

        let resolution = MappingResolver::new(&discovery.table, params.fuzzy).resolve(&mapping);
        for sub in &resolution.fuzzy_substitutions {
            info!("Using '{}' for '{}' in target '{}'", sub.resolved, sub.declared, sub.target);
        }

        if !params.dry_run {
            fs::create_dir_all(&params.path_out)
                .map_err(|e| Error::output_not_creatable(&params.path_out, e))?;
            info!("Output directory: {}", params.path_out.display());
        }

        let previous = if params.resume {
            match Checkpoint::load(&params.path_out) {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    warn!("Ignoring checkpoint: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let mut completed = previous.map(|c| c.completed).unwrap_or_default();

        let plans = plan_targets(&resolution.targets, &discovery.table, &params.path_out);
        let orchestrator = Arc::new(TargetOrchestrator::new(
            Arc::clone(&params),
            cancel.clone(),
            completed.clone(),
        ));
        let results = orchestrator.run_all(plans);
        if cancel.is_cancelled() {
            warn!("Run was interrupted; unfinished targets are reported as cancelled");
        }

        let summary = RunSummary {
            timestamp: chrono::Local::now().to_rfc3339(),
            mapping_file: params.path_mapping.clone(),
            output_dir: params.path_out.clone(),
            dry_run: params.dry_run,
            results,
            resolution,
            discovery_warnings: discovery.warnings,
        };

        if params.dry_run {
            info!("Dry run complete; no files were written");
        } else {
            if params.write_csv {
                write_summary_csv(&params.path_out.join(SUMMARY_CSV_FILENAME), &summary.results)?;
            }
            if params.write_json {
                write_summary_json(&params.path_out.join(SUMMARY_JSON_FILENAME), &summary)?;
            }
            if params.checkpoint {
                for result in &summary.results {
                    if let Some(done) = completed_record(result) {
                        completed.insert(result.target.clone(), done);
                    }
                }
                let checkpoint = Checkpoint {
                    timestamp: summary.timestamp.clone(),
                    mapping,
                    file_pairs: discovery.table.to_map(),
                    completed,
                };
                checkpoint.save(&params.path_out)?;
            }
        }

        summary.log_summary();
        Ok(summary)
    }
}

fn completed_record(result: &CombinationResult) -> Option<CompletedTarget> {
    if !matches!(
        result.outcome,
        TargetOutcome::Completed | TargetOutcome::Resumed
    ) {
        return None;
    }
    Some(CompletedTarget {
        r1_output: result.r1_output.clone(),
        r2_output: result.r2_output.clone(),
        r1_reads: result.r1_reads,
        r2_reads: result.r2_reads,
        r1_checksum: result.r1_checksum.clone()?,
        r2_checksum: result.r2_checksum.clone()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_target_name() {
        assert_eq!(sanitize_target_name("Pool A-1"), "Pool_A_1");
        assert_eq!(sanitize_target_name("  liver__sample_S12 "), "liver_sample");
        assert_eq!(sanitize_target_name("x.y/z"), "xyz");
        assert_eq!(sanitize_target_name("_-_"), "");
        assert_eq!(sanitize_target_name("Probe_ü"), "Probe_ü");
        assert_eq!(sanitize_target_name("Leber Å-2"), "Leber_Å_2");
    }

    #[test]
    fn test_retry_with_backoff() {
        let mut calls = 0;
        let result = retry_with_backoff(3, Duration::ZERO, || {
            calls += 1;
            if calls < 2 {
                Err(Error::file_not_found("flaky.fq"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);

        let mut calls = 0;
        let result: Result<(), Error> = retry_with_backoff(3, Duration::ZERO, || {
            calls += 1;
            Err(Error::file_not_found("gone.fq"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);

        let mut calls = 0;
        let result: Result<(), Error> = retry_with_backoff(3, Duration::ZERO, || {
            calls += 1;
            Err(Error::Cancelled)
        });
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("Liver", 2), "Liver_S1_R2_001.fastq.gz");
    }

    use crate::combine::DedupMode;
    use crate::resolve::Provenance;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_fastq_gz(path: &Path, num_records: usize) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        for i in 0..num_records {
            write!(enc, "@read{}\nACGTACGT\n+\nFFFFFFFF\n", i).unwrap();
        }
        enc.finish().unwrap();
    }

    fn write_seqs_gz(path: &Path, seqs: &[&str]) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        for (i, seq) in seqs.iter().enumerate() {
            write!(enc, "@read{}\n{}\n+\n{}\n", i, seq, "F".repeat(seq.len())).unwrap();
        }
        enc.finish().unwrap();
    }

    fn write_sample(dir: &Path, key: &str, r1_records: usize, r2_records: usize) {
        write_fastq_gz(&dir.join(format!("{}_S1_R1_001.fastq.gz", key)), r1_records);
        write_fastq_gz(&dir.join(format!("{}_S1_R2_001.fastq.gz", key)), r2_records);
    }

    fn params_for(root: &Path, mapping: &str) -> CombineParams {
        let path_mapping = root.join("mapping.csv");
        fs::write(&path_mapping, mapping).unwrap();
        CombineParams {
            path_mapping,
            path_out: root.join("combined"),
            search_dirs: vec![root.join("input")],
            r1_patterns: Vec::new(),
            r2_patterns: Vec::new(),
            dry_run: false,
            force: false,
            resume: false,
            checkpoint: true,
            validate: false,
            create_backups: false,
            retry_attempts: 1,
            threads: 2,
            fuzzy: FuzzyStrategy::Substring,
            settings: CombinerSettings::default(),
            write_csv: true,
            write_json: true,
        }
    }

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("input")).unwrap();
        dir
    }

    fn run(params: &CombineParams) -> RunSummary {
        CombineTargets::run(Arc::new(params.clone()), CancelFlag::new()).unwrap()
    }

    #[test]
    fn test_combines_sources_into_target() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "SampleA", 3, 3);
        write_sample(&dir.path().join("input"), "SampleB", 2, 2);
        let params = params_for(dir.path(), "target,sources\nPool 1,SampleA,SampleB\n");

        let summary = run(&params);
        let result = summary.get("Pool 1").unwrap();
        assert_eq!(result.outcome, TargetOutcome::Completed);
        assert_eq!(result.output_name, "Pool_1");
        assert_eq!(result.r1_reads, 5);
        assert_eq!(result.r2_reads, 5);

        let out = params.path_out.join("Pool_1_S1_R1_001.fastq.gz");
        assert_eq!(count_records(&out, 8192).unwrap(), 5);
        assert_eq!(
            result.r1_checksum.as_deref(),
            Some(checksum_file(&out).unwrap().as_str())
        );
        assert!(params.path_out.join(SUMMARY_CSV_FILENAME).exists());
        assert!(params.path_out.join(SUMMARY_JSON_FILENAME).exists());
        assert!(Checkpoint::load(&params.path_out).unwrap().is_some());
        assert!(!summary.is_failure());
    }

    #[test]
    fn test_fuzzy_source_is_flagged() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "SampleA_extra", 2, 2);
        write_sample(&dir.path().join("input"), "Liver", 1, 1);
        let params = params_for(dir.path(), "T1,SampleA\nT2,Liver\n");

        let summary = run(&params);
        let fuzzy = &summary.get("T1").unwrap().sources[0];
        assert_eq!(fuzzy.key, "SampleA_extra");
        assert_eq!(fuzzy.provenance, Provenance::Fuzzy);
        assert_eq!(summary.get("T2").unwrap().sources[0].provenance, Provenance::Exact);
        assert_eq!(summary.resolution.fuzzy_substitutions.len(), 1);
    }

    #[test]
    fn test_pair_mismatch_needs_force() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Odd", 15, 10);
        let mut params = params_for(dir.path(), "Odd,Odd\n");

        let summary = run(&params);
        let result = summary.get("Odd").unwrap();
        assert_eq!(
            result.outcome,
            TargetOutcome::Skipped {
                reason: SkipReason::PairedEndMismatch
            }
        );
        assert_eq!(result.mismatches[0].r1_records, 15);
        assert_eq!(result.mismatches[0].r2_records, 10);
        assert!(!params.path_out.join("Odd_S1_R1_001.fastq.gz").exists());
        assert!(summary.is_failure());

        params.force = true;
        let summary = run(&params);
        let result = summary.get("Odd").unwrap();
        assert_eq!(result.outcome, TargetOutcome::Completed);
        assert_eq!(result.r1_reads, 15);
        assert_eq!(result.r2_reads, 10);
    }

    #[test]
    fn test_rerun_leaves_outputs_untouched() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Liver", 4, 4);
        let params = params_for(dir.path(), "Liver,Liver\n");
        run(&params);
        let out = params.path_out.join("Liver_S1_R1_001.fastq.gz");
        let before = fs::metadata(&out).unwrap().modified().unwrap();

        let summary = run(&params);
        let result = summary.get("Liver").unwrap();
        assert_eq!(
            result.outcome,
            TargetOutcome::Skipped {
                reason: SkipReason::FilesExist
            }
        );
        assert!(!summary.is_failure());
        assert_eq!(fs::metadata(&out).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_forced_rerun_is_deterministic() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Liver", 50, 50);
        let mut params = params_for(dir.path(), "Liver,Liver\n");
        params.force = true;

        let first = run(&params).get("Liver").unwrap().r1_checksum.clone();
        let second = run(&params).get("Liver").unwrap().r1_checksum.clone();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Liver", 2, 2);
        let mut params = params_for(dir.path(), "Liver,Liver\n");
        params.dry_run = true;

        let summary = run(&params);
        assert_eq!(
            summary.get("Liver").unwrap().outcome,
            TargetOutcome::DryRun {
                missing: Vec::new()
            }
        );
        assert!(!params.path_out.exists());
        assert!(!summary.is_failure());
    }

    #[test]
    fn test_resume_reuses_outputs() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Liver", 6, 6);
        let mut params = params_for(dir.path(), "Liver,Liver\n");
        let first = run(&params);

        params.resume = true;
        let summary = run(&params);
        let result = summary.get("Liver").unwrap();
        assert_eq!(result.outcome, TargetOutcome::Resumed);
        assert_eq!(result.r1_reads, 6);
        assert_eq!(result.r1_checksum, first.get("Liver").unwrap().r1_checksum);
    }

    #[test]
    fn test_conflicting_output_names() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Liver", 1, 1);
        let params = params_for(dir.path(), "Pool-A,Liver\nPool A,Liver\n");

        let summary = run(&params);
        assert_eq!(summary.get("Pool-A").unwrap().outcome, TargetOutcome::Completed);
        assert_eq!(
            summary.get("Pool A").unwrap().outcome,
            TargetOutcome::Skipped {
                reason: SkipReason::OutputNameConflict
            }
        );
    }

    #[test]
    fn test_dedup_limit_is_reported_per_target() {
        let dir = setup();
        let input = dir.path().join("input");
        let seqs = ["AAAA", "CCCC", "GGGG", "TTTT", "ACGT"];
        write_seqs_gz(&input.join("Liver_S1_R1_001.fastq.gz"), &seqs);
        write_seqs_gz(&input.join("Liver_S1_R2_001.fastq.gz"), &seqs);
        let mut params = params_for(dir.path(), "Liver,Liver\n");
        params.settings.dedup = DedupMode::Independent;
        params.settings.dedup_limit = 2;

        let summary = run(&params);
        let result = summary.get("Liver").unwrap();
        assert_eq!(result.outcome, TargetOutcome::Completed);
        assert_eq!(result.r1_reads, 5);
        assert!(result.dedup_exhausted);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Deduplication limit of 2")));
    }

    #[test]
    fn test_backups_are_created_once() {
        let dir = setup();
        let input = dir.path().join("input");
        write_sample(&input, "Liver", 3, 3);
        let mut params = params_for(dir.path(), "Liver,Liver\n");
        params.create_backups = true;
        params.retry_attempts = RETRY_ATTEMPTS;

        let source = input.join("Liver_S1_R1_001.fastq.gz");
        let backup = input.join("Liver_S1_R1_001.fastq.gz.backup");
        let summary = run(&params);
        assert_eq!(summary.get("Liver").unwrap().outcome, TargetOutcome::Completed);
        assert_eq!(fs::read(&backup).unwrap(), fs::read(&source).unwrap());
        assert!(input.join("Liver_S1_R2_001.fastq.gz.backup").exists());

        fs::write(&backup, b"older backup").unwrap();
        params.force = true;
        run(&params);
        assert_eq!(fs::read(&backup).unwrap(), b"older backup");
    }

    #[test]
    fn test_missing_mapping_is_an_error() {
        let dir = setup();
        write_sample(&dir.path().join("input"), "Liver", 1, 1);
        let mut params = params_for(dir.path(), "Liver,Liver\n");
        params.path_mapping = dir.path().join("absent.csv");
        assert!(CombineTargets::run(Arc::new(params), CancelFlag::new()).is_err());
    }
}
