use std::fmt;
use std::path::PathBuf;

use log::info;
use serde::Serialize;

use crate::combine::{AnalysisSummary, SourceReport};
use crate::resolve::{Resolution, ResolvedSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// An output file is already there and overwriting was not forced
    FilesExist,
    PairedEndMismatch,
    NoReadableSources,
    /// Another target sanitises to the same output name
    OutputNameConflict,
    InvalidName,
    ValidationFailed,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::FilesExist => "files_exist",
            SkipReason::PairedEndMismatch => "paired_end_mismatch",
            SkipReason::NoReadableSources => "no_readable_sources",
            SkipReason::OutputNameConflict => "output_name_conflict",
            SkipReason::InvalidName => "invalid_name",
            SkipReason::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    Completed,
    /// Existing outputs were accepted as the result of an earlier run
    Resumed,
    /// Nothing written; lists inputs that are missing or unreadable
    DryRun { missing: Vec<PathBuf> },
    Skipped { reason: SkipReason },
    Failed { error: String },
    Cancelled,
}

impl TargetOutcome {
    /// Existing outputs left in place by a non-forced rerun count as success
    pub fn is_success(&self) -> bool {
        match self {
            TargetOutcome::Completed | TargetOutcome::Resumed => true,
            TargetOutcome::DryRun { missing } => missing.is_empty(),
            TargetOutcome::Skipped { reason } => *reason == SkipReason::FilesExist,
            TargetOutcome::Failed { .. } | TargetOutcome::Cancelled => false,
        }
    }

    pub fn is_skipped(&self) -> bool {
        !matches!(
            self,
            TargetOutcome::Completed | TargetOutcome::Resumed | TargetOutcome::DryRun { .. }
        )
    }

    /// Skip or error reason as shown in reports, empty when there is none
    pub fn reason(&self) -> String {
        match self {
            TargetOutcome::Completed | TargetOutcome::Resumed => String::new(),
            TargetOutcome::DryRun { missing } if missing.is_empty() => String::new(),
            TargetOutcome::DryRun { missing } => format!("{} inputs missing", missing.len()),
            TargetOutcome::Skipped { reason } => reason.code().to_string(),
            TargetOutcome::Failed { error } => error.clone(),
            TargetOutcome::Cancelled => "cancelled".to_string(),
        }
    }

    fn reason_or(&self, default: &str) -> String {
        let reason = self.reason();
        if reason.is_empty() {
            default.to_string()
        } else {
            reason
        }
    }
}

/// Source pair whose mate files hold different numbers of records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCountMismatch {
    pub r1: PathBuf,
    pub r1_records: u64,
    pub r2: PathBuf,
    pub r2_records: u64,
}

///////////////////////////////
/// Everything known about one target after it was processed
#[derive(Debug, Clone, Serialize)]
pub struct CombinationResult {
    pub target: String,
    pub output_name: String,
    pub r1_output: PathBuf,
    pub r2_output: PathBuf,
    pub sources: Vec<ResolvedSource>,
    pub r1_reads: u64,
    pub r2_reads: u64,
    pub elapsed_secs: f64,
    pub speed_mb_per_sec: f64,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
    pub mismatches: Vec<PairCountMismatch>,
    pub warnings: Vec<String>,
    pub r1_checksum: Option<String>,
    pub r2_checksum: Option<String>,
    pub duplicates_removed: u64,
    /// The dedup limit was reached and later duplicates went through
    pub dedup_exhausted: bool,
    pub source_reports: Vec<SourceReport>,
    pub r1_analysis: Option<AnalysisSummary>,
    pub r2_analysis: Option<AnalysisSummary>,
}

impl CombinationResult {
    pub fn new(
        target: &str,
        output_name: &str,
        r1_output: PathBuf,
        r2_output: PathBuf,
        sources: Vec<ResolvedSource>,
    ) -> CombinationResult {
        CombinationResult {
            target: target.to_string(),
            output_name: output_name.to_string(),
            r1_output,
            r2_output,
            sources,
            r1_reads: 0,
            r2_reads: 0,
            elapsed_secs: 0.0,
            speed_mb_per_sec: 0.0,
            outcome: TargetOutcome::Cancelled,
            mismatches: Vec::new(),
            warnings: Vec::new(),
            r1_checksum: None,
            r2_checksum: None,
            duplicates_removed: 0,
            dedup_exhausted: false,
            source_reports: Vec::new(),
            r1_analysis: None,
            r2_analysis: None,
        }
    }

    pub fn with_outcome(mut self, outcome: TargetOutcome) -> CombinationResult {
        self.outcome = outcome;
        self
    }

    /// Read pairs in the combined output
    pub fn total_reads(&self) -> u64 {
        self.r1_reads
    }

    pub fn skipped(&self) -> bool {
        self.outcome.is_skipped()
    }
}

///////////////////////////////
/// Outcome of a whole combine run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub mapping_file: PathBuf,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub results: Vec<CombinationResult>,
    pub resolution: Resolution,
    pub discovery_warnings: Vec<String>,
}

impl RunSummary {
    pub fn num_succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn num_skipped(&self) -> usize {
        self.results.iter().filter(|r| r.skipped()).count()
    }

    pub fn total_reads(&self) -> u64 {
        self.results.iter().map(|r| r.total_reads()).sum()
    }

    /// The run fails only when not a single target succeeded
    pub fn is_failure(&self) -> bool {
        self.num_succeeded() == 0
    }

    pub fn get(&self, target: &str) -> Option<&CombinationResult> {
        self.results.iter().find(|r| r.target == target)
    }

    pub fn log_summary(&self) {
        info!("Combination summary:");
        for result in &self.results {
            match &result.outcome {
                TargetOutcome::Completed | TargetOutcome::Resumed => info!(
                    "  {} -> {}: {} read pairs",
                    result.target, result.output_name, result.r1_reads
                ),
                outcome => info!("  {}: {}", result.target, outcome.reason_or("ok")),
            }
        }
        info!(
            "Targets: {} total, {} succeeded, {} skipped; {} read pairs written",
            self.results.len(),
            self.num_succeeded(),
            self.num_skipped(),
            self.total_reads()
        );
    }
}
