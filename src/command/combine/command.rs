// This software is released under the MIT license.
// See file LICENSE for full license details.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use log::{info, warn};

use super::core::{CombineParams, CombineTargets, RETRY_ATTEMPTS};
use crate::combine::{
    AnalysisOptions, CombinerSettings, DedupMode, DEFAULT_COMPRESSION_LEVEL, DEFAULT_DEDUP_LIMIT,
};
use crate::command::determine_thread_counts_1;
use crate::fileformat::DEFAULT_BUFFER_SIZE;
use crate::resolve::FuzzyStrategy;
use crate::runtime::{CancelFlag, CombineConfig};
use crate::utils::expand_and_resolve_path;

pub const DEFAULT_PATH_OUT: &str = "combined";

#[derive(Args)]
pub struct CombineCMD {
    // CSV with target name in the first column and source sample names after it
    #[arg(value_parser)]
    pub path_mapping: PathBuf,

    // Directory for combined files and reports
    #[arg(short = 'o', long = "output-dir", value_parser)]
    pub path_out: Option<PathBuf>,

    // Directories searched recursively for FASTQ files. Defaults to the current directory
    #[arg(short = 'd', long = "search-dirs", num_args = 1.., value_parser)]
    pub search_dirs: Vec<PathBuf>,

    // Glob for mate-1 file names; may be given several times
    #[arg(long = "r1-pattern", value_parser)]
    pub r1_patterns: Vec<String>,

    // Glob that mate-2 file names must match; may be given several times
    #[arg(long = "r2-pattern", value_parser)]
    pub r2_patterns: Vec<String>,

    // TOML file with defaults for any of these options
    #[arg(long = "config", value_parser)]
    pub path_config: Option<PathBuf>,

    // Only check inputs, write nothing
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    // Overwrite existing outputs and combine despite integrity warnings
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    // Accept existing outputs from an earlier run
    #[arg(long = "resume")]
    pub resume: bool,

    // Save a checkpoint file in the output directory
    #[arg(long = "checkpoint")]
    pub checkpoint: bool,

    #[arg(short = 't', long = "threads", value_parser = clap::value_parser!(usize))]
    pub threads: Option<usize>,

    // Read and write buffer size in bytes
    #[arg(long = "buffer-size", value_parser = clap::value_parser!(usize))]
    pub buffer_size: Option<usize>,

    // gzip level of the outputs, 0-9
    #[arg(long = "compression-level", value_parser = clap::value_parser!(u32))]
    pub compression_level: Option<u32>,

    // Check every source for malformed records before combining
    #[arg(long = "validate")]
    pub validate: bool,

    // Copy each source to <file>.backup before reading it
    #[arg(long = "create-backups")]
    pub create_backups: bool,

    // Try a failed target again, up to three times with growing delays
    #[arg(long = "retry-failed")]
    pub retry_failed: bool,

    #[arg(long = "check-barcodes")]
    pub check_barcodes: bool,

    #[arg(long = "gc-analysis")]
    pub gc_analysis: bool,

    #[arg(long = "adapter-check")]
    pub adapter_check: bool,

    // Drop reads whose sequence was already written. Mates are always dropped together
    #[arg(long = "deduplicate")]
    pub deduplicate: bool,

    // Decide duplicates on mate 1 and drop both mates together
    #[arg(long = "paired-end-dedup")]
    pub paired_end_dedup: bool,

    // Most sequences remembered for deduplication
    #[arg(long = "dedup-limit", value_parser = clap::value_parser!(usize))]
    pub dedup_limit: Option<usize>,

    // How to match sample names that are not found exactly
    #[arg(long = "fuzzy", value_enum)]
    pub fuzzy: Option<FuzzyStrategy>,

    #[arg(long = "no-csv")]
    pub no_csv: bool,

    #[arg(long = "no-json")]
    pub no_json: bool,
}

impl CombineCMD {
    /// Run the commandline option.
    /// Finds the FASTQ pairs of every target in the mapping and writes one combined pair per target
    pub fn try_execute(&mut self) -> Result<()> {
        let config = match &self.path_config {
            Some(path) => CombineConfig::load(&expand_and_resolve_path(path)?)?,
            None => CombineConfig::default(),
        };
        let params = self.merge_config(config)?;

        let cancel = CancelFlag::new();
        let handler_flag = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            warn!("Interrupt received; finishing without starting new targets");
            handler_flag.cancel();
        }) {
            warn!("Could not install interrupt handler: {}", e);
        }

        let summary = CombineTargets::run(Arc::new(params), cancel)?;
        if summary.is_failure() {
            anyhow::bail!("No target was combined successfully");
        }
        Ok(())
    }

    /// Command line values win over the config file; flags are set if either sets them
    pub fn merge_config(&self, config: CombineConfig) -> Result<CombineParams> {
        let threads = determine_thread_counts_1(self.threads.or(config.threads))?;

        let compression_level = self
            .compression_level
            .or(config.compression_level)
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if compression_level > 9 {
            anyhow::bail!("Compression level must be between 0 and 9, got {}", compression_level);
        }

        let buffer_size = self
            .buffer_size
            .or(config.buffer_size)
            .unwrap_or(DEFAULT_BUFFER_SIZE);
        if buffer_size == 0 {
            anyhow::bail!("Buffer size must be positive");
        }

        let paired_end_dedup = self.paired_end_dedup || config.paired_end_dedup;
        let dedup = if paired_end_dedup {
            DedupMode::PairedAware
        } else if self.deduplicate || config.deduplicate {
            DedupMode::Independent
        } else {
            DedupMode::Off
        };

        let path_out = self
            .path_out
            .clone()
            .or(config.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH_OUT));
        let search_dirs = if self.search_dirs.is_empty() {
            config.search_dirs.unwrap_or_default()
        } else {
            self.search_dirs.clone()
        };
        let r1_patterns = if self.r1_patterns.is_empty() {
            config.r1_patterns.unwrap_or_default()
        } else {
            self.r1_patterns.clone()
        };
        let r2_patterns = if self.r2_patterns.is_empty() {
            config.r2_patterns.unwrap_or_default()
        } else {
            self.r2_patterns.clone()
        };

        let params = CombineParams {
            path_mapping: expand_and_resolve_path(&self.path_mapping)?,
            path_out: expand_and_resolve_path(&path_out)?,
            search_dirs: search_dirs
                .iter()
                .map(expand_and_resolve_path)
                .collect::<Result<Vec<_>>>()?,
            r1_patterns,
            r2_patterns,
            dry_run: self.dry_run || config.dry_run,
            force: self.force || config.force,
            resume: self.resume || config.resume,
            checkpoint: self.checkpoint || config.checkpoint,
            validate: self.validate || config.validate,
            create_backups: self.create_backups || config.create_backups,
            retry_attempts: if self.retry_failed || config.retry_failed {
                RETRY_ATTEMPTS
            } else {
                1
            },
            threads,
            fuzzy: self.fuzzy.or(config.fuzzy).unwrap_or_default(),
            settings: CombinerSettings {
                buffer_size,
                compression_level,
                dedup,
                dedup_limit: self
                    .dedup_limit
                    .or(config.dedup_limit)
                    .unwrap_or(DEFAULT_DEDUP_LIMIT),
                analysis: AnalysisOptions {
                    barcodes: self.check_barcodes || config.check_barcodes,
                    gc_content: self.gc_analysis || config.gc_analysis,
                    adapters: self.adapter_check || config.adapter_check,
                },
            },
            write_csv: !(self.no_csv || config.no_csv),
            write_json: !(self.no_json || config.no_json),
        };
        info!(
            "Combining with {} threads, buffer {} bytes, dedup {:?}, fuzzy matching {:?}",
            params.threads, params.settings.buffer_size, params.settings.dedup, params.fuzzy
        );
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        cmd: CombineCMD,
    }

    fn parse(args: &[&str]) -> CombineCMD {
        TestCli::parse_from(std::iter::once("fqcombine").chain(args.iter().copied())).cmd
    }

    #[test]
    fn test_cli_wins_over_config() {
        let cmd = parse(&["map.csv", "-t", "2", "--fuzzy", "ratio", "--gc-analysis"]);
        let config = CombineConfig::from_toml_str(
            "threads = 8\nfuzzy = \"substring\"\nforce = true\nbuffer_size = 4096\n",
        )
        .unwrap();
        let params = cmd.merge_config(config).unwrap();
        assert_eq!(params.threads, 2);
        assert_eq!(params.fuzzy, FuzzyStrategy::Ratio);
        assert!(params.force);
        assert!(params.settings.analysis.gc_content);
        assert_eq!(params.settings.buffer_size, 4096);
        assert!(params.path_out.ends_with(DEFAULT_PATH_OUT));
    }

    #[test]
    fn test_paired_end_dedup_implies_dedup() {
        let params = parse(&["map.csv", "--paired-end-dedup"])
            .merge_config(CombineConfig::default())
            .unwrap();
        assert_eq!(params.settings.dedup, DedupMode::PairedAware);
        assert_eq!(params.threads, 4);
    }

    #[test]
    fn test_deduplicate_and_retry_flags() {
        let params = parse(&["map.csv", "--deduplicate", "--retry-failed"])
            .merge_config(CombineConfig::default())
            .unwrap();
        assert_eq!(params.settings.dedup, DedupMode::Independent);
        assert_eq!(params.retry_attempts, RETRY_ATTEMPTS);
        assert!(!params.create_backups);

        let config = CombineConfig::from_toml_str("create_backups = true\n").unwrap();
        let params = parse(&["map.csv"]).merge_config(config).unwrap();
        assert_eq!(params.settings.dedup, DedupMode::Off);
        assert_eq!(params.retry_attempts, 1);
        assert!(params.create_backups);
    }

    #[test]
    fn test_bad_compression_level() {
        let result = parse(&["map.csv", "--compression-level", "12"])
            .merge_config(CombineConfig::default());
        assert!(result.is_err());
    }
}
