use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use super::result::{CombinationResult, RunSummary};
use crate::runtime::Error;

pub const SUMMARY_CSV_HEADER: [&str; 12] = [
    "Target",
    "R1 Output",
    "R2 Output",
    "R1 Reads",
    "R2 Reads",
    "Processing Time (s)",
    "Speed (MB/s)",
    "Skipped",
    "Error",
    "Paired-End Mismatches",
    "R1 Checksum",
    "R2 Checksum",
];

/// One row per target, in mapping order
pub fn write_summary_csv(path: &Path, results: &[CombinationResult]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::output_not_creatable(path, e.into()))?;
    writer
        .write_record(SUMMARY_CSV_HEADER)
        .map_err(|e| Error::write_failed(path, e.into()))?;

    for r in results {
        writer
            .write_record([
                r.target.clone(),
                r.r1_output.display().to_string(),
                r.r2_output.display().to_string(),
                r.r1_reads.to_string(),
                r.r2_reads.to_string(),
                format!("{:.2}", r.elapsed_secs),
                format!("{:.2}", r.speed_mb_per_sec),
                r.skipped().to_string(),
                r.outcome.reason(),
                r.mismatches.len().to_string(),
                r.r1_checksum.clone().unwrap_or_default(),
                r.r2_checksum.clone().unwrap_or_default(),
            ])
            .map_err(|e| Error::write_failed(path, e.into()))?;
    }
    writer.flush().map_err(|e| Error::write_failed(path, e))?;
    info!("Summary written to {}", path.display());
    Ok(())
}

/// The whole run, including unresolved sources and fuzzy substitutions
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), Error> {
    let file = File::create(path).map_err(|e| Error::output_not_creatable(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)
        .map_err(|e| Error::write_failed(path, e.into()))?;
    writer.flush().map_err(|e| Error::write_failed(path, e))?;
    info!("JSON summary written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::combine::result::{SkipReason, TargetOutcome};
    use crate::resolve::Resolution;
    use std::path::PathBuf;

    fn result(target: &str, outcome: TargetOutcome) -> CombinationResult {
        CombinationResult::new(
            target,
            target,
            PathBuf::from(format!("{}_S1_R1_001.fastq.gz", target)),
            PathBuf::from(format!("{}_S1_R2_001.fastq.gz", target)),
            Vec::new(),
        )
        .with_outcome(outcome)
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let mut done = result("a", TargetOutcome::Completed);
        done.r1_reads = 5;
        done.r2_reads = 5;
        done.r1_checksum = Some("ff".into());
        let skipped = result(
            "b",
            TargetOutcome::Skipped {
                reason: SkipReason::FilesExist,
            },
        );
        write_summary_csv(&path, &[done, skipped]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 12);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][3], "5");
        assert_eq!(&rows[0][7], "false");
        assert_eq!(&rows[0][10], "ff");
        assert_eq!(&rows[1][7], "true");
        assert_eq!(&rows[1][8], "files_exist");
    }

    #[test]
    fn test_json_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary {
            timestamp: "now".into(),
            mapping_file: "map.csv".into(),
            output_dir: dir.path().to_path_buf(),
            dry_run: false,
            results: vec![result("a", TargetOutcome::Cancelled)],
            resolution: Resolution::default(),
            discovery_warnings: Vec::new(),
        };
        write_summary_json(&path, &summary).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["results"][0]["outcome"], "cancelled");
        assert_eq!(value["results"][0]["target"], "a");
    }
}
