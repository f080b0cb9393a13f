use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::{info, warn};
use rayon::prelude::*;

use crate::fileformat::{
    validate_fastq, verify_input_fq_file, ValidationReport, DEFAULT_BUFFER_SIZE,
};
use crate::utils::expand_and_resolve_path;

#[derive(Args)]
pub struct ValidateCMD {
    // FASTQ files to check, plain or compressed
    #[arg(required = true, value_parser)]
    pub paths_in: Vec<PathBuf>,

    #[arg(long = "buffer-size", value_parser = clap::value_parser!(usize))]
    pub buffer_size: Option<usize>,

    // Exit with an error if any file has warnings
    #[arg(long = "strict")]
    pub strict: bool,
}

impl ValidateCMD {
    /// Run the commandline option.
    /// Reads every record of each file and reports anomalies
    pub fn try_execute(&mut self) -> Result<()> {
        let buffer_size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let paths = self
            .paths_in
            .iter()
            .map(expand_and_resolve_path)
            .collect::<Result<Vec<_>>>()?;

        let reports: Vec<_> = paths
            .par_iter()
            .map(|path| {
                verify_input_fq_file(path).and_then(|_| validate_fastq(path, buffer_size))
            })
            .collect();

        let mut stdout = io::stdout().lock();
        let mut num_failed = 0;
        let mut num_with_warnings = 0;
        for (path, report) in paths.iter().zip(reports) {
            match report {
                Ok(report) => {
                    if !report.is_clean() {
                        num_with_warnings += 1;
                    }
                    write_report(&mut stdout, &report)?;
                }
                Err(e) => {
                    warn!("Cannot validate {}: {}", path.display(), e);
                    writeln!(stdout, "{}\tunreadable\t{}", path.display(), e)?;
                    num_failed += 1;
                }
            }
        }
        info!(
            "Validated {} files: {} with warnings, {} unreadable",
            paths.len(),
            num_with_warnings,
            num_failed
        );

        if num_failed > 0 {
            anyhow::bail!("{} files could not be read", num_failed);
        }
        if self.strict && num_with_warnings > 0 {
            anyhow::bail!("{} files have validation warnings", num_with_warnings);
        }
        Ok(())
    }
}

fn write_report<W: Write>(out: &mut W, report: &ValidationReport) -> io::Result<()> {
    let encoding = match report.encoding() {
        Some(e) => format!("{:?}", e),
        None => "mixed".to_string(),
    };
    writeln!(
        out,
        "{}\t{} records\t{} warnings\t{}",
        report.path.display(),
        report.records,
        report.num_warnings,
        encoding
    )?;
    for warning in &report.warnings {
        writeln!(out, "  {}", warning)?;
    }
    if report.num_warnings > report.warnings.len() {
        writeln!(
            out,
            "  ... {} more",
            report.num_warnings - report.warnings.len()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_write_report() {
        let report = crate::fileformat::validate::validate_reader(
            "@r1\nACGT\n+\nFFF\n".as_bytes(),
            Path::new("x.fq"),
        )
        .unwrap();
        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("x.fq\t1 records\t1 warnings\tAmbiguous"));
        assert!(text.contains("length mismatch"));
    }
}
