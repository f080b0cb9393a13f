use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::discover::{Discovery, FileDiscovery};
use crate::utils::expand_and_resolve_path;

#[derive(Args)]
pub struct DiscoverCMD {
    // Directories searched recursively. Defaults to the current directory
    #[arg(short = 'd', long = "search-dirs", num_args = 1.., value_parser)]
    pub search_dirs: Vec<PathBuf>,

    #[arg(long = "r1-pattern", value_parser)]
    pub r1_patterns: Vec<String>,

    #[arg(long = "r2-pattern", value_parser)]
    pub r2_patterns: Vec<String>,

    // TSV output; stdout if not given
    #[arg(short = 'o', long = "out", value_parser)]
    pub path_out: Option<PathBuf>,
}

impl DiscoverCMD {
    /// Run the commandline option.
    /// Lists sample key, mate-1 path and mate-2 path of every pair found
    pub fn try_execute(&mut self) -> Result<()> {
        let search_dirs = self
            .search_dirs
            .iter()
            .map(expand_and_resolve_path)
            .collect::<Result<Vec<_>>>()?;
        let discovery =
            FileDiscovery::new(&self.r1_patterns, &self.r2_patterns)?.scan(&search_dirs);

        match &self.path_out {
            Some(path) => {
                let path = expand_and_resolve_path(path)?;
                write_pair_table(File::create(&path)?, &discovery)?;
                info!("Wrote {} pairs to {}", discovery.table.len(), path.display());
            }
            None => write_pair_table(io::stdout().lock(), &discovery)?,
        }

        for path in &discovery.unpaired {
            info!("Unpaired: {}", path.display());
        }
        if discovery.table.is_empty() {
            anyhow::bail!("No paired FASTQ files found");
        }
        Ok(())
    }
}

/// Tab-separated `sample_key, r1, r2` with a header line
pub fn write_pair_table<W: Write>(out: W, discovery: &Discovery) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(out);
    writer.write_record(["sample_key", "r1", "r2"])?;
    for (key, pair) in discovery.table.iter() {
        writer.write_record([
            key.clone(),
            pair.r1.display().to_string(),
            pair.r2.display().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::{FilePair, SampleTable};

    #[test]
    fn test_pair_table() {
        let mut table = SampleTable::new();
        table.insert(
            "Liver".into(),
            FilePair {
                r1: "/d/Liver_R1.fq".into(),
                r2: "/d/Liver_R2.fq".into(),
            },
        );
        let discovery = Discovery {
            table,
            ..Default::default()
        };
        let mut out = Vec::new();
        write_pair_table(&mut out, &discovery).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "sample_key\tr1\tr2\nLiver\t/d/Liver_R1.fq\t/d/Liver_R2.fq\n"
        );
    }
}
