use std::fmt;

use clap::Subcommand;

use crate::command;

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand)]
pub enum Commands {
    /// Discover, match and combine paired FASTQ files per target sample
    Combine(command::CombineCMD),
    /// List the paired FASTQ files found in the search directories
    Discover(command::DiscoverCMD),
    /// Check FASTQ files for malformed records
    Validate(command::ValidateCMD),
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = match self {
            Commands::Combine(_) => "Combine",
            Commands::Discover(_) => "Discover",
            Commands::Validate(_) => "Validate",
        };
        write!(f, "{}", cmd)
    }
}
