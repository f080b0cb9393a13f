use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::resolve::FuzzyStrategy;
use crate::runtime::Error;

///////////////////////////////
/// Defaults for `combine`, read from a TOML file. Anything given on the command line wins
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CombineConfig {
    pub output_dir: Option<PathBuf>,
    pub search_dirs: Option<Vec<PathBuf>>,
    pub r1_patterns: Option<Vec<String>>,
    pub r2_patterns: Option<Vec<String>>,
    pub threads: Option<usize>,
    pub buffer_size: Option<usize>,
    pub compression_level: Option<u32>,
    pub fuzzy: Option<FuzzyStrategy>,
    pub dedup_limit: Option<usize>,

    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub checkpoint: bool,
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub create_backups: bool,
    #[serde(default)]
    pub retry_failed: bool,
    #[serde(default)]
    pub check_barcodes: bool,
    #[serde(default)]
    pub gc_analysis: bool,
    #[serde(default)]
    pub adapter_check: bool,
    #[serde(default)]
    pub deduplicate: bool,
    #[serde(default)]
    pub paired_end_dedup: bool,
    #[serde(default)]
    pub no_csv: bool,
    #[serde(default)]
    pub no_json: bool,
}

impl CombineConfig {
    pub fn from_toml_str(content: &str) -> Result<CombineConfig, Error> {
        toml::from_str(content)
            .map_err(|e| Error::parse_error("configuration file", Some(e.to_string())))
    }

    pub fn load(path: &Path) -> Result<CombineConfig, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::read_failed(path, e))?;
        let config = CombineConfig::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = CombineConfig::from_toml_str(
            r#"
            output_dir = "merged"
            search_dirs = ["run1", "run2"]
            threads = 8
            fuzzy = "ratio"
            deduplicate = true
            retry_failed = true
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, Some(PathBuf::from("merged")));
        assert_eq!(config.search_dirs.as_ref().map(|d| d.len()), Some(2));
        assert_eq!(config.threads, Some(8));
        assert_eq!(config.fuzzy, Some(FuzzyStrategy::Ratio));
        assert!(config.deduplicate);
        assert!(config.retry_failed);
        assert!(!config.create_backups);
        assert!(!config.force);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = CombineConfig::from_toml_str("profile = true\n");
        assert!(result.is_err());
    }
}
