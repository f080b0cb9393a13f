use anyhow::{Context, Result};
use log::warn;
use path_clean::PathClean;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Expands ~ and env vars if possible (only for UTF-8 paths), and always returns an absolute PathBuf.
/// Does NOT fail if the file does not exist.
pub fn expand_and_resolve_path<P: AsRef<Path>>(input: P) -> Result<PathBuf> {
    let input = input.as_ref();
    let expanded: PathBuf = match input.to_str() {
        Some(s) => {
            if let Ok(expanded) = shellexpand::full(s) {
                PathBuf::from(expanded.as_ref())
            } else {
                warn!("Failed to expand path {:?}. Using original path.", input);
                input.to_path_buf()
            }
        }
        None => {
            warn!(
                "Path {:?} is not valid UTF-8. Skipping path expansion.",
                input
            );
            input.to_path_buf()
        }
    };
    absolute_path(expanded)
}

/// Canonical path if the file exists, otherwise a lexically cleaned absolute path
pub fn absolute_path<P: AsRef<Path>>(input: P) -> Result<PathBuf> {
    let input = input.as_ref();
    if let Ok(absolute) = fs::canonicalize(input) {
        return Ok(absolute);
    }
    let abs = if input.is_absolute() {
        input.to_path_buf()
    } else {
        env::current_dir()
            .context("Failed to get current directory")?
            .join(input)
    };
    Ok(abs.clean())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_is_cleaned() {
        let p = absolute_path("/no/such/dir/../file.fq").unwrap();
        assert_eq!(p, PathBuf::from("/no/such/file.fq"));
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let p = expand_and_resolve_path("some_relative_file.fq").unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("some_relative_file.fq"));
    }
}
