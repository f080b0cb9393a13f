use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File at {:?} not found.", path)]
    FileNotFound { path: PathBuf },

    #[error("File at {:?} is invalid{}.", path, Error::format_msg_as_detail(msg))]
    FileNotValid { path: PathBuf, msg: Option<String> },

    #[error("Failed reading {:?}: {}", path, source)]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create output file {:?}: {}", path, source)]
    OutputNotCreatable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed writing {:?}: {}", path, source)]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mapping file {:?} could not be read{}", path, Error::format_msg_as_detail(msg))]
    MappingUnreadable { path: PathBuf, msg: Option<String> },

    #[error("Mapping file {:?} contains no targets with sources", path)]
    EmptyMapping { path: PathBuf },

    #[error("Failed parsing {}{}", context, Error::format_msg_as_detail(msg))]
    ParseError {
        context: String,
        msg: Option<String>,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    #[cold]
    pub fn file_not_found<P: AsRef<Path>>(path: P) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn file_not_valid<P: AsRef<Path>, M: Into<String>>(path: P, msg: Option<M>) -> Self {
        Error::FileNotValid {
            path: path.as_ref().to_path_buf(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn read_failed<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Error::ReadFailed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    #[cold]
    pub fn output_not_creatable<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Error::OutputNotCreatable {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    #[cold]
    pub fn write_failed<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Error::WriteFailed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    #[cold]
    pub fn mapping_unreadable<P: AsRef<Path>, M: Into<String>>(path: P, msg: Option<M>) -> Self {
        Error::MappingUnreadable {
            path: path.as_ref().to_path_buf(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn empty_mapping<P: AsRef<Path>>(path: P) -> Self {
        Error::EmptyMapping {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn parse_error<C: Into<String>, M: Into<String>>(context: C, msg: Option<M>) -> Self {
        Error::ParseError {
            context: context.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_formatting() {
        let e = Error::file_not_valid("reads.fq", Some("truncated"));
        assert_eq!(e.to_string(), "File at \"reads.fq\" is invalid (truncated).");

        let e = Error::file_not_valid::<_, String>("reads.fq", None);
        assert_eq!(e.to_string(), "File at \"reads.fq\" is invalid.");
    }
}
