use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use log::LevelFilter;

use crate::utils::expand_and_resolve_path;

pub const DEFAULT_LOG_PATH: &str = "fqcombine.log";

#[derive(Clone, Copy, Debug)]
pub struct LogLevel(pub LevelFilter);
impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" | "critical" | "crit" => LevelFilter::Error,
            "off" | "none" => LevelFilter::Off,
            _ => return Err(format!("Invalid log level: {}", s)),
        };
        Ok(LogLevel(level))
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Both,
    Path,
    Terminal,
    Discard,
}
impl std::str::FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s.to_lowercase().as_str() {
            "both" => LogMode::Both,
            "path" | "file" => LogMode::Path,
            "terminal" | "term" | "cli" => LogMode::Terminal,
            "discard" | "none" => LogMode::Discard,
            _ => return Err(format!("Invalid log mode: {}", s)),
        };
        Ok(mode)
    }
}

/// Sends every log line to stderr and to the log file
struct TeeWriter {
    file: File,
}
impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(log_path: PathBuf) -> anyhow::Result<File> {
    let path = expand_and_resolve_path(log_path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", path.display(), e))?;
    Ok(file)
}

pub fn setup_global_logger(
    log_level: LogLevel,
    log_output: LogMode,
    log_path: PathBuf,
) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level.0);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}][{}] {}",
            buf.timestamp_seconds(),
            record.level(),
            record.args()
        )
    });

    match log_output {
        LogMode::Discard => {
            builder.filter_level(LevelFilter::Off);
        }
        LogMode::Terminal => {
            builder.target(env_logger::Target::Stderr);
        }
        LogMode::Path => {
            let file = open_log_file(log_path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        LogMode::Both => {
            let file = open_log_file(log_path)?;
            builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
        }
    }

    builder
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logger already initialised: {}", e))?;
    Ok(())
}
