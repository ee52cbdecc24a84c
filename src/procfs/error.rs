//! Structured errors for reading and parsing per-process proc files.
//!
//! [`StatParseError`] describes what went wrong inside a single file (with the
//! offending line number where one exists), while [`Error`] ties a failure to the
//! path it came from so log lines point at the exact `/proc/<pid>/...` entry.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::fsutil::FileReadError;

#[derive(Debug, Error)]
pub enum StatParseError {
    #[error("duplicate field '{field}' at line {line}")]
    DuplicateField { field: String, line: usize },

    #[error("invalid value for '{key}' at line {line}: '{value}': {source}")]
    InvalidKeyValue {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("unknown unit '{unit}' for '{key}' at line {line}")]
    UnknownUnit {
        key: String,
        unit: String,
        line: usize,
    },

    #[error("invalid value for field '{field}': '{value}': {source}")]
    InvalidField {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] FileReadError),

    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: StatParseError,
    },

    #[error("failed to list process directory `{path}`: {source}")]
    ListProcesses {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
