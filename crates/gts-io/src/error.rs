//! Error types for gts-io

use std::io;
use std::path::{Path, PathBuf};

use gts_model::{Cancelled, ValidationError};
use thiserror::Error;

use crate::options::TargetFormat;

pub type Result<T> = std::result::Result<T, WriteError>;

/// Writer option outside its recognized schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionError {
    #[error("unknown option '{key}' for {format}")]
    UnknownKey { format: TargetFormat, key: String },

    #[error("invalid value '{value}' for option '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("option '{key}' out of range: {message}")]
    OutOfRange { key: &'static str, message: String },

    #[error("unknown target format '{0}' (expected flac3d, abaqus or lsdyna)")]
    UnknownFormat(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("invalid options: {0}")]
    Option(#[from] OptionError),

    #[error("invalid model: {0}")]
    Validation(#[from] ValidationError),

    #[error("{format} cannot represent {what}")]
    Unsupported { format: TargetFormat, what: String },

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O failure on an output stream not yet tied to a path
    #[error("output stream error: {0}")]
    Stream(#[from] io::Error),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl WriteError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Attach the output path to a bare stream error.
    pub(crate) fn at_path(self, path: &Path) -> Self {
        match self {
            WriteError::Stream(source) => WriteError::io(path, source),
            other => other,
        }
    }
}
