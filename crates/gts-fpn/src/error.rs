//! Error types for gts-fpn

use std::io;
use std::path::PathBuf;

use gts_model::{Cancelled, ValidationError};
use thiserror::Error;

/// Malformed or unrecognized source grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    #[error("invalid model at line {line}: {source}")]
    Validation {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ReadError {
    /// Source line the error refers to, when there is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ReadError::Parse(err) => Some(err.line),
            ReadError::Validation { line, .. } if *line > 0 => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReadError>;
