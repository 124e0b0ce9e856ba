//! Reader for Midas GTS NX `.fpn` neutral files.
//!
//! The file is tokenized into keyword records (see [`grammar::GRAMMAR`]),
//! interpreted into a [`gts_model::MeshModel`], and forward references are
//! resolved once the whole input has been read. Any violation aborts the
//! read; no partial model is ever returned.

pub mod error;
pub mod grammar;
mod reader;
pub mod record;

pub use error::{ParseError, ReadError};
pub use reader::{read, read_str};
