//! Error types for stream operations

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read of {requested} bytes out of bounds (remaining {remaining}, pos {pos}, len {len})")]
    OutOfBounds {
        requested: usize,
        remaining: usize,
        pos: usize,
        len: usize,
    },

    #[error("seek target {target} outside stream of {len} bytes")]
    SeekOutOfRange { target: i64, len: usize },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        offset: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("LZ4 block decode failed: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    #[error("no name-array start matched {count} null-terminated strings")]
    NtsArrayNotFound { count: usize },

    #[error("string cache {path} is malformed: {reason}")]
    MalformedCache { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, StreamError>;
