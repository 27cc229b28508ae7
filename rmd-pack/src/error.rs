//! Error types for archive reading

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream error: {0}")]
    Stream(#[from] rmd_stream::StreamError),

    #[error("archive {0} does not exist")]
    ArchiveMissing(PathBuf),

    #[error("archive {0} is empty")]
    ArchiveEmpty(PathBuf),

    #[error("table sidecar {0} does not exist")]
    SidecarMissing(PathBuf),

    #[error("table sidecar {0} is empty")]
    SidecarEmpty(PathBuf),

    #[error("unknown archive minor version {0}")]
    UnknownMinor(u32),

    #[error("bad magic: expected {expected}, found {found}")]
    BadMagic { expected: String, found: String },

    #[error("unsupported archive extension on {0}")]
    UnsupportedExtension(PathBuf),

    #[error("{what} index {index} out of range")]
    IndexOutOfRange { what: &'static str, index: i64 },

    #[error("chunk at {offset}+{size} overruns archive {path} of {len} bytes")]
    ChunkOutOfRange {
        path: PathBuf,
        offset: u64,
        size: u64,
        len: u64,
    },

    #[error("{0} view is unavailable")]
    ViewUnavailable(&'static str),
}

pub type Result<T> = std::result::Result<T, PackError>;
