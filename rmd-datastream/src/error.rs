//! Error types for datastream decoding

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatastreamError {
    #[error("stream error: {0}")]
    Stream(#[from] rmd_stream::StreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected a container tag, found {found:#010X} ({dump})")]
    UnknownContainerTag { found: u32, dump: String },

    #[error("container close tag mismatch: expected {expected:#010X}, found {found:#010X}")]
    CloseTagMismatch { expected: u32, found: u32 },

    #[error("decoder for {type_key} consumed {read} of {len} payload bytes ({dump})")]
    UnderRead {
        type_key: String,
        read: usize,
        len: usize,
        dump: String,
    },

    #[error("{decoder}.{field} failed at object offset {offset} (near: {dump}): {source}")]
    Field {
        decoder: &'static str,
        field: &'static str,
        offset: usize,
        dump: String,
        #[source]
        source: Box<DatastreamError>,
    },

    #[error("check failed: expected {expected:?}, found {found:?}")]
    CheckFailed { expected: String, found: String },

    #[error("decoder {key} already registered as {existing}")]
    DuplicateDecoder { key: String, existing: &'static str },

    #[error("container binding used without a registry in scope")]
    NoRegistry,

    #[error("bad magic in {what}: expected {expected}, found {found}")]
    BadMagic {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("unsupported {what} version {version}")]
    UnsupportedVersion { what: &'static str, version: u32 },

    #[error("could not determine DP header variant (sizes {peeked:?} against file of {len} bytes)")]
    DpHeaderUndetermined { peeked: [u64; 4], len: usize },

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, DatastreamError>;
