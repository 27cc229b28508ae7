//! Byte-level plumbing shared by every Remedy package decoder.
//!
//! The central type is [`ByteStream`], a bounds-checked cursor over a byte
//! buffer that carries ambient decode state (endianness, signedness, integer
//! width, blob length). Formats in this family switch endianness and word
//! width mid-parse, so the ambient state is mutable and can be overridden for
//! a scope via [`ByteStream::scoped`].
//!
//! Also here: the [`StringCacheFile`] on-disk format used by the archive
//! readers to memoize name tables, LZ4 block inflation, and the
//! null-terminated-string-array back-scan needed by streamed-resource bins.

pub mod cache;
pub mod dump;
pub mod error;
pub mod nts_scan;
pub mod stream;

pub use cache::StringCacheFile;
pub use dump::{dump, dump_truncated, human_size};
pub use error::{Result, StreamError};
pub use nts_scan::find_nts_array_start;
pub use stream::{ByteStream, Endian, Overrides, StreamScope, Whence};
