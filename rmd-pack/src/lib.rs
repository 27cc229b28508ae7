//! Archive readers and a unified virtual filesystem for Remedy packages.
//!
//! Two on-disk generations exist. The first (`.rmdp` content shard plus a
//! `.bin` table sidecar) spans minors 2/3/7/8/9, differing in record width,
//! byte order, and whether files carry write times. The second (`.rmdtoc`)
//! stores every table inside an LZ4-compressed TOC and spreads content over
//! sibling archive shards.
//!
//! [`Admin`] hides the difference: it owns the generation-specific
//! [`Reader`] and exposes normalized folder/file/chunk/archive tables with
//! path composition, chunk-assembled file reads, and export caching.

pub mod error;
pub mod instance;
pub mod layout;
pub mod reader;
pub mod vfs;

pub use error::{PackError, Result};
pub use instance::Instance;
pub use reader::{NameKind, Reader};
pub use vfs::{
    Admin, AdminSummary, ArchiveRef, Chunk, Compression, DataAdmin, File, Folder, MetaAdmin,
    PathMode, TreeAdmin,
};
