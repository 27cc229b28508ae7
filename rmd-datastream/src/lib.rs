//! Parsers for the structured object formats embedded in Remedy packages.
//!
//! Most payloads extracted from an archive are one of a small family of
//! binary shapes:
//!
//! - **Datastream containers** — self-describing envelopes bracketed by
//!   `DEADBEEF` (v1) or `D34DB33F` (v2) words, carrying a type hash and a
//!   version. Decoded through a [`Registry`] of `(hash, version)` keyed
//!   decoders; unrecognized keys come back as [`Decoded::Unknown`] with the
//!   raw payload preserved.
//! - **CID bins** — flat object batches dispatched by the file name's stem,
//!   optionally backed by a **DP side table** ([`DpFile`]) that stores the
//!   variable-length strings and lists the records reference by packed
//!   offsets.
//! - **PackMeta** sidecars, **RMDL** bundles, zlib **archive bins**,
//!   streamed-resource bins, and locale string tables.

pub mod binfile;
pub mod cid;
pub mod container;
pub mod decoders;
pub mod dp;
pub mod error;
pub mod fields;
pub mod objects;
pub mod packmeta;
pub mod registry;
pub mod rmdl;
pub mod types;

pub use container::{Container, ContainerKind, TAG_V1, TAG_V2};
pub use decoders::Decoded;
pub use dp::{DpFile, DpOffset};
pub use error::{DatastreamError, Result};
pub use fields::{DecodeCtx, FieldDriver};
pub use registry::{Registry, TypeKey, UnknownBinData};
pub use types::{BoundBox, Gid, Mat3, ObjectId, Rid, Vec2, Vec3};
