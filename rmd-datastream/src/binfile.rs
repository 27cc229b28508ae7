//! Classification and decoding of the miscellaneous `.bin` payloads found
//! inside archives.
//!
//! A bin is told apart by name and leading bytes: locale string tables by
//! exact name, framed containers and streamed-resource bins and RMDL bundles
//! by magic, DP and CID bins by name prefix, and everything else is an
//! archive bin (a zlib stream of concatenated subfiles behind a name/size
//! table).

use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;

use flate2::read::ZlibDecoder;
use parking_lot::Mutex;
use tracing::{debug, info};

use rmd_stream::{ByteStream, Whence, find_nts_array_start};

use crate::cid::CidBin;
use crate::container::Container;
use crate::dp::DpFile;
use crate::error::{DatastreamError, Result};
use crate::objects::{
    FileInfoMetadataRecV1, FoliageMeshMetadataRecV1, HavokAnimationMetadataRecV1,
    MeshMetadataRecV1, ParticleSystemMetadataRecV1, TextureMetadataRecV1,
};
use crate::registry::Registry;
use crate::rmdl::RmdlBundle;
use crate::types::Rid;

/// CID bins whose interior is raw geometry/navigation data rather than
/// records; kept unparsed.
const ALT_CID_NAMES: &[&str] = &[
    "cid_solidbsp.bin",
    "cid_terraindata.bin",
    "cid_aofield.bin",
    "cid_coverpoints.bin",
    "cid_pathfindingmesh.bin",
    "cid_foliagedata.bin",
    "cid_roadmap.bin",
];

/// Magic of streamed-resource bins, as stored little-endian.
pub const STREAMED_MAGIC: u32 = 0xBADF000D;

/// Any of the bin shapes [`classify`] can produce.
pub enum BinFile {
    StringTable(StringTableBin),
    Container(Box<Container>),
    StreamedResource(StreamedResourceBin),
    Rmdl(RmdlBundle),
    Dp(DpFile),
    /// Known raw-interior CID bin, kept as bytes.
    AltCid { name: String, data: Vec<u8> },
    Cid(CidBin),
    Archive(ArchiveBin),
}

/// Dispatch a bin payload to its parser by name and magic.
pub fn classify(name: &str, data: &[u8], registry: &Registry) -> Result<BinFile> {
    if name == "string_table.bin" {
        return Ok(BinFile::StringTable(StringTableBin::parse(name, data)?));
    }

    if data.len() >= 4 {
        let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if word == crate::container::TAG_V1 || word == crate::container::TAG_V2 {
            let mut stream = ByteStream::new(data);
            return Ok(BinFile::Container(Box::new(Container::parse(
                &mut stream,
                registry,
            )?)));
        }
        if word == STREAMED_MAGIC {
            return Ok(BinFile::StreamedResource(StreamedResourceBin::parse(
                name, data,
            )?));
        }
        if &data[..4] == b"RMDL" {
            return Ok(BinFile::Rmdl(RmdlBundle::parse(data, registry)?));
        }
    }

    if name.contains("dp_") {
        return Ok(BinFile::Dp(DpFile::parse(name, data)?));
    }
    if name.contains("cid_") {
        if ALT_CID_NAMES.iter().any(|alt| name.contains(alt)) {
            return Ok(BinFile::AltCid {
                name: name.to_owned(),
                data: data.to_vec(),
            });
        }
        return Ok(BinFile::Cid(CidBin::parse(name, data)?));
    }
    Ok(BinFile::Archive(ArchiveBin::parse(name, data)?))
}

/// Subfile of an archive bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinnedEntry {
    pub name: String,
    pub size: usize,
    /// Offset inside the inflated payload.
    pub offset: usize,
    pub data: Vec<u8>,
}

/// Zlib-compressed concatenation of named subfiles.
pub struct ArchiveBin {
    pub name: String,
    pub entries: Vec<BinnedEntry>,
}

impl ArchiveBin {
    pub fn parse(name: &str, data: &[u8]) -> Result<ArchiveBin> {
        let mut stream = ByteStream::new(data);
        let count = stream.u32()? as usize;
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            let entry_name = stream.istr()?;
            let size = stream.u32()? as usize;
            table.push((entry_name, size));
        }

        let mut inflated = Vec::new();
        ZlibDecoder::new(stream.read(stream.remaining())?).read_to_end(&mut inflated)?;

        let mut entries = Vec::with_capacity(count);
        let mut cursor = 0usize;
        for (entry_name, size) in table {
            let end = cursor
                .checked_add(size)
                .filter(|end| *end <= inflated.len())
                .ok_or_else(|| DatastreamError::Malformed {
                    what: "archive bin",
                    reason: format!("subfile {entry_name} overruns the inflated payload"),
                })?;
            entries.push(BinnedEntry {
                name: entry_name,
                size,
                offset: cursor,
                data: inflated[cursor..end].to_vec(),
            });
            cursor = end;
        }
        Ok(ArchiveBin {
            name: name.to_owned(),
            entries,
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn size_sum(&self) -> usize {
        self.entries.iter().map(|e| e.size).sum()
    }

    pub fn subfile(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }
}

/// Per-resource metadata, selected by the bin's `(v1, v2)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceMetadata {
    None,
    Raw(Vec<u8>),
    ParticleSystem(ParticleSystemMetadataRecV1),
    FoliageMesh(FoliageMeshMetadataRecV1),
    Texture(TextureMetadataRecV1),
    HavokAnimation(HavokAnimationMetadataRecV1),
    Mesh(MeshMetadataRecV1),
    Unknown { v1: u32, v2: u32, data: Vec<u8> },
}

/// One streamed resource: id, name-array offset, file info, metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedResource {
    pub rid: Rid,
    pub offset: u32,
    pub file_info: FileInfoMetadataRecV1,
    pub metadata: ResourceMetadata,
    pub name: String,
}

/// Cache of back-solved name-array entry sizes, keyed by
/// `{file}_{v1}_{v2}`. Process-wide: a pair solved once never needs the
/// tail scan again.
fn datapairs() -> &'static Mutex<HashMap<String, usize>> {
    static DATAPAIRS: OnceLock<Mutex<HashMap<String, usize>>> = OnceLock::new();
    DATAPAIRS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub struct StreamedResourceBin {
    pub name: String,
    pub version: u32,
    pub v1: u32,
    pub v2: u32,
    pub resources: Vec<StreamedResource>,
    pub name_size: usize,
    /// Average per-resource metadata size, for exploration output.
    pub average_metadata_size: f64,
}

impl StreamedResourceBin {
    pub fn parse(name: &str, data: &[u8]) -> Result<StreamedResourceBin> {
        let mut stream = ByteStream::new(data);
        let magic = stream.u32()?;
        if magic != STREAMED_MAGIC {
            return Err(DatastreamError::BadMagic {
                what: "streamed-resource bin",
                expected: format!("{STREAMED_MAGIC:#010X}"),
                found: format!("{magic:#010X}"),
            });
        }
        let version = stream.u32()?;
        if version != 1 {
            return Err(DatastreamError::UnsupportedVersion {
                what: "streamed-resource bin",
                version,
            });
        }
        let v1 = stream.u32()?;
        let v2 = stream.u32()?;
        let num_resources = stream.u32()? as usize;
        let start = stream.tell();

        let discovered = match (v1, v2) {
            (4, 32) | (4, 36) | (5, 68) | (5, 100) | (6, 160) | (7, 32) | (7, 200) | (10, 32)
            | (10, 100) => 0,
            _ => {
                let key = format!("{name}_{v1}_{v2}");
                let cached = datapairs().lock().get(&key).copied();
                match cached {
                    Some(size) => size,
                    None => {
                        let names_size = find_nts_array_start(num_resources, data)?;
                        let body = data.len() - names_size - 4 - start;
                        if num_resources == 0 || body % num_resources != 0 {
                            return Err(DatastreamError::Malformed {
                                what: "streamed-resource bin",
                                reason: format!("unknown datapair ({v1}, {v2}) will not divide"),
                            });
                        }
                        let size = body / num_resources - 20;
                        info!(name, v1, v2, size, "new streamed-resource datapair size");
                        datapairs().lock().insert(key, size);
                        size
                    }
                }
            }
        };

        let mut resources = Vec::with_capacity(num_resources);
        for _ in 0..num_resources {
            resources.push(StreamedResource::read(&mut stream, v1, v2, discovered)?);
        }
        let average_metadata_size = if num_resources == 0 {
            0.0
        } else {
            (stream.tell() - start) as f64 / num_resources as f64 - 20.0
        };

        let name_size = stream.u32()? as usize;
        for resource in &mut resources {
            stream.seek(
                -(name_size as i64) + i64::from(resource.offset),
                Whence::End,
            )?;
            resource.name = stream.nts(1)?;
        }

        Ok(StreamedResourceBin {
            name: name.to_owned(),
            version,
            v1,
            v2,
            resources,
            name_size,
            average_metadata_size,
        })
    }
}

impl StreamedResource {
    fn read(
        stream: &mut ByteStream,
        v1: u32,
        v2: u32,
        discovered: usize,
    ) -> Result<StreamedResource> {
        let ctx = crate::fields::DecodeCtx::default();
        let rid = Rid::read(stream)?;
        let offset = stream.u32()?;
        let file_info = FileInfoMetadataRecV1::read(stream, ctx)?;
        let metadata = match (v1, v2) {
            (4, 32) | (7, 32) | (10, 32) => ResourceMetadata::None,
            (4, 36) => ResourceMetadata::Raw(stream.read_vec(4)?),
            (5, 68) => {
                ResourceMetadata::ParticleSystem(ParticleSystemMetadataRecV1::read(stream, ctx)?)
            }
            (5, 100) => {
                ResourceMetadata::FoliageMesh(FoliageMeshMetadataRecV1::read(stream, ctx)?)
            }
            (10, 100) => ResourceMetadata::Texture(TextureMetadataRecV1::read(stream, ctx)?),
            (6, 160) => {
                ResourceMetadata::HavokAnimation(HavokAnimationMetadataRecV1::read(stream, ctx)?)
            }
            (7, 200) => ResourceMetadata::Mesh(MeshMetadataRecV1::read(stream, ctx)?),
            _ if discovered != 0 => ResourceMetadata::Unknown {
                v1,
                v2,
                data: stream.read_vec(discovered)?,
            },
            _ => ResourceMetadata::None,
        };
        Ok(StreamedResource {
            rid,
            offset,
            file_info,
            metadata,
            name: String::new(),
        })
    }
}

/// Locale string table: UTF-8 keys to UTF-16LE values.
pub struct StringTableBin {
    pub name: String,
    pub pairs: Vec<(String, String)>,
}

impl StringTableBin {
    pub fn parse(name: &str, data: &[u8]) -> Result<StringTableBin> {
        let mut stream = ByteStream::new(data);
        let count = stream.u32()? as usize;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let key = stream.istr()?;
            // Value length counts UTF-16 code units, two bytes each.
            let chars = stream.u32()? as usize;
            let raw = stream.read(chars * 2)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let value =
                String::from_utf16(&units).map_err(|_| DatastreamError::Malformed {
                    what: "string table",
                    reason: format!("value for {key:?} is not UTF-16"),
                })?;
            pairs.push((key, value));
        }
        debug!(name, count, "parsed string table");
        Ok(StringTableBin {
            name: name.to_owned(),
            pairs,
        })
    }
}
