//! PackMeta sidecars (v1.x archives only).
//!
//! A `.packmeta` file binds archive file offsets to resource ids and to
//! leaves of per-type metadata trees. Valid for archive minors 7/8/9; minor
//! 7 predefines the metadata type list and stores only counts, later minors
//! carry `(hash, name, count)` inline.

use std::collections::HashMap;

use tracing::info;

use rmd_stream::ByteStream;

use crate::container::Container;
use crate::error::{DatastreamError, Result};
use crate::registry::Registry;
use crate::types::Rid;

/// Metadata type names predefined by minor 7, in tree order.
const PACKMETA_7_TYPES: [&str; 8] = [
    "content::FileInfoMetadata",
    "content::ResourceMetadata",
    "content::VersionsMetadata",
    "content::TextureMetadata",
    "content::MeshMetadata",
    "content::FoliageMeshMetadata",
    "content::HavokAnimationMetadata",
    "content::ParticleSystemMetadata",
];

/// One metadata type: its hash, name, and how many tree entries it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackMetaType {
    pub index: usize,
    pub hash: String,
    pub name: String,
    pub count: usize,
}

impl PackMetaType {
    fn parse(index: usize, stream: &mut ByteStream, v_minor: u32) -> Result<PackMetaType> {
        let (hash, name) = if v_minor == 7 {
            let name = PACKMETA_7_TYPES.get(index).copied().ok_or_else(|| {
                DatastreamError::Malformed {
                    what: "packmeta",
                    reason: format!("minor 7 declares more than {} types", PACKMETA_7_TYPES.len()),
                }
            })?;
            let hash = format!("{:08X}", crc32fast::hash(name.to_lowercase().as_bytes()));
            (hash, name.to_owned())
        } else {
            let hash = hex::encode_upper(stream.read_array::<4>()?);
            let name = stream.istr()?;
            (hash, name)
        };
        let count = stream.u32()? as usize;
        Ok(PackMetaType {
            index,
            hash,
            name,
            count,
        })
    }
}

/// One archived file joined with its resource id and metadata leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct PackMetaFile {
    pub offset: u32,
    pub name: String,
    pub rid: Option<Rid>,
    pub meta: Vec<Container>,
}

pub struct PackMeta {
    pub file_count: usize,
    pub tree_count: usize,
    pub element_count: usize,
    pub names_size: usize,
    pub type_defs: Vec<PackMetaType>,
    pub files: Vec<PackMetaFile>,
}

impl PackMeta {
    pub fn parse(data: &[u8], v_minor: u32, registry: &Registry) -> Result<PackMeta> {
        let mut stream = ByteStream::new(data);
        info!(len = data.len(), v_minor, "processing packmeta");

        let file_count = stream.u32()? as usize;
        let tree_count = stream.u32()? as usize;
        let element_count = stream.u32()? as usize;
        let names_size = stream.u32()? as usize;

        let mut names = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            names.push(stream.nts(1)?);
        }
        if stream.tell() != names_size + 16 {
            return Err(DatastreamError::Malformed {
                what: "packmeta",
                reason: format!(
                    "name array ended at {} but names_size declares {}",
                    stream.tell(),
                    names_size + 16
                ),
            });
        }

        let mut offsets = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            offsets.push(stream.u32()?);
        }

        let rid_count = stream.u32()? as usize;
        let mut rid_offsets: HashMap<u32, Rid> = HashMap::with_capacity(rid_count);
        for _ in 0..rid_count {
            let offset = stream.u32()?;
            let rid = if v_minor == 7 {
                Rid::read(&mut stream)?
            } else {
                Rid::read_long(&mut stream)?
            };
            rid_offsets.insert(offset, rid);
        }

        let type_count = stream.u32()? as usize;
        let mut type_defs = Vec::with_capacity(type_count);
        for i in 0..type_count {
            type_defs.push(PackMetaType::parse(i, &mut stream, v_minor)?);
        }

        let mut tree: Vec<Vec<Container>> = Vec::with_capacity(type_defs.len());
        for def in &type_defs {
            let mut leaves = Vec::with_capacity(def.count);
            for _ in 0..def.count {
                leaves.push(Container::parse(&mut stream, registry)?);
            }
            tree.push(leaves);
        }

        // file_count FileMetadataEntry containers, keyed by their offset.
        let mut entry_by_offset: HashMap<u32, Vec<(usize, usize)>> = HashMap::new();
        for _ in 0..file_count {
            let container = Container::parse(&mut stream, registry)?;
            let (ofst, subitems) = file_metadata_entry(&container)?;
            entry_by_offset.insert(ofst, subitems);
        }

        let mut files = Vec::with_capacity(file_count);
        for (i, offset) in offsets.iter().enumerate() {
            let meta = entry_by_offset
                .get(offset)
                .map(|subitems| {
                    subitems
                        .iter()
                        .filter_map(|(meta_index, file_index)| {
                            tree.get(*meta_index).and_then(|leaves| leaves.get(*file_index))
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            files.push(PackMetaFile {
                offset: *offset,
                name: names[i].clone(),
                rid: rid_offsets.get(offset).copied(),
                meta,
            });
        }

        Ok(PackMeta {
            file_count,
            tree_count,
            element_count,
            names_size,
            type_defs,
            files,
        })
    }

    /// Files that are missing metadata or a resource id.
    pub fn partial_files(&self) -> impl Iterator<Item = &PackMetaFile> {
        self.files
            .iter()
            .filter(|f| f.meta.is_empty() || f.rid.is_none())
    }
}

/// Pull `(offset, [(meta_index, file_index)])` out of a FileMetadataEntry
/// container of either generation.
fn file_metadata_entry(container: &Container) -> Result<(u32, Vec<(usize, usize)>)> {
    use crate::decoders::Decoded;

    let (ofst, subitems) = match &*container.data {
        Decoded::FileMetadataEntryV1(entry) => (entry.ofst, &entry.subitems),
        Decoded::FileMetadataEntryV2(entry) => (entry.ofst, &entry.subitems),
        other => {
            return Err(DatastreamError::Malformed {
                what: "packmeta",
                reason: format!("expected a FileMetadataEntry container, got {other:?}"),
            });
        }
    };
    let mut pairs = Vec::with_capacity(subitems.len());
    for sub in subitems {
        match &*sub.data {
            Decoded::FileMetadataEntryMetaV1(m) => {
                pairs.push((m.meta_index as usize, m.file_index as usize));
            }
            Decoded::FileMetadataEntryMetaV2(m) => {
                pairs.push((m.meta_index as usize, m.file_index as usize));
            }
            other => {
                return Err(DatastreamError::Malformed {
                    what: "packmeta",
                    reason: format!("expected a FileMetadataEntry::Metadata container, got {other:?}"),
                });
            }
        }
    }
    Ok((ofst, pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::frame_v1;
    use crate::decoders::{Decoded, FileInfoMetadataV1};
    use pretty_assertions::assert_eq;

    /// Minimal minor-9 packmeta: one file, one metadata type with one leaf.
    fn build_packmeta() -> Vec<u8> {
        let mut out = Vec::new();
        let name = b"data/loot.bin\0";

        out.extend_from_slice(&1u32.to_le_bytes()); // file count
        out.extend_from_slice(&1u32.to_le_bytes()); // tree count
        out.extend_from_slice(&1u32.to_le_bytes()); // element count
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&0x40u32.to_le_bytes()); // file offset

        // One (offset, RID) pair, 8-byte RID for minor 9.
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0x40u32.to_le_bytes());
        out.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

        // One metadata type carrying one leaf.
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&[0x95, 0xE8, 0xC0, 0xEF]);
        let type_name = b"r::FileInfoMetadata";
        out.extend_from_slice(&(type_name.len() as u32).to_le_bytes());
        out.extend_from_slice(type_name);
        out.extend_from_slice(&1u32.to_le_bytes());

        // Tree leaf: r::FileInfoMetadata v1.
        let mut leaf = Vec::new();
        leaf.extend_from_slice(&123u32.to_le_bytes());
        leaf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        leaf.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&frame_v1(0x95E8C0EF, 1, &leaf));

        // FileMetadataEntry v2 pointing offset 0x40 at tree[0][0].
        let mut meta_payload = Vec::new();
        meta_payload.extend_from_slice(&0u32.to_le_bytes());
        meta_payload.extend_from_slice(&0u32.to_le_bytes());
        let meta = frame_v1(0x35AE54C1, 2, &meta_payload);
        let mut entry_payload = Vec::new();
        entry_payload.extend_from_slice(&0x40u32.to_le_bytes());
        entry_payload.extend_from_slice(&1u32.to_le_bytes());
        entry_payload.extend_from_slice(&meta);
        out.extend_from_slice(&frame_v1(0xE974FDFF, 2, &entry_payload));

        out
    }

    #[test]
    fn joins_offsets_names_rids_and_leaves() {
        let registry = Registry::builtin().unwrap();
        let data = build_packmeta();
        let pm = PackMeta::parse(&data, 9, &registry).unwrap();

        assert_eq!(pm.file_count, 1);
        assert_eq!(pm.type_defs.len(), 1);
        assert_eq!(pm.type_defs[0].name, "r::FileInfoMetadata");
        assert_eq!(pm.type_defs[0].hash, "95E8C0EF");

        let file = &pm.files[0];
        assert_eq!(file.offset, 0x40);
        assert_eq!(file.name, "data/loot.bin");
        assert_eq!(file.rid.unwrap().to_string(), "8877665544332211");
        assert_eq!(file.meta.len(), 1);
        assert_eq!(
            *file.meta[0].data,
            Decoded::FileInfoMetadataV1(FileInfoMetadataV1 {
                filesize: 123,
                checksum: "AABBCCDD".to_owned(),
                flags: 0,
            })
        );
        assert_eq!(pm.partial_files().count(), 0);
    }

    #[test]
    fn names_size_mismatch_rejected() {
        let registry = Registry::builtin().unwrap();
        let mut data = build_packmeta();
        data[12..16].copy_from_slice(&5u32.to_le_bytes()); // corrupt names_size
        assert!(PackMeta::parse(&data, 9, &registry).is_err());
    }

    #[test]
    fn minor7_predefined_type_names() {
        // Type table for minor 7 has no inline names, only counts.
        let mut stream_data = Vec::new();
        stream_data.extend_from_slice(&0u32.to_le_bytes());
        let mut stream = ByteStream::new(&stream_data);
        let def = PackMetaType::parse(0, &mut stream, 7).unwrap();
        assert_eq!(def.name, "content::FileInfoMetadata");
        assert_eq!(def.count, 0);
        assert_eq!(
            def.hash,
            format!(
                "{:08X}",
                crc32fast::hash(b"content::fileinfometadata")
            )
        );
    }
}
