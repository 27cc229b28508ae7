//! RMDL bundles: named batches of hashed datastream containers.
//!
//! An `.rmdl` blob ends with an index (the final `tail_size` bytes) naming
//! each subfile and its size; subfile offsets are cumulative from byte 8.
//! `dp_`-prefixed subfiles are DP side tables and are skipped here; every
//! other subfile is a [`BatchDsc`].

use tracing::debug;

use rmd_stream::{ByteStream, Whence};

use crate::container::Container;
use crate::error::{DatastreamError, Result};
use crate::registry::Registry;

/// Index entry from the bundle tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmdlEntry {
    pub name: String,
    pub size: usize,
    pub offset: usize,
}

/// Container prefixed by its 8-byte lookup id from the batch LUT.
#[derive(Debug, Clone, PartialEq)]
pub struct HashedDsc {
    pub lut: [u8; 8],
    pub container: Container,
}

/// A batch of containers with a small fixed header and an id lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDsc {
    pub name: String,
    pub version: u32,
    pub content_type: u32,
    pub section_count: u32,
    pub unknown: u32,
    pub entries: Vec<HashedDsc>,
}

impl BatchDsc {
    pub fn parse(stream: &mut ByteStream, name: &str, registry: &Registry) -> Result<BatchDsc> {
        let version = stream.u32()?;
        let content_type = stream.u32()?;
        let section_count = stream.u32()?;
        let unknown = stream.u32()?;
        debug!(
            name,
            version, content_type, unknown, sections = section_count, "batch header"
        );

        let mut luts = Vec::with_capacity(section_count as usize);
        for _ in 0..section_count {
            luts.push(stream.read_array::<8>()?);
        }
        let mut entries = Vec::with_capacity(luts.len());
        for lut in luts {
            entries.push(HashedDsc {
                lut,
                container: Container::parse(stream, registry)?,
            });
        }

        Ok(BatchDsc {
            name: name.to_owned(),
            version,
            content_type,
            section_count,
            unknown,
            entries,
        })
    }
}

/// A parsed RMDL bundle: the tail index plus every non-DP batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RmdlBundle {
    pub tail_size: usize,
    pub index: Vec<RmdlEntry>,
    pub entries: Vec<BatchDsc>,
}

impl RmdlBundle {
    pub fn parse(data: &[u8], registry: &Registry) -> Result<RmdlBundle> {
        let mut stream = ByteStream::new(data);
        let magic = stream.read_vec(4)?;
        if magic != b"RMDL" {
            return Err(DatastreamError::BadMagic {
                what: "RMDL bundle",
                expected: "RMDL".to_owned(),
                found: String::from_utf8_lossy(&magic).into_owned(),
            });
        }
        let tail_size = stream.u32()? as usize;
        let tail_start = stream.seek(-(tail_size as i64), Whence::End)?;
        if tail_start + tail_size != data.len() {
            return Err(DatastreamError::Malformed {
                what: "RMDL bundle",
                reason: format!("tail of {tail_size} bytes does not reach the end"),
            });
        }

        let count = stream.u32()? as usize;
        let mut index: Vec<RmdlEntry> = Vec::with_capacity(count);
        for i in 0..count {
            let size = stream.u32()? as usize;
            let name = stream.istr()?;
            let offset = if i == 0 {
                8
            } else {
                index[i - 1].offset + index[i - 1].size
            };
            index.push(RmdlEntry { name, size, offset });
        }

        stream.seek(8, Whence::Start)?;
        let mut entries = Vec::new();
        for entry in &index {
            if entry.name.starts_with("dp_") {
                stream.skip(entry.size)?;
            } else {
                entries.push(BatchDsc::parse(&mut stream, &entry.name, registry)?);
            }
        }

        Ok(RmdlBundle {
            tail_size,
            index,
            entries,
        })
    }

    pub fn entry(&self, name: &str) -> Option<&BatchDsc> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::frame_v1;
    use pretty_assertions::assert_eq;

    fn batch_bytes(sections: &[(u64, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&3u32.to_le_bytes()); // version
        out.extend_from_slice(&1u32.to_le_bytes()); // content type
        out.extend_from_slice(&(sections.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // unknown
        for (lut, _) in sections {
            out.extend_from_slice(&lut.to_le_bytes());
        }
        for (_, body) in sections {
            out.extend_from_slice(body);
        }
        out
    }

    fn bundle(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RMDL");
        let mut tail = Vec::new();
        tail.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (name, body) in entries {
            tail.extend_from_slice(&(body.len() as u32).to_le_bytes());
            tail.extend_from_slice(&(name.len() as u32).to_le_bytes());
            tail.extend_from_slice(name.as_bytes());
        }
        out.extend_from_slice(&(tail.len() as u32).to_le_bytes());
        for (_, body) in entries {
            out.extend_from_slice(body);
        }
        out.extend_from_slice(&tail);
        out
    }

    #[test]
    fn dp_entries_skipped() {
        let registry = Registry::builtin().unwrap();
        let section = frame_v1(0x0BADCAFE, 1, &[9, 9]);
        let batch = batch_bytes(&[(0x1122334455667788, section)]);
        let data = bundle(&[
            ("dp_a", vec![0xFF; 16]),
            ("cid_b", batch.clone()),
            ("cid_c", batch),
        ]);
        let rmdl = RmdlBundle::parse(&data, &registry).unwrap();
        assert_eq!(rmdl.index.len(), 3);
        assert_eq!(rmdl.entries.len(), 2);
        assert!(rmdl.entry("dp_a").is_none());
        assert!(rmdl.entry("cid_b").is_some());
        assert!(rmdl.entry("cid_c").is_some());
        let batch = rmdl.entry("cid_b").unwrap();
        assert_eq!(batch.section_count, 1);
        assert_eq!(batch.entries[0].lut, 0x1122334455667788u64.to_le_bytes());
        assert_eq!(batch.entries[0].container.type_hash, 0x0BADCAFE);
    }

    #[test]
    fn cumulative_offsets() {
        let registry = Registry::builtin().unwrap();
        let data = bundle(&[("dp_a", vec![0; 16]), ("dp_b", vec![0; 4])]);
        let rmdl = RmdlBundle::parse(&data, &registry).unwrap();
        assert_eq!(rmdl.index[0].offset, 8);
        assert_eq!(rmdl.index[1].offset, 24);
    }

    #[test]
    fn wrong_magic() {
        let registry = Registry::builtin().unwrap();
        let err = RmdlBundle::parse(b"LMDR\0\0\0\0", &registry).unwrap_err();
        assert!(matches!(err, DatastreamError::BadMagic { .. }));
    }
}
