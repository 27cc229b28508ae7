//! Datastream container envelopes.
//!
//! Two framings exist in the wild. The first generation brackets the payload
//! with `DEADBEEF` words; the second uses `D34DB33F` and inserts an extra
//! leading word whose value 1 announces one more header word. Both carry the
//! payload's type hash and tag version, which key the decoder [`Registry`].

use rmd_stream::{ByteStream, Endian, dump};

use crate::decoders::Decoded;
use crate::error::{DatastreamError, Result};
use crate::registry::{Registry, TypeKey};

/// First-generation bracket word, as stored (little-endian).
pub const TAG_V1: u32 = 0xDEAD_BEEF;
/// Second-generation bracket word.
pub const TAG_V2: u32 = 0xD34D_B33F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    V1,
    V2,
}

impl ContainerKind {
    pub fn tag(self) -> u32 {
        match self {
            ContainerKind::V1 => TAG_V1,
            ContainerKind::V2 => TAG_V2,
        }
    }
}

/// A parsed container: envelope header plus decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub kind: ContainerKind,
    pub size: u32,
    pub type_hash: u32,
    pub version: u32,
    /// Leading v2 word; value 1 announces `extra`. Other values carry no
    /// extra word.
    pub unk: Option<u32>,
    pub extra: Option<u32>,
    pub data: Box<Decoded>,
}

impl Container {
    pub fn type_key(&self) -> TypeKey {
        TypeKey {
            hash: self.type_hash,
            version: self.version,
        }
    }

    /// Displayed type hash: reversed-hex of the stored word.
    pub fn type_hash_hex(&self) -> String {
        format!("{:08X}", self.type_hash)
    }

    /// Peek the next four bytes for a container tag without advancing.
    pub fn peek_kind(stream: &ByteStream) -> Option<ContainerKind> {
        let head = stream.peek(4).ok()?;
        match u32::from_le_bytes([head[0], head[1], head[2], head[3]]) {
            TAG_V1 => Some(ContainerKind::V1),
            TAG_V2 => Some(ContainerKind::V2),
            _ => None,
        }
    }

    /// Parse one container at the cursor, decoding the payload through
    /// `registry`.
    pub fn parse(stream: &mut ByteStream, registry: &Registry) -> Result<Container> {
        let tag = stream.uint_with(4, Endian::Little)? as u32;
        let kind = match tag {
            TAG_V1 => ContainerKind::V1,
            TAG_V2 => ContainerKind::V2,
            other => {
                let back = stream.tell().min(36);
                let around = stream
                    .peek_skip(-(back as i64), back + 12.min(stream.remaining()))
                    .unwrap_or(&[]);
                return Err(DatastreamError::UnknownContainerTag {
                    found: other,
                    dump: dump(around),
                });
            }
        };

        let (unk, size, type_hash, version, extra, header_len) = match kind {
            ContainerKind::V1 => {
                let size = stream.uint_with(4, Endian::Little)? as u32;
                let type_hash = stream.uint_with(4, Endian::Little)? as u32;
                let version = stream.uint_with(4, Endian::Little)? as u32;
                (None, size, type_hash, version, None, 20u32)
            }
            ContainerKind::V2 => {
                let unk = stream.uint_with(4, Endian::Little)? as u32;
                let size = stream.uint_with(4, Endian::Little)? as u32;
                let type_hash = stream.uint_with(4, Endian::Little)? as u32;
                let version = stream.uint_with(4, Endian::Little)? as u32;
                let extra = if unk == 1 {
                    Some(stream.uint_with(4, Endian::Little)? as u32)
                } else {
                    None
                };
                let header_len = if extra.is_some() { 28 } else { 24 };
                (Some(unk), size, type_hash, version, extra, header_len)
            }
        };

        let payload_len = size.checked_sub(header_len).ok_or_else(|| {
            DatastreamError::Malformed {
                what: "container",
                reason: format!("declared size {size} smaller than header {header_len}"),
            }
        })?;
        let payload = stream.read_vec(payload_len as usize)?;
        let data = registry.process(
            TypeKey {
                hash: type_hash,
                version,
            },
            &payload,
        )?;

        let close = stream.uint_with(4, Endian::Little)? as u32;
        if close != tag {
            return Err(DatastreamError::CloseTagMismatch {
                expected: tag,
                found: close,
            });
        }

        Ok(Container {
            kind,
            size,
            type_hash,
            version,
            unk,
            extra,
            data: Box::new(data),
        })
    }
}

/// Frame `payload` in a v1 envelope. Fixture helper; decoding is one-way and
/// nothing in the toolkit writes archives with this.
pub fn frame_v1(type_hash: u32, version: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 20);
    out.extend_from_slice(&TAG_V1.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32 + 20).to_le_bytes());
    out.extend_from_slice(&type_hash.to_le_bytes());
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&TAG_V1.to_le_bytes());
    out
}

/// Frame `payload` in a v2 envelope.
pub fn frame_v2(type_hash: u32, version: u32, extra: Option<u32>, payload: &[u8]) -> Vec<u8> {
    let header = if extra.is_some() { 28 } else { 24 };
    let mut out = Vec::with_capacity(payload.len() + header as usize + 4);
    out.extend_from_slice(&TAG_V2.to_le_bytes());
    out.extend_from_slice(&u32::from(extra.is_some()).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32 + header).to_le_bytes());
    out.extend_from_slice(&type_hash.to_le_bytes());
    out.extend_from_slice(&version.to_le_bytes());
    if let Some(extra) = extra {
        out.extend_from_slice(&extra.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out.extend_from_slice(&TAG_V2.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::UnknownBinData;
    use pretty_assertions::assert_eq;

    #[test]
    fn v1_empty_payload_roundtrip() {
        let registry = Registry::builtin().unwrap();
        let framed = frame_v1(0xDEADCAFE, 7, &[]);
        let mut stream = ByteStream::new(&framed);
        let container = Container::parse(&mut stream, &registry).unwrap();
        assert_eq!(container.kind, ContainerKind::V1);
        assert_eq!(container.size, 20);
        assert_eq!(container.type_hash_hex(), "DEADCAFE");
        assert_eq!(container.version, 7);
        assert_eq!(
            *container.data,
            Decoded::Unknown(UnknownBinData {
                key: container.type_key(),
                data: Vec::new(),
            })
        );
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn v2_extra_word() {
        let registry = Registry::builtin().unwrap();
        let framed = frame_v2(0x11223344, 2, Some(9), &[0xAB; 4]);
        let mut stream = ByteStream::new(&framed);
        let container = Container::parse(&mut stream, &registry).unwrap();
        assert_eq!(container.kind, ContainerKind::V2);
        assert_eq!(container.unk, Some(1));
        assert_eq!(container.extra, Some(9));
        assert_eq!(container.size, 32);
    }

    #[test]
    fn v2_unexpected_unk_means_no_extra() {
        let registry = Registry::builtin().unwrap();
        let mut framed = frame_v2(0x11223344, 2, None, &[0xAB; 4]);
        // Rewrite the unk word to an unhandled value.
        framed[4..8].copy_from_slice(&5u32.to_le_bytes());
        let mut stream = ByteStream::new(&framed);
        let container = Container::parse(&mut stream, &registry).unwrap();
        assert_eq!(container.unk, Some(5));
        assert_eq!(container.extra, None);
    }

    #[test]
    fn close_tag_mismatch() {
        let registry = Registry::builtin().unwrap();
        let mut framed = frame_v1(0x1, 1, &[]);
        let tail = framed.len() - 4;
        framed[tail..].copy_from_slice(&0u32.to_le_bytes());
        let mut stream = ByteStream::new(&framed);
        let err = Container::parse(&mut stream, &registry).unwrap_err();
        assert!(matches!(err, DatastreamError::CloseTagMismatch { .. }));
    }

    #[test]
    fn garbage_tag() {
        let registry = Registry::builtin().unwrap();
        let mut stream = ByteStream::new(&[0u8; 16]);
        let err = Container::parse(&mut stream, &registry).unwrap_err();
        assert!(matches!(err, DatastreamError::UnknownContainerTag { .. }));
    }
}
