//! The `(type hash, version)` decoder registry.
//!
//! Containers name their payload type by a CRC-32 of the lowercase C++ type
//! name plus a tag version. The registry maps that pair to a named decode
//! function. Keys with no registered decoder produce an [`UnknownBinData`]
//! that keeps the raw payload; the first sighting of each unknown key is
//! logged so new types surface exactly once per process.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;
use tracing::error;

use rmd_stream::{ByteStream, dump_truncated};

use crate::decoders::{self, Decoded};
use crate::error::{DatastreamError, Result};
use crate::fields::DecodeCtx;

/// Registry key: type hash plus tag version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub hash: u32,
    pub version: u32,
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X} v{}", self.hash, self.version)
    }
}

/// Payload whose type key has no registered decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownBinData {
    pub key: TypeKey,
    pub data: Vec<u8>,
}

pub type DecodeFn = fn(&mut ByteStream, DecodeCtx) -> Result<Decoded>;

pub struct RegisteredDecoder {
    pub name: &'static str,
    decode: DecodeFn,
}

pub struct Registry {
    decoders: HashMap<TypeKey, RegisteredDecoder>,
    unknown_seen: Mutex<HashSet<TypeKey>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            unknown_seen: Mutex::new(HashSet::new()),
        }
    }

    /// Registry preloaded with every decoder this crate knows about.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        decoders::register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Register a decoder. Duplicate keys are rejected.
    pub fn register(
        &mut self,
        name: &'static str,
        hash: u32,
        version: u32,
        decode: DecodeFn,
    ) -> Result<()> {
        let key = TypeKey { hash, version };
        if let Some(existing) = self.decoders.get(&key) {
            return Err(DatastreamError::DuplicateDecoder {
                key: key.to_string(),
                existing: existing.name,
            });
        }
        self.decoders.insert(key, RegisteredDecoder { name, decode });
        Ok(())
    }

    pub fn get(&self, key: TypeKey) -> Option<&RegisteredDecoder> {
        self.decoders.get(&key)
    }

    pub fn name_of(&self, key: TypeKey) -> Option<&'static str> {
        self.decoders.get(&key).map(|d| d.name)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a container payload. Unknown keys recover as
    /// [`Decoded::Unknown`]; a registered decoder must consume the payload
    /// exactly.
    pub fn process(&self, key: TypeKey, payload: &[u8]) -> Result<Decoded> {
        let Some(decoder) = self.decoders.get(&key) else {
            if self.unknown_seen.lock().insert(key) {
                error!(
                    key = %key,
                    len = payload.len(),
                    data = %dump_truncated(payload, 256),
                    "no decoder for container type"
                );
            }
            return Ok(Decoded::Unknown(UnknownBinData {
                key,
                data: payload.to_vec(),
            }));
        };

        let mut stream = ByteStream::new(payload);
        let ctx = DecodeCtx::with_registry(self);
        let value = (decoder.decode)(&mut stream, ctx)?;
        if stream.tell() != stream.len() {
            return Err(DatastreamError::UnderRead {
                type_key: key.to_string(),
                read: stream.tell(),
                len: stream.len(),
                dump: dump_truncated(payload, 512),
            });
        }
        Ok(value)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
