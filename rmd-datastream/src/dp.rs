//! DP side tables.
//!
//! `dp_`-prefixed bins accompany certain CID bins and hold the
//! variable-length data their records reference: strings, integer and float
//! lists, GID runs. References are packed offset words: the low byte is a
//! flag set (bit 7 = overlap), the remaining bits times eight give the byte
//! offset into the payload, plus four when the overlap flag is set.
//!
//! Reads through a DP file are deliberately lenient. A bad offset means the
//! upstream object simply has a missing field, so every getter logs and
//! yields `None`/empty instead of propagating.

use std::collections::HashMap;

use tracing::{debug, error, info};

use rmd_stream::{ByteStream, Whence, dump};

use crate::error::{DatastreamError, Result};
use crate::types::Gid;

pub const FLAG_OVERLAP: u8 = 0x80;

/// A decoded offset word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpOffset {
    pub raw: u64,
    pub flags: u8,
    /// Size to the next registered offset, filled in once all offsets are
    /// known.
    pub size: Option<usize>,
}

impl DpOffset {
    pub fn new(raw: u64) -> Self {
        Self {
            raw,
            flags: (raw & 0xFF) as u8,
            size: None,
        }
    }

    /// Effective byte offset into the payload.
    pub fn offset(&self) -> usize {
        let bits = (self.raw >> 8) as usize;
        bits * 8 + if self.flags & FLAG_OVERLAP != 0 { 4 } else { 0 }
    }

    pub fn has_flags(&self) -> bool {
        self.flags != 0
    }
}

/// Which header layout a DP file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpHeader {
    /// 20-byte header, two offset tables.
    V1,
    /// 28-byte header, three offset tables.
    V2,
    /// 40-byte header, three tables, 8-byte words throughout.
    V3,
}

pub struct DpFile {
    pub name: String,
    pub header: DpHeader,
    pub data_size: usize,
    /// Reserved header bytes; nonzero content is reported but kept verbatim.
    pub reserved: Vec<u8>,
    /// Offset tables in declaration order (values[, values2], strings).
    pub offsets: Vec<Vec<DpOffset>>,
    data: Vec<u8>,
    data_start: usize,
}

impl DpFile {
    /// Parse a DP bin. The header variant is picked by testing which layout
    /// makes the declared structure sum to the file size.
    pub fn parse(name: &str, data: &[u8]) -> Result<DpFile> {
        let mut stream = ByteStream::new(data);
        let mut peeked = [0u64; 4];
        {
            let head = stream.peek(16)?;
            for (i, word) in peeked.iter_mut().enumerate() {
                *word = u64::from(u32::from_le_bytes([
                    head[4 * i],
                    head[4 * i + 1],
                    head[4 * i + 2],
                    head[4 * i + 3],
                ]));
            }
        }
        let len = data.len() as u64;

        let (header, counts, data_size, reserved_len, word) =
            if 20 + peeked[0] * 4 + peeked[1] * 4 + peeked[2] == len {
                let values = stream.u32()? as usize;
                let strings = stream.u32()? as usize;
                let data_size = stream.u32()? as usize;
                (DpHeader::V1, vec![values, strings], data_size, 8usize, 4usize)
            } else if 28 + peeked[0] * 4 + peeked[1] * 4 + peeked[2] * 4 + peeked[3] == len {
                let values1 = stream.u32()? as usize;
                let values2 = stream.u32()? as usize;
                let strings = stream.u32()? as usize;
                let data_size = stream.u32()? as usize;
                (DpHeader::V2, vec![values1, values2, strings], data_size, 12, 4)
            } else if 40 + peeked[0] * 8 + peeked[1] * 8 + peeked[2] * 8 + peeked[3] == len {
                let values1 = stream.u32()? as usize;
                let values2 = stream.u32()? as usize;
                let strings = stream.u32()? as usize;
                let data_size = stream.u32()? as usize;
                (DpHeader::V3, vec![values1, values2, strings], data_size, 24, 8)
            } else {
                debug!(name, head = %dump(stream.peek(64.min(data.len()))?), "unrecognized DP header");
                return Err(DatastreamError::DpHeaderUndetermined {
                    peeked,
                    len: data.len(),
                });
            };

        let reserved = stream.read_vec(reserved_len)?;
        if reserved.iter().any(|b| *b != 0) {
            info!(name, header = ?header, data = %hex::encode(&reserved), "DP file with nonzero reserved header bytes");
        }

        let mut offsets = Vec::with_capacity(counts.len());
        for count in &counts {
            let mut table = Vec::with_capacity(*count);
            for _ in 0..*count {
                table.push(DpOffset::new(stream.uint(word)?));
            }
            offsets.push(table);
        }

        let data_start = data.len() - data_size;
        let mut dp = DpFile {
            name: name.to_owned(),
            header,
            data_size,
            reserved,
            offsets,
            data: data.to_vec(),
            data_start,
        };
        dp.assign_sizes();
        Ok(dp)
    }

    /// Fill each offset's implicit size: the gap to the next offset in
    /// ascending order, or to the end of the payload for the last one.
    fn assign_sizes(&mut self) {
        let mut ordered: Vec<(usize, usize, usize)> = Vec::new();
        for (table, entries) in self.offsets.iter().enumerate() {
            for (i, e) in entries.iter().enumerate() {
                ordered.push((e.offset(), table, i));
            }
        }
        ordered.sort_unstable_by_key(|(offset, _, _)| *offset);
        for w in 0..ordered.len() {
            let (offset, table, i) = ordered[w];
            let size = if w + 1 < ordered.len() {
                ordered[w + 1].0.saturating_sub(offset)
            } else {
                self.data_size.saturating_sub(offset)
            };
            self.offsets[table][i].size = Some(size);
        }
    }

    /// True when `offset` matches a registered offset in any table.
    pub fn is_registered(&self, offset: &DpOffset) -> bool {
        self.offsets
            .iter()
            .flatten()
            .any(|e| e.offset() == offset.offset())
    }

    fn payload_stream(&self, offset: &DpOffset) -> Option<ByteStream<'_>> {
        if offset.offset() > self.data_size {
            return None;
        }
        let mut stream = ByteStream::new(&self.data);
        let target = -(self.data_size as i64) + offset.offset() as i64;
        stream.seek(target, Whence::End).ok()?;
        Some(stream)
    }

    /// Decode an offset word and read one value at it. Unregistered or
    /// out-of-bounds offsets log and yield `None`; a flagless word is the
    /// empty sentinel.
    pub fn get<T>(
        &self,
        raw_offset: u64,
        what: &'static str,
        read: impl FnOnce(&mut ByteStream) -> Result<T>,
    ) -> Option<T> {
        let offset = DpOffset::new(raw_offset);
        if offset.offset() > self.data_size {
            error!(
                dp = self.name,
                what,
                offset = offset.offset(),
                data_size = self.data_size,
                "DP get out of bounds"
            );
            return None;
        }
        let mut stream = self.payload_stream(&offset)?;
        match read(&mut stream) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(dp = self.name, what, offset = offset.offset(), %err, "DP get failed");
                None
            }
        }
    }

    /// A string by offset word. A flagless word means the empty string.
    pub fn get_string(&self, raw_offset: u64) -> Option<String> {
        let offset = DpOffset::new(raw_offset);
        if !offset.has_flags() {
            return Some(String::new());
        }
        self.get(raw_offset, "str", |stream| Ok(stream.nts(1)?))
    }

    /// A homogeneous list by offset word; empty on any miss.
    pub fn get_list<T>(
        &self,
        raw_offset: u64,
        count: usize,
        what: &'static str,
        mut read: impl FnMut(&mut ByteStream) -> Result<T>,
    ) -> Vec<T> {
        let offset = DpOffset::new(raw_offset);
        if !self.is_registered(&offset) {
            error!(
                dp = self.name,
                what,
                offset = offset.offset(),
                raw = raw_offset,
                "DP get_list at unregistered offset"
            );
            return Vec::new();
        }
        let Some(mut stream) = self.payload_stream(&offset) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match read(&mut stream) {
                Ok(value) => out.push(value),
                Err(err) => {
                    error!(dp = self.name, what, offset = offset.offset(), %err, "DP get_list truncated");
                    return Vec::new();
                }
            }
        }
        out
    }

    /// GID list with the fixed 16-byte record stride (each GID is the first
    /// 8 bytes of its record).
    pub fn get_gids(&self, raw_offset: u64, count: usize) -> Vec<Gid> {
        self.get_list(raw_offset, count, "gid", |stream| {
            let gid = Gid::read(stream)?;
            stream.skip(8)?;
            Ok(gid)
        })
    }

    /// Offset counts per table, keyed by the table's role name.
    pub fn counts(&self) -> HashMap<&'static str, usize> {
        let names: &[&'static str] = match self.header {
            DpHeader::V1 => &["values", "string"],
            DpHeader::V2 | DpHeader::V3 => &["values1", "values2", "string"],
        };
        names
            .iter()
            .zip(&self.offsets)
            .map(|(name, table)| (*name, table.len()))
            .collect()
    }
}
