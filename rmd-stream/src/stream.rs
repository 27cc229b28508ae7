//! Bounds-checked byte cursor with ambient decode state.

use std::borrow::Cow;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::warn;

use crate::error::{Result, StreamError};

/// Byte order for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Seek origin, mirroring `std::io::SeekFrom` but for in-memory cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// Cursor over a byte buffer.
///
/// Carries ambient decode state used by reads that don't name an explicit
/// width or byte order: `endian`, `signed`, `width` (integer size in bytes)
/// and `blob_len` (default blob read size). Reads are strict: asking for more
/// bytes than remain is an [`StreamError::OutOfBounds`] error, never a short
/// read.
pub struct ByteStream<'a> {
    data: Cow<'a, [u8]>,
    pos: usize,

    pub endian: Endian,
    pub signed: bool,
    pub width: usize,
    pub blob_len: usize,
}

impl<'a> ByteStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_cow(Cow::Borrowed(data))
    }

    pub fn from_vec(data: Vec<u8>) -> ByteStream<'static> {
        ByteStream::with_cow(Cow::Owned(data))
    }

    /// Read a whole file into an owned stream.
    pub fn from_path(path: &Path) -> Result<ByteStream<'static>> {
        Ok(ByteStream::with_cow(Cow::Owned(std::fs::read(path)?)))
    }

    fn with_cow(data: Cow<'a, [u8]>) -> ByteStream<'a> {
        ByteStream {
            data,
            pos: 0,
            endian: Endian::Little,
            signed: false,
            width: 4,
            blob_len: 4,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Move the cursor. The target must land inside `0..=len`.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<usize> {
        let base = match whence {
            Whence::Start => 0i64,
            Whence::Current => self.pos as i64,
            Whence::End => self.data.len() as i64,
        };
        let target = base + offset;
        if target < 0 || target > self.data.len() as i64 {
            return Err(StreamError::SeekOutOfRange {
                target,
                len: self.data.len(),
            });
        }
        self.pos = target as usize;
        Ok(self.pos)
    }

    fn check(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(StreamError::OutOfBounds {
                requested: n,
                remaining: self.remaining(),
                pos: self.pos,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    /// Read exactly `n` bytes, advancing the cursor.
    pub fn read(&mut self, n: usize) -> Result<&[u8]> {
        self.check(n)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    pub fn read_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.read(n)?.to_vec())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read `n` bytes at an absolute position, leaving the cursor after them.
    pub fn read_at(&mut self, pos: usize, n: usize) -> Result<&[u8]> {
        self.seek(pos as i64, Whence::Start)?;
        self.read(n)
    }

    /// Read without advancing.
    pub fn peek(&self, n: usize) -> Result<&[u8]> {
        self.check(n)?;
        Ok(&self.data[self.pos..self.pos + n])
    }

    /// Peek `n` bytes located `skip` bytes away from the cursor.
    pub fn peek_skip(&self, skip: i64, n: usize) -> Result<&[u8]> {
        let start = self.pos as i64 + skip;
        if start < 0 || start as usize + n > self.data.len() {
            return Err(StreamError::OutOfBounds {
                requested: n,
                remaining: self.remaining(),
                pos: self.pos,
                len: self.data.len(),
            });
        }
        let start = start as usize;
        Ok(&self.data[start..start + n])
    }

    // <------   Integers   ------>

    /// Unsigned integer of `size` bytes (1..=8) in the ambient byte order.
    pub fn uint(&mut self, size: usize) -> Result<u64> {
        debug_assert!(size >= 1 && size <= 8);
        let endian = self.endian;
        let bytes = self.read(size)?;
        let mut out = 0u64;
        match endian {
            Endian::Little => {
                for (i, b) in bytes.iter().enumerate() {
                    out |= u64::from(*b) << (8 * i);
                }
            }
            Endian::Big => {
                for b in bytes {
                    out = (out << 8) | u64::from(*b);
                }
            }
        }
        Ok(out)
    }

    /// Signed integer of `size` bytes, sign-extended from the top bit.
    pub fn int(&mut self, size: usize) -> Result<i64> {
        let raw = self.uint(size)?;
        let shift = 64 - 8 * size as u32;
        Ok(((raw << shift) as i64) >> shift)
    }

    pub fn uint_with(&mut self, size: usize, endian: Endian) -> Result<u64> {
        let saved = self.endian;
        self.endian = endian;
        let out = self.uint(size);
        self.endian = saved;
        out
    }

    pub fn int_with(&mut self, size: usize, endian: Endian) -> Result<i64> {
        let saved = self.endian;
        self.endian = endian;
        let out = self.int(size);
        self.endian = saved;
        out
    }

    /// Unsigned integer of the ambient width.
    pub fn ambient_uint(&mut self) -> Result<u64> {
        let width = self.width;
        self.uint(width)
    }

    /// Integer of the ambient width honoring the ambient signedness.
    pub fn ambient_int(&mut self) -> Result<i64> {
        let width = self.width;
        if self.signed {
            self.int(width)
        } else {
            Ok(self.uint(width)? as i64)
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(self.uint(2)? as u16)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(self.uint(4)? as u32)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.uint(8)
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.int(4)? as i32)
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.int(8)
    }

    // <------   Floats   ------>

    pub fn f16(&mut self) -> Result<f32> {
        Ok(f16_to_f32(self.uint(2)? as u16))
    }

    pub fn f32(&mut self) -> Result<f32> {
        let bits = self.uint(4)? as u32;
        Ok(f32::from_bits(bits))
    }

    pub fn f64(&mut self) -> Result<f64> {
        let bits = self.uint(8)?;
        Ok(f64::from_bits(bits))
    }

    /// One byte, nonzero means true.
    pub fn boolean(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    // <------   Strings   ------>

    /// Fixed-length UTF-8 string.
    pub fn string(&mut self, n: usize) -> Result<String> {
        if n == 0 {
            return Ok(String::new());
        }
        let offset = self.pos;
        let bytes = self.read_vec(n)?;
        String::from_utf8(bytes).map_err(|source| StreamError::InvalidUtf8 { offset, source })
    }

    /// Length-prefixed UTF-8 string; the prefix is an ambient-width integer.
    pub fn istr(&mut self) -> Result<String> {
        let n = self.ambient_uint()? as usize;
        self.string(n)
    }

    /// Null-terminated string that consumes at least `min_len` bytes before a
    /// terminator is accepted. Bytes that are NUL before the minimum is met
    /// are skipped, matching the fixed-width prefix fields in v1 headers.
    pub fn nts(&mut self, min_len: usize) -> Result<String> {
        let offset = self.pos;
        let mut out = Vec::new();
        let mut consumed = 0usize;
        loop {
            let byte = self.u8()?;
            if byte != 0 {
                out.push(byte);
            }
            consumed += 1;
            if consumed >= min_len && byte == 0 {
                break;
            }
        }
        String::from_utf8(out).map_err(|source| StreamError::InvalidUtf8 { offset, source })
    }

    pub fn nts_at(&mut self, pos: usize, min_len: usize) -> Result<String> {
        self.seek(pos as i64, Whence::Start)?;
        self.nts(min_len)
    }

    /// Four bytes rendered as reversed uppercase hex: the display form of a
    /// little-endian stored word.
    pub fn hex32(&mut self) -> Result<String> {
        let mut bytes = self.read_array::<4>()?;
        bytes.reverse();
        Ok(hex::encode_upper(bytes))
    }

    // <------   Compression   ------>

    /// Inflate one LZ4 block (or pass through an uncompressed extent).
    ///
    /// `decompressed` is the authoritative output length. A decoded block of
    /// a different size is reported and returned as-is.
    pub fn read_lz4_block(
        &mut self,
        compressed: usize,
        decompressed: usize,
        is_compressed: bool,
        offset: Option<usize>,
    ) -> Result<Vec<u8>> {
        if let Some(pos) = offset {
            self.seek(pos as i64, Whence::Start)?;
        }
        if is_compressed {
            let raw = self.read(compressed)?;
            let out = lz4_flex::block::decompress(raw, decompressed)?;
            if out.len() != decompressed {
                warn!(
                    expected = decompressed,
                    actual = out.len(),
                    "LZ4 block size mismatch"
                );
            }
            Ok(out)
        } else {
            self.read_vec(decompressed)
        }
    }

    // <------   Scoped overrides   ------>

    /// Apply a set of overrides for a scope. Ambient state and the cursor
    /// position are restored when the returned guard drops.
    pub fn scoped(&mut self, overrides: Overrides) -> Result<StreamScope<'_, 'a>> {
        let saved = SavedState {
            endian: self.endian,
            signed: self.signed,
            width: self.width,
            blob_len: self.blob_len,
            pos: self.pos,
        };
        if let Some(endian) = overrides.endian {
            self.endian = endian;
        }
        if let Some(signed) = overrides.signed {
            self.signed = signed;
        }
        if let Some(width) = overrides.width {
            self.width = width;
        }
        if let Some(blob_len) = overrides.blob_len {
            self.blob_len = blob_len;
        }
        if let Some((offset, whence)) = overrides.seek {
            self.seek(offset, whence)?;
        }
        Ok(StreamScope {
            stream: self,
            saved,
        })
    }
}

/// Overrides accepted by [`ByteStream::scoped`]. Unset fields keep the
/// stream's current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub endian: Option<Endian>,
    pub signed: Option<bool>,
    pub width: Option<usize>,
    pub blob_len: Option<usize>,
    pub seek: Option<(i64, Whence)>,
}

impl Overrides {
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = Some(signed);
        self
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn blob_len(mut self, blob_len: usize) -> Self {
        self.blob_len = Some(blob_len);
        self
    }

    pub fn seek(mut self, offset: i64, whence: Whence) -> Self {
        self.seek = Some((offset, whence));
        self
    }
}

struct SavedState {
    endian: Endian,
    signed: bool,
    width: usize,
    blob_len: usize,
    pos: usize,
}

/// Guard returned by [`ByteStream::scoped`]. Dereferences to the stream;
/// restores ambient state and position on drop.
pub struct StreamScope<'s, 'a> {
    stream: &'s mut ByteStream<'a>,
    saved: SavedState,
}

impl<'a> Deref for StreamScope<'_, 'a> {
    type Target = ByteStream<'a>;

    fn deref(&self) -> &Self::Target {
        self.stream
    }
}

impl<'a> DerefMut for StreamScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut ByteStream<'a> {
        self.stream
    }
}

impl Drop for StreamScope<'_, '_> {
    fn drop(&mut self) {
        self.stream.endian = self.saved.endian;
        self.stream.signed = self.saved.signed;
        self.stream.width = self.saved.width;
        self.stream.blob_len = self.saved.blob_len;
        self.stream.pos = self.saved.pos;
    }
}

/// Widen an IEEE 754 binary16 to f32.
fn f16_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exponent = u32::from((bits >> 10) & 0x1F);
    let mantissa = u32::from(bits & 0x3FF);

    let magnitude = match exponent {
        0 if mantissa == 0 => 0,
        0 => {
            // Subnormal: renormalize into f32 range.
            let mut exp = 113u32;
            let mut m = mantissa;
            while m & 0x400 == 0 {
                m <<= 1;
                exp -= 1;
            }
            (exp << 23) | ((m & 0x3FF) << 13)
        }
        // Inf / NaN
        0x1F => (0xFF << 23) | (mantissa << 13),
        e => ((e + 112) << 23) | (mantissa << 13),
    };

    f32::from_bits(sign | magnitude)
}
