//! Declarative field decoding.
//!
//! Every structured decoder reads its fields in declaration order through a
//! [`FieldDriver`]. The driver remembers where the object started; when any
//! field fails, the error is wrapped with the decoder name, the field name,
//! the object's start offset, and a hex dump of the bytes around the failure
//! point. The binding vocabulary mirrors the formats' needs: raw bytes,
//! ambient-width integers, halfs/floats/doubles, the three string framings,
//! checked literals, CRC words, nested containers, and count-prefixed lists.

use tracing::warn;

use rmd_stream::{ByteStream, Endian, dump};

use crate::container::Container;
use crate::dp::DpFile;
use crate::error::{DatastreamError, Result};
use crate::registry::Registry;
use crate::types::{BoundBox, Gid, Mat3, ObjectId, Rid, Vec2, Vec3};

/// Ambient references a decoder may need: the container registry for nested
/// `dsc` bindings and the DP side table for packed-offset bindings.
#[derive(Clone, Copy, Default)]
pub struct DecodeCtx<'r> {
    pub registry: Option<&'r Registry>,
    pub dp: Option<&'r DpFile>,
}

impl<'r> DecodeCtx<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry: Some(registry),
            dp: None,
        }
    }

    pub fn with_dp(dp: Option<&'r DpFile>) -> Self {
        Self {
            registry: None,
            dp,
        }
    }
}

/// String framing accepted by the `str`/`checkstr` bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrArg {
    /// Read until NUL.
    Nts,
    /// u32 length prefix (ambient width).
    LenPrefixed,
    /// Exactly `n` bytes.
    Fixed(usize),
}

pub struct FieldDriver<'s, 'a, 'r> {
    stream: &'s mut ByteStream<'a>,
    ctx: DecodeCtx<'r>,
    decoder: &'static str,
    start: usize,
}

impl<'s, 'a, 'r> FieldDriver<'s, 'a, 'r> {
    pub fn new(stream: &'s mut ByteStream<'a>, ctx: DecodeCtx<'r>, decoder: &'static str) -> Self {
        let start = stream.tell();
        Self {
            stream,
            ctx,
            decoder,
            start,
        }
    }

    /// Offset at which this object started.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Run one field read, attaching decode context to any failure.
    pub fn field<T>(
        &mut self,
        name: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        match f(self) {
            Ok(value) => Ok(value),
            Err(source) => {
                let pos = self.stream.tell();
                let data = self.stream.as_bytes();
                let lo = pos.saturating_sub(16);
                let hi = (pos + 16).min(data.len());
                Err(DatastreamError::Field {
                    decoder: self.decoder,
                    field: name,
                    offset: self.start,
                    dump: dump(&data[lo..hi]),
                    source: Box::new(source),
                })
            }
        }
    }

    /// Escape hatch to the underlying stream for one-off reads.
    pub fn s(&mut self) -> &mut ByteStream<'a> {
        self.stream
    }

    // <------   Primitive bindings   ------>

    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.stream.read_vec(n)?)
    }

    /// Ambient-width integer honoring the stream's signedness, as the plain
    /// `int` binding does.
    pub fn int(&mut self) -> Result<i64> {
        Ok(self.stream.ambient_int()?)
    }

    /// Ambient-width unsigned integer.
    pub fn uint(&mut self) -> Result<u64> {
        Ok(self.stream.ambient_uint()?)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.stream.u8()?)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(self.stream.u16()?)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(self.stream.u32()?)
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(self.stream.u64()?)
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.stream.i32()?)
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(self.stream.i64()?)
    }

    pub fn f16(&mut self) -> Result<f32> {
        Ok(self.stream.f16()?)
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(self.stream.f32()?)
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(self.stream.f64()?)
    }

    pub fn boolean(&mut self) -> Result<bool> {
        Ok(self.stream.boolean()?)
    }

    pub fn str_arg(&mut self, arg: StrArg) -> Result<String> {
        match arg {
            StrArg::Nts => Ok(self.stream.nts(1)?),
            StrArg::LenPrefixed => Ok(self.stream.istr()?),
            StrArg::Fixed(n) => Ok(self.stream.string(n)?),
        }
    }

    /// Null-terminated string.
    pub fn nts(&mut self) -> Result<String> {
        self.str_arg(StrArg::Nts)
    }

    /// Length-prefixed string.
    pub fn istr(&mut self) -> Result<String> {
        self.str_arg(StrArg::LenPrefixed)
    }

    /// String that must equal `expected`.
    pub fn checkstr(&mut self, expected: &str, arg: StrArg) -> Result<String> {
        let found = self.str_arg(arg)?;
        if found != expected {
            return Err(DatastreamError::CheckFailed {
                expected: expected.to_owned(),
                found,
            });
        }
        Ok(found)
    }

    /// Four bytes as uppercase hex, in stored order.
    pub fn crc(&mut self) -> Result<String> {
        Ok(hex::encode_upper(self.stream.read_array::<4>()?))
    }

    // <------   Composite bindings   ------>

    /// `count` repetitions of `f`; the count is a u32le prefix when not
    /// given.
    pub fn iter<T>(
        &mut self,
        len: Option<usize>,
        mut f: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = match len {
            Some(n) => n,
            None => self.stream.uint_with(4, Endian::Little)? as usize,
        };
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    /// Decode a nested object over the same stream.
    pub fn subitem<T>(
        &mut self,
        f: impl FnOnce(&mut ByteStream, DecodeCtx) -> Result<T>,
    ) -> Result<T> {
        f(self.stream, self.ctx)
    }

    /// One nested datastream container.
    pub fn dsc(&mut self) -> Result<Container> {
        let registry = self.ctx.registry.ok_or(DatastreamError::NoRegistry)?;
        Container::parse(self.stream, registry)
    }

    /// Count-prefixed (or fixed-length) run of containers.
    pub fn iter_dsc(&mut self, len: Option<usize>) -> Result<Vec<Container>> {
        self.iter(len, FieldDriver::dsc)
    }

    // <------   Identifier bindings   ------>

    pub fn rid(&mut self) -> Result<Rid> {
        Ok(Rid::read(self.stream)?)
    }

    pub fn rid_long(&mut self) -> Result<Rid> {
        Ok(Rid::read_long(self.stream)?)
    }

    pub fn gid(&mut self) -> Result<Gid> {
        Ok(Gid::read(self.stream)?)
    }

    pub fn oid(&mut self) -> Result<ObjectId> {
        Ok(ObjectId::read(self.stream)?)
    }

    pub fn vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::read(self.stream)?)
    }

    pub fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::read(self.stream)?)
    }

    pub fn mat3(&mut self) -> Result<Mat3> {
        Ok(Mat3::read(self.stream)?)
    }

    pub fn bound_box(&mut self) -> Result<BoundBox> {
        Ok(BoundBox::read(self.stream)?)
    }

    // <------   DP-backed bindings   ------>

    /// A string resolved through the DP side table: the stream carries the
    /// packed offset word.
    pub fn dp_str(&mut self) -> Result<Option<String>> {
        let raw = u64::from(self.stream.u32()?);
        match self.ctx.dp {
            Some(dp) => Ok(dp.get_string(raw)),
            None => {
                warn!(decoder = self.decoder, "DP string binding without a DP file");
                Ok(None)
            }
        }
    }

    /// A fixed- or prefix-counted run of DP strings. Count first, then one
    /// offset word per element.
    pub fn dp_str_list(&mut self, fixed: Option<usize>) -> Result<Vec<Option<String>>> {
        let count = match fixed {
            Some(n) => n,
            None => self.stream.u32()? as usize,
        };
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(self.dp_str()?);
        }
        Ok(out)
    }

    /// A DP-resident list: the stream carries `count` then the offset word.
    pub fn dp_list<T>(
        &mut self,
        what: &'static str,
        read: impl FnMut(&mut ByteStream) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.stream.u32()? as usize;
        let raw = u64::from(self.stream.u32()?);
        match self.ctx.dp {
            Some(dp) => Ok(dp.get_list(raw, count, what, read)),
            None => {
                warn!(decoder = self.decoder, what, "DP list binding without a DP file");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_error_carries_context() {
        let mut stream = ByteStream::new(&[1, 2]);
        let mut driver = FieldDriver::new(&mut stream, DecodeCtx::default(), "TestDecoder");
        let err = driver.field("missing", FieldDriver::u32).unwrap_err();
        match err {
            DatastreamError::Field {
                decoder,
                field,
                offset,
                ..
            } => {
                assert_eq!(decoder, "TestDecoder");
                assert_eq!(field, "missing");
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn checkstr_mismatch() {
        let mut stream = ByteStream::new(b"RMDX");
        let mut driver = FieldDriver::new(&mut stream, DecodeCtx::default(), "TestDecoder");
        let err = driver.checkstr("RMDL", StrArg::Fixed(4)).unwrap_err();
        assert!(matches!(err, DatastreamError::CheckFailed { .. }));
    }

    #[test]
    fn iter_prefix_count() {
        let mut data = vec![3, 0, 0, 0];
        data.extend_from_slice(&[1, 0, 2, 0, 3, 0]);
        let mut stream = ByteStream::new(&data);
        let mut driver = FieldDriver::new(&mut stream, DecodeCtx::default(), "TestDecoder");
        let out = driver.iter(None, FieldDriver::u16).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn idempotent_decode() {
        // Same payload, two drivers: fields must be structurally equal.
        let data = [7, 0, 0, 0, 1, 0x41, 0x42, 0];
        let decode = |bytes: &[u8]| -> (u32, bool, String) {
            let mut stream = ByteStream::new(bytes);
            let mut d = FieldDriver::new(&mut stream, DecodeCtx::default(), "TestDecoder");
            (
                d.field("a", FieldDriver::u32).unwrap(),
                d.field("b", FieldDriver::boolean).unwrap(),
                d.field("c", FieldDriver::nts).unwrap(),
            )
        };
        assert_eq!(decode(&data), decode(&data));
    }
}
