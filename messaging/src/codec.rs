//! MessagePack record codec.
//!
//! Records are encoded as a map of `field name -> value` pairs in a fixed
//! order. Encoding is done in two passes: a [`Sizer`] measures the exact
//! number of bytes a record needs, then an [`Encoder`] writes into a buffer of
//! exactly that size. Decoding walks the map and skips any field it does not
//! recognise, so newer encoders can append fields without breaking older
//! decoders.

use bytes::{Buf, Bytes};
use rmp::Marker;

#[cfg(test)]
#[path = "codec.test.rs"]
mod tests;

const NIL: u8 = 0xc0;

/// Errors produced while encoding or decoding records.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Type mismatch: expected {expected}, found {found:?}")]
    TypeMismatch {
        expected: &'static str,
        found: Marker,
    },

    #[error("Invalid marker byte: {0:#04x}")]
    InvalidMarker(u8),

    #[error("Invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("Integer value does not fit in {0}")]
    IntegerOutOfRange(&'static str),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Buffer too small: needed {needed} bytes, {remaining} remaining")]
    BufferTooSmall { needed: usize, remaining: usize },

    #[error("Length {0} exceeds the maximum encodable length")]
    LengthOverflow(usize),

    #[error("Encoded size mismatch: sized {sized} bytes, wrote {written}")]
    SizeMismatch { sized: usize, written: usize },

    #[error("Write error: {0}")]
    Write(String),
}

/// Encoded sizes of the primitives written by a [`Writer`].
mod size {
    use super::CodecError;

    fn checked(len: usize) -> Result<u32, CodecError> {
        u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len))
    }

    pub fn map_header(len: u32) -> usize {
        match len {
            0..=15 => 1,
            16..=0xffff => 3,
            _ => 5,
        }
    }

    pub fn string(len: usize) -> Result<usize, CodecError> {
        let header = match checked(len)? {
            0..=31 => 1,
            32..=0xff => 2,
            0x100..=0xffff => 3,
            _ => 5,
        };
        Ok(header + len)
    }

    pub fn byte_array(len: usize) -> Result<usize, CodecError> {
        let header = match checked(len)? {
            0..=0xff => 2,
            0x100..=0xffff => 3,
            _ => 5,
        };
        Ok(header + len)
    }

    pub const U32: usize = 5;
    pub const NIL: usize = 1;
}

/// The write side of the codec.
///
/// Implemented by [`Sizer`] for the measuring pass and by [`Encoder`] for
/// the writing pass, so a record's `encode` runs unchanged against both.
pub trait Writer {
    fn write_map_size(&mut self, len: u32) -> Result<(), CodecError>;
    fn write_string(&mut self, value: &str) -> Result<(), CodecError>;
    fn write_byte_array(&mut self, value: &[u8]) -> Result<(), CodecError>;
    /// Writes a `u32` in its fixed-width form (`0xce` followed by 4 bytes).
    fn write_u32(&mut self, value: u32) -> Result<(), CodecError>;
    fn write_nil(&mut self) -> Result<(), CodecError>;
}

/// Counts the bytes an encoding would produce without writing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sizer {
    len: usize,
}

impl Sizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Writer for Sizer {
    fn write_map_size(&mut self, len: u32) -> Result<(), CodecError> {
        self.len += size::map_header(len);
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.len += size::string(value.len())?;
        Ok(())
    }

    fn write_byte_array(&mut self, value: &[u8]) -> Result<(), CodecError> {
        self.len += size::byte_array(value.len())?;
        Ok(())
    }

    fn write_u32(&mut self, _value: u32) -> Result<(), CodecError> {
        self.len += size::U32;
        Ok(())
    }

    fn write_nil(&mut self) -> Result<(), CodecError> {
        self.len += size::NIL;
        Ok(())
    }
}

/// Writes MessagePack into a caller-provided, fixed-size buffer.
///
/// The encoder never grows its buffer: a write that does not fit fails with
/// [`CodecError::BufferTooSmall`] and leaves the position untouched.
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn put<F, E>(&mut self, needed: usize, write: F) -> Result<(), CodecError>
    where
        F: FnOnce(&mut &mut [u8]) -> Result<(), E>,
        E: std::fmt::Display,
    {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(CodecError::BufferTooSmall { needed, remaining });
        }
        let mut rest: &mut [u8] = &mut self.buf[self.pos..];
        write(&mut rest).map_err(|e| CodecError::Write(e.to_string()))?;
        self.pos += remaining - rest.len();
        Ok(())
    }
}

impl Writer for Encoder<'_> {
    fn write_map_size(&mut self, len: u32) -> Result<(), CodecError> {
        self.put(size::map_header(len), |wr| {
            rmp::encode::write_map_len(wr, len).map(|_| ())
        })
    }

    fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let needed = size::string(value.len())?;
        self.put(needed, |wr| rmp::encode::write_str(wr, value))
    }

    fn write_byte_array(&mut self, value: &[u8]) -> Result<(), CodecError> {
        let needed = size::byte_array(value.len())?;
        self.put(needed, |wr| rmp::encode::write_bin(wr, value))
    }

    fn write_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.put(size::U32, |wr| rmp::encode::write_u32(wr, value))
    }

    fn write_nil(&mut self) -> Result<(), CodecError> {
        self.put(size::NIL, |wr| rmp::encode::write_nil(wr))
    }
}

/// Options controlling how lenient the decoder is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail on field names the record does not know instead of skipping them.
    pub deny_unknown_fields: bool,
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            deny_unknown_fields: true,
        }
    }
}

/// Reads MessagePack values from a byte slice.
pub struct Decoder<'a> {
    buf: &'a [u8],
    options: DecodeOptions,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_options(buf, DecodeOptions::default())
    }

    pub fn with_options(buf: &'a [u8], options: DecodeOptions) -> Self {
        Self { buf, options }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.buf.remaining();
        if needed > remaining {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_be_u16(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    fn read_be_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn read_be_u64(&mut self) -> Result<u64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    fn read_marker(&mut self) -> Result<Marker, CodecError> {
        self.read_u8().map(Marker::from_u8)
    }

    /// Peeks at the next value without consuming it.
    pub fn is_next_nil(&self) -> Result<bool, CodecError> {
        match self.buf.first() {
            Some(byte) => Ok(*byte == NIL),
            None => Err(CodecError::UnexpectedEof {
                needed: 1,
                remaining: 0,
            }),
        }
    }

    pub fn read_nil(&mut self) -> Result<(), CodecError> {
        match self.read_marker()? {
            Marker::Null => Ok(()),
            found => Err(CodecError::TypeMismatch {
                expected: "nil",
                found,
            }),
        }
    }

    pub fn read_map_size(&mut self) -> Result<u32, CodecError> {
        match self.read_marker()? {
            Marker::FixMap(len) => Ok(len as u32),
            Marker::Map16 => self.read_be_u16().map(u32::from),
            Marker::Map32 => self.read_be_u32(),
            found => Err(CodecError::TypeMismatch {
                expected: "map",
                found,
            }),
        }
    }

    /// Reads a string, borrowing it from the input.
    pub fn read_str(&mut self) -> Result<&'a str, CodecError> {
        let len = match self.read_marker()? {
            Marker::FixStr(len) => len as usize,
            Marker::Str8 => self.read_u8()? as usize,
            Marker::Str16 => self.read_be_u16()? as usize,
            Marker::Str32 => self.read_be_u32()? as usize,
            found => {
                return Err(CodecError::TypeMismatch {
                    expected: "string",
                    found,
                });
            }
        };
        let raw = self.take(len)?;
        std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        self.read_str().map(str::to_owned)
    }

    /// Reads a byte array, borrowing it from the input.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = match self.read_marker()? {
            Marker::Bin8 => self.read_u8()? as usize,
            Marker::Bin16 => self.read_be_u16()? as usize,
            Marker::Bin32 => self.read_be_u32()? as usize,
            found => {
                return Err(CodecError::TypeMismatch {
                    expected: "binary",
                    found,
                });
            }
        };
        self.take(len)
    }

    pub fn read_byte_array(&mut self) -> Result<Bytes, CodecError> {
        self.read_bytes().map(Bytes::copy_from_slice)
    }

    /// Reads any MessagePack integer whose value fits in a `u32`.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let value: i128 = match self.read_marker()? {
            Marker::FixPos(v) => v.into(),
            Marker::FixNeg(v) => v.into(),
            Marker::U8 => self.read_u8()?.into(),
            Marker::U16 => self.read_be_u16()?.into(),
            Marker::U32 => self.read_be_u32()?.into(),
            Marker::U64 => self.read_be_u64()?.into(),
            Marker::I8 => (self.read_u8()? as i8).into(),
            Marker::I16 => (self.read_be_u16()? as i16).into(),
            Marker::I32 => (self.read_be_u32()? as i32).into(),
            Marker::I64 => (self.read_be_u64()? as i64).into(),
            found => {
                return Err(CodecError::TypeMismatch {
                    expected: "integer",
                    found,
                });
            }
        };
        u32::try_from(value).map_err(|_| CodecError::IntegerOutOfRange("u32"))
    }

    /// Consumes and discards exactly one value of any type.
    ///
    /// Containers are skipped by counting outstanding values rather than by
    /// recursion, so deeply nested input cannot exhaust the stack.
    pub fn skip(&mut self) -> Result<(), CodecError> {
        let mut pending: u64 = 1;
        while pending > 0 {
            pending -= 1;
            let marker = self.read_marker()?;
            let len = match marker {
                Marker::Null
                | Marker::True
                | Marker::False
                | Marker::FixPos(_)
                | Marker::FixNeg(_) => 0,
                Marker::U8 | Marker::I8 => 1,
                Marker::U16 | Marker::I16 => 2,
                Marker::U32 | Marker::I32 | Marker::F32 => 4,
                Marker::U64 | Marker::I64 | Marker::F64 => 8,
                Marker::FixStr(len) => len as usize,
                Marker::Str8 | Marker::Bin8 => self.read_u8()? as usize,
                Marker::Str16 | Marker::Bin16 => self.read_be_u16()? as usize,
                Marker::Str32 | Marker::Bin32 => self.read_be_u32()? as usize,
                Marker::FixArray(len) => {
                    pending += len as u64;
                    0
                }
                Marker::Array16 => {
                    pending += self.read_be_u16()? as u64;
                    0
                }
                Marker::Array32 => {
                    pending += self.read_be_u32()? as u64;
                    0
                }
                Marker::FixMap(len) => {
                    pending += 2 * len as u64;
                    0
                }
                Marker::Map16 => {
                    pending += 2 * self.read_be_u16()? as u64;
                    0
                }
                Marker::Map32 => {
                    pending += 2 * self.read_be_u32()? as u64;
                    0
                }
                // Ext payloads carry a one byte type tag ahead of the data.
                Marker::FixExt1 => 2,
                Marker::FixExt2 => 3,
                Marker::FixExt4 => 5,
                Marker::FixExt8 => 9,
                Marker::FixExt16 => 17,
                Marker::Ext8 => self.read_u8()? as usize + 1,
                Marker::Ext16 => self.read_be_u16()? as usize + 1,
                Marker::Ext32 => self.read_be_u32()? as usize + 1,
                Marker::Reserved => return Err(CodecError::InvalidMarker(marker.to_u8())),
            };
            self.take(len)?;
        }
        Ok(())
    }

    /// Handles a map entry whose name the record does not know.
    pub fn skip_field(&mut self, name: &str) -> Result<(), CodecError> {
        if self.options.deny_unknown_fields {
            return Err(CodecError::UnknownField(name.to_string()));
        }
        tracing::trace!(field = name, "skipping unknown field");
        self.skip()
    }
}

/// A value that can write itself through a [`Writer`].
pub trait Encode {
    fn encode<W: Writer>(&self, w: &mut W) -> Result<(), CodecError>;
}

/// A value that can read itself from a [`Decoder`].
pub trait Decode: Sized {
    fn decode(d: &mut Decoder<'_>) -> Result<Self, CodecError>;
}

/// A single typed record field.
pub trait Field: Sized {
    fn write_field<W: Writer>(&self, w: &mut W) -> Result<(), CodecError>;
    fn read_field(d: &mut Decoder<'_>) -> Result<Self, CodecError>;
}

impl Field for String {
    fn write_field<W: Writer>(&self, w: &mut W) -> Result<(), CodecError> {
        w.write_string(self)
    }

    fn read_field(d: &mut Decoder<'_>) -> Result<Self, CodecError> {
        d.read_string()
    }
}

impl Field for Bytes {
    fn write_field<W: Writer>(&self, w: &mut W) -> Result<(), CodecError> {
        w.write_byte_array(self)
    }

    fn read_field(d: &mut Decoder<'_>) -> Result<Self, CodecError> {
        d.read_byte_array()
    }
}

impl Field for u32 {
    fn write_field<W: Writer>(&self, w: &mut W) -> Result<(), CodecError> {
        w.write_u32(*self)
    }

    fn read_field(d: &mut Decoder<'_>) -> Result<Self, CodecError> {
        d.read_u32()
    }
}

/// Returns the exact number of bytes `value` encodes to.
pub fn encoded_len<T: Encode + ?Sized>(value: &T) -> Result<usize, CodecError> {
    let mut sizer = Sizer::new();
    value.encode(&mut sizer)?;
    Ok(sizer.len())
}

/// Encodes `value` into an exactly sized buffer.
pub fn encode_to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Bytes, CodecError> {
    let sized = encoded_len(value)?;
    let mut buf = vec![0u8; sized];
    let written = {
        let mut encoder = Encoder::new(&mut buf);
        value.encode(&mut encoder)?;
        encoder.position()
    };
    if written != sized {
        return Err(CodecError::SizeMismatch { sized, written });
    }
    Ok(Bytes::from(buf))
}

/// Decodes a value using the default, lenient options.
pub fn decode_from_slice<T: Decode>(bytes: &[u8]) -> Result<T, CodecError> {
    decode_from_slice_with(bytes, DecodeOptions::default())
}

pub fn decode_from_slice_with<T: Decode>(
    bytes: &[u8],
    options: DecodeOptions,
) -> Result<T, CodecError> {
    let mut decoder = Decoder::with_options(bytes, options);
    T::decode(&mut decoder)
}
