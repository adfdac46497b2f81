//! Framed byte codec for operation and result payloads.
//!
//! A streaming writer/reader over a growable byte buffer. All integers are
//! little-endian. Strings are raw UTF-8 terminated by a single NUL byte.
//! Byte arrays carry a u16 length prefix; arrays of byte arrays carry a u16
//! count followed by each element.
//!
//! Instants are carried as a byte array wrapping a fixed 13-byte big-endian
//! tuple: `year:i16 month:u8 day:u8 hour:u8 minute:u8 second:u8 nanos:u32
//! offset_minutes:i16`. Dates are a u16 count of days since 2020-01-01 UTC.
//! Every node in a network must agree on these layouts for cross-node
//! bounces to decode.

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use time::macros::date;
use time::{Date, Month, OffsetDateTime, Time, UtcOffset};

/// The base date for all day-offset encoded dates.
pub const DATE_BASE: Date = date!(2020 - 01 - 01);

/// Number of bytes in the encoded instant tuple.
const TIME_TUPLE_LEN: usize = 13;

/// Errors raised by the byte codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not enough bytes remain to decode the requested value.
    #[error("short read: expected {expected} bytes, {available} available")]
    ShortRead {
        /// Bytes the value requires.
        expected: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A string field had no NUL terminator before the buffer ended.
    #[error("string missing terminator")]
    MissingTerminator,

    /// A string field contained invalid UTF-8.
    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(String),

    /// A string to be written contained an embedded NUL byte.
    #[error("string contains embedded NUL byte")]
    EmbeddedNul,

    /// A byte array exceeded the u16 length prefix.
    #[error("length {0} exceeds the u16 frame limit")]
    FrameTooLong(usize),

    /// An instant could not be encoded or decoded.
    #[error("invalid time value: {0}")]
    InvalidTime(String),

    /// A date fell outside the encodable day-offset range.
    #[error("date {0} days from base is outside the u16 range")]
    DateOutOfRange(i64),
}

/// Streaming writer producing the framed byte layout.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Returns the written bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    /// Writes a little-endian u16.
    pub fn write_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    /// Writes a little-endian u64.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    /// Writes an IEEE-754 single as its bit pattern.
    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    /// Writes a NUL-terminated UTF-8 string.
    pub fn write_string(&mut self, s: &str) -> Result<(), CodecError> {
        if s.as_bytes().contains(&0) {
            return Err(CodecError::EmbeddedNul);
        }
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    /// Writes a u16-length-prefixed byte array.
    pub fn write_byte_array(&mut self, v: &[u8]) -> Result<(), CodecError> {
        if v.len() > u16::MAX as usize {
            return Err(CodecError::FrameTooLong(v.len()));
        }
        self.write_u16(v.len() as u16);
        self.buf.put_slice(v);
        Ok(())
    }

    /// Writes a u16-counted sequence of byte arrays.
    pub fn write_byte_array_array(&mut self, v: &[Vec<u8>]) -> Result<(), CodecError> {
        if v.len() > u16::MAX as usize {
            return Err(CodecError::FrameTooLong(v.len()));
        }
        self.write_u16(v.len() as u16);
        for a in v {
            self.write_byte_array(a)?;
        }
        Ok(())
    }

    /// Writes an instant as a byte array wrapping the 13-byte tuple.
    pub fn write_time(&mut self, t: OffsetDateTime) -> Result<(), CodecError> {
        let year = t.year();
        if year < i16::MIN as i32 || year > i16::MAX as i32 {
            return Err(CodecError::InvalidTime(format!(
                "year {year} outside the encodable range"
            )));
        }
        let mut tuple = [0u8; TIME_TUPLE_LEN];
        tuple[0..2].copy_from_slice(&(year as i16).to_be_bytes());
        tuple[2] = u8::from(t.month());
        tuple[3] = t.day();
        tuple[4] = t.hour();
        tuple[5] = t.minute();
        tuple[6] = t.second();
        tuple[7..11].copy_from_slice(&t.nanosecond().to_be_bytes());
        tuple[11..13].copy_from_slice(&t.offset().whole_minutes().to_be_bytes());
        self.write_byte_array(&tuple)
    }

    /// Writes a date as a u16 day offset from [`DATE_BASE`].
    pub fn write_date(&mut self, d: Date) -> Result<(), CodecError> {
        let days = i64::from(d.to_julian_day()) - i64::from(DATE_BASE.to_julian_day());
        if !(0..=i64::from(u16::MAX)).contains(&days) {
            return Err(CodecError::DateOutOfRange(days));
        }
        self.write_u16(days as u16);
        Ok(())
    }
}

/// Streaming reader over a framed byte buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over the buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::ShortRead {
                expected: n,
                available: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Reads a single byte.
    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads an IEEE-754 single from its bit pattern.
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads a NUL-terminated UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::MissingTerminator)?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|e| CodecError::InvalidUtf8(e.to_string()))?
            .to_owned();
        self.pos += end + 1;
        Ok(s)
    }

    /// Reads a u16-length-prefixed byte array.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a u16-counted sequence of byte arrays.
    pub fn read_byte_array_array(&mut self) -> Result<Vec<Vec<u8>>, CodecError> {
        let count = self.read_u16()? as usize;
        let mut v = Vec::with_capacity(count);
        for _ in 0..count {
            v.push(self.read_byte_array()?);
        }
        Ok(v)
    }

    /// Reads an instant from its byte-array-wrapped tuple.
    pub fn read_time(&mut self) -> Result<OffsetDateTime, CodecError> {
        let tuple = self.read_byte_array()?;
        if tuple.len() != TIME_TUPLE_LEN {
            return Err(CodecError::InvalidTime(format!(
                "instant tuple is {} bytes, expected {TIME_TUPLE_LEN}",
                tuple.len()
            )));
        }
        let year = i16::from_be_bytes([tuple[0], tuple[1]]);
        let month = Month::try_from(tuple[2])
            .map_err(|e| CodecError::InvalidTime(e.to_string()))?;
        let nanos = u32::from_be_bytes([tuple[7], tuple[8], tuple[9], tuple[10]]);
        let offset_minutes = i16::from_be_bytes([tuple[11], tuple[12]]);
        let date = Date::from_calendar_date(i32::from(year), month, tuple[3])
            .map_err(|e| CodecError::InvalidTime(e.to_string()))?;
        let tod = Time::from_hms_nano(tuple[4], tuple[5], tuple[6], nanos)
            .map_err(|e| CodecError::InvalidTime(e.to_string()))?;
        let offset = UtcOffset::from_whole_seconds(i32::from(offset_minutes) * 60)
            .map_err(|e| CodecError::InvalidTime(e.to_string()))?;
        Ok(OffsetDateTime::new_in_offset(date, tod, offset))
    }

    /// Reads a date from its u16 day offset.
    pub fn read_date(&mut self) -> Result<Date, CodecError> {
        let days = self.read_u16()?;
        Date::from_julian_day(DATE_BASE.to_julian_day() + i32::from(days))
            .map_err(|e| CodecError::InvalidTime(e.to_string()))
    }
}
