//! Growable wire buffer and string encodings.
//!
//! Everything that goes on the wire is built in a [`WireBuffer`] and every
//! reply is read back through its bounds-checked accessors. A read that would
//! run past the logical length fails with [`Error::DataError`]; no decoder in
//! this crate indexes reply bytes directly.

use crate::{error::Error, utils::Result};
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use std::{fmt, io};

/// String encoding used on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Charset {
    /// 8-bit legacy charset (ISO-8859-1).
    Narrow,
    /// 16-bit little-endian (UTF-16LE).
    Wide,
}

impl Charset {
    /// Size of one character unit, and of the terminator.
    pub fn unit(self) -> usize {
        match self {
            Charset::Narrow => 1,
            Charset::Wide => 2,
        }
    }

    pub fn is_wide(self) -> bool {
        self == Charset::Wide
    }
}

/// Encode `text` in `charset`, optionally followed by a terminator unit.
///
/// Narrow strings fail with [`Error::InvalidParameter`] when `text` holds a
/// character outside the 8-bit range.
pub fn encode_string(charset: Charset, text: &str, terminate: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((text.len() + 1) * charset.unit());
    match charset {
        Charset::Narrow => {
            for c in text.chars() {
                let c = u8::try_from(u32::from(c)).map_err(|_| Error::InvalidParameter)?;
                out.push(c);
            }
        }
        Charset::Wide => {
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
        }
    }
    if terminate {
        out.resize(out.len() + charset.unit(), 0);
    }
    Ok(out)
}

/// Decode a string from `bytes`, stopping at the first terminator unit.
///
/// A wide string with an odd trailing byte or an unpaired surrogate is a
/// malformed reply.
pub fn decode_string(charset: Charset, bytes: &[u8]) -> Result<String> {
    match charset {
        Charset::Narrow => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Ok(bytes[..end].iter().map(|&b| char::from(b)).collect())
        }
        Charset::Wide => {
            let units = bytes
                .chunks(2)
                .map(|c| match c {
                    [lo, hi] => Ok(u16::from_le_bytes([*lo, *hi])),
                    _ => Err(Error::InvalidNetworkResponse),
                })
                .take_while(|u| *u != Ok(0));
            let mut out = String::new();
            let mut pending = Vec::new();
            for unit in units {
                pending.push(unit?);
            }
            for c in char::decode_utf16(pending) {
                out.push(c.map_err(|_| Error::InvalidNetworkResponse)?);
            }
            Ok(out)
        }
    }
}

/// An exclusively owned byte sequence with a logical length.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WireBuffer {
    buf: BytesMut,
}

impl WireBuffer {
    pub fn new() -> WireBuffer {
        WireBuffer {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> WireBuffer {
        WireBuffer {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Freeze into an immutable, cheaply clonable byte run.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn push_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn push_u16_le(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn push_u32_le(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn push_u64_le(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `n` copies of `byte`.
    pub fn push_fill(&mut self, byte: u8, n: usize) {
        self.buf.put_bytes(byte, n);
    }

    /// Append `text` in `charset`.
    ///
    /// With `align_odd`, a wide string pushed at an even length is preceded by
    /// one zero pad byte. Request byte blocks start at an odd offset from the
    /// SMB header, so this puts the string on an even header offset.
    ///
    /// Returns the number of string bytes written, pad excluded.
    pub fn push_string(
        &mut self,
        charset: Charset,
        text: &str,
        terminate: bool,
        align_odd: bool,
    ) -> Result<usize> {
        let encoded = encode_string(charset, text, terminate)?;
        if align_odd && charset.is_wide() && self.len() % 2 == 0 {
            self.push_u8(0);
        }
        self.push_bytes(&encoded);
        Ok(encoded.len())
    }

    /// Append a one-byte tag followed by `bytes`.
    pub fn push_length_prefixed(&mut self, prefix: u8, bytes: &[u8]) {
        self.push_u8(prefix);
        self.push_bytes(bytes);
    }

    /// Append a buffer-format path: tag `4`, then the terminated path.
    pub fn push_path(&mut self, charset: Charset, path: &str) -> Result<usize> {
        match charset {
            Charset::Narrow => {
                let encoded = encode_string(charset, path, true)?;
                self.push_length_prefixed(crate::proto::BUFFER_FORMAT_ASCII, &encoded);
                Ok(encoded.len())
            }
            Charset::Wide => {
                self.push_u8(crate::proto::BUFFER_FORMAT_ASCII);
                self.push_string(charset, path, true, true)
            }
        }
    }

    /// Overwrite two bytes at `offset` with `v`.
    pub fn patch_u16_le(&mut self, offset: usize, v: u16) -> Result<()> {
        let end = self.checked_end(offset, 2)?;
        LittleEndian::write_u16(&mut self.buf[offset..end], v);
        Ok(())
    }

    /// Overwrite four bytes at `offset` with `v`.
    pub fn patch_u32_le(&mut self, offset: usize, v: u32) -> Result<()> {
        let end = self.checked_end(offset, 4)?;
        LittleEndian::write_u32(&mut self.buf[offset..end], v);
        Ok(())
    }

    fn checked_end(&self, offset: usize, len: usize) -> Result<usize> {
        offset
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(Error::DataError)
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = self.checked_end(offset, len)?;
        Ok(&self.buf[offset..end])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(offset, 2)?))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(offset, 4)?))
    }

    pub fn read_u64_le(&self, offset: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(offset, 8)?))
    }

    /// Two little-endian 32-bit halves, low word first.
    pub fn read_u32_pair_le(&self, offset: usize) -> Result<u64> {
        let lo = self.read_u32_le(offset)?;
        let hi = self.read_u32_le(offset + 4)?;
        Ok((u64::from(hi) << 32) | u64::from(lo))
    }

    /// Everything from `offset` to the end.
    pub fn read_rest(&self, offset: usize) -> Result<&[u8]> {
        let len = self.len().checked_sub(offset).ok_or(Error::DataError)?;
        self.read_bytes(offset, len)
    }

    /// Decode `len` bytes at `offset` as a string.
    pub fn read_string(&self, charset: Charset, offset: usize, len: usize) -> Result<String> {
        decode_string(charset, self.read_bytes(offset, len)?)
    }

    /// Copy `len` bytes at `offset` into a fresh buffer.
    pub fn slice(&self, offset: usize, len: usize) -> Result<WireBuffer> {
        Ok(WireBuffer::from(self.read_bytes(offset, len)?))
    }
}

impl From<&[u8]> for WireBuffer {
    fn from(bytes: &[u8]) -> Self {
        WireBuffer {
            buf: BytesMut::from(bytes),
        }
    }
}

impl From<Vec<u8>> for WireBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        WireBuffer {
            buf: BytesMut::from(&bytes[..]),
        }
    }
}

impl From<Bytes> for WireBuffer {
    fn from(bytes: Bytes) -> Self {
        WireBuffer {
            buf: BytesMut::from(&bytes[..]),
        }
    }
}

impl From<BytesMut> for WireBuffer {
    fn from(buf: BytesMut) -> Self {
        WireBuffer { buf }
    }
}

impl AsRef<[u8]> for WireBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl io::Write for WireBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for WireBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "WireBuffer({} bytes)", self.len())
    }
}
