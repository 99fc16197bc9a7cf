//! Serialize/deserialize SMB1 messages into/from binary.

use crate::{
    buffer::WireBuffer,
    io_err,
    proto::*,
    res,
    status::NtStatus,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Result};
use std::mem;
use std::ops::Shl;

/// A serializing specific result to overload operators on `Result`
///
/// # Overloaded operators
/// <<, ?
pub struct SResult<T>(::std::io::Result<T>);

impl<W: WriteBytesExt> SResult<Encoder<W>> {
    /// Total bytes written by the chain, or the first error.
    pub fn written(self) -> Result<usize> {
        self.0.map(|enc| enc.bytes_written())
    }
}

/// A wrapper class of WriteBytesExt to provide operator overloads
/// for serializing
///
/// Operator '<<' serializes the right hand side argument into
/// the left hand side encoder
#[derive(Clone, Debug)]
pub struct Encoder<W> {
    writer: W,
    bytes: usize,
}

impl<W: WriteBytesExt> Encoder<W> {
    pub fn new(writer: W) -> Encoder<W> {
        Encoder { writer, bytes: 0 }
    }

    /// Return total bytes written
    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    /// Encode data, equivalent to: encoder << data
    pub fn encode<T: Encodable + ?Sized>(&mut self, data: &T) -> Result<usize> {
        let bytes = data.encode(&mut self.writer)?;
        self.bytes += bytes;
        Ok(bytes)
    }

    /// Get inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<'a, T: Encodable + ?Sized, W: WriteBytesExt> Shl<&'a T> for Encoder<W> {
    type Output = SResult<Encoder<W>>;
    fn shl(mut self, rhs: &'a T) -> Self::Output {
        match self.encode(rhs) {
            Ok(_) => SResult(Ok(self)),
            Err(e) => SResult(Err(e)),
        }
    }
}

impl<'a, T: Encodable + ?Sized, W: WriteBytesExt> Shl<&'a T> for SResult<Encoder<W>> {
    type Output = Self;
    fn shl(self, rhs: &'a T) -> Self::Output {
        match self.0 {
            Ok(mut encoder) => match encoder.encode(rhs) {
                Ok(_) => SResult(Ok(encoder)),
                Err(e) => SResult(Err(e)),
            },
            Err(e) => SResult(Err(e)),
        }
    }
}

/// Trait representing a type which can be serialized into binary
pub trait Encodable {
    /// Encode self to w and returns the number of bytes encoded
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize>;
}

impl Encodable for u8 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u8(*self).and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u16 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u16::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u32 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u32::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u64 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u64::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

/// Raw bytes, written as-is without a length prefix.
impl Encodable for [u8] {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_all(self).and(Ok(self.len()))
    }
}

impl Encodable for WireBuffer {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        self.as_slice().encode(w)
    }
}

/// Trait representing a type which can be deserialized from binary
pub trait Decodable: Sized {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self>;
}

impl Decodable for u8 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u8()
    }
}

impl Decodable for u16 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u16::<LittleEndian>()
    }
}

impl Decodable for u32 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u32::<LittleEndian>()
    }
}

/// The fixed 32-byte SMB1 header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SmbHeader {
    pub command: u8,
    pub status: NtStatus,
    pub flags: HeaderFlags,
    pub flags2: HeaderFlags2,
    pub pid_high: u16,
    pub signature: [u8; 8],
    pub tid: u16,
    pub pid: u16,
    pub uid: u16,
    pub mid: u16,
}

impl SmbHeader {
    pub fn is_reply(&self) -> bool {
        self.flags.contains(HeaderFlags::REPLY)
    }
}

impl Encodable for SmbHeader {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        (Encoder::new(w)
            << &SMB_MAGIC[..]
            << &self.command
            << &self.status.code()
            << &self.flags.bits()
            << &self.flags2.bits()
            << &self.pid_high
            << &self.signature[..]
            << &0u16
            << &self.tid
            << &self.pid
            << &self.uid
            << &self.mid)
            .written()
    }
}

impl Decodable for SmbHeader {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != SMB_MAGIC {
            return res!(io_err!(InvalidData, "Not an SMB1 message"));
        }

        let command = Decodable::decode(r)?;
        let status = NtStatus(Decodable::decode(r)?);
        let flags = HeaderFlags::from_bits_truncate(Decodable::decode(r)?);
        let flags2 = HeaderFlags2::from_bits_truncate(Decodable::decode(r)?);
        let pid_high = Decodable::decode(r)?;
        let mut signature = [0u8; 8];
        r.read_exact(&mut signature)?;
        let _reserved: u16 = Decodable::decode(r)?;

        Ok(SmbHeader {
            command,
            status,
            flags,
            flags2,
            pid_high,
            signature,
            tid: Decodable::decode(r)?,
            pid: Decodable::decode(r)?,
            uid: Decodable::decode(r)?,
            mid: Decodable::decode(r)?,
        })
    }
}

/// One complete SMB1 message: header, word block and byte block.
#[derive(Clone, Debug)]
pub struct SmbMessage {
    pub header: SmbHeader,
    /// Parameter words, `2 * wct` bytes
    pub words: WireBuffer,
    /// Byte block, `bcc` bytes
    pub bytes: WireBuffer,
    /// The whole message; transaction offsets are relative to its start
    pub raw: WireBuffer,
}

impl SmbMessage {
    /// Word count.
    pub fn wct(&self) -> usize {
        self.words.len() / 2
    }

    /// Offset of the byte block from the start of the header.
    pub fn bytes_offset(&self) -> usize {
        HEADER_SIZE + 1 + self.words.len() + 2
    }
}

/// Write a complete message into a byte-oriented stream.
///
/// `words` must hold an even number of bytes.
pub fn write_msg<W: WriteBytesExt>(
    w: &mut W,
    header: &SmbHeader,
    words: &[u8],
    bytes: &[u8],
) -> Result<usize> {
    if words.len() % 2 != 0 || words.len() / 2 > usize::from(u8::MAX) {
        return res!(io_err!(InvalidInput, "Invalid word block"));
    }
    let bcc = u16::try_from(bytes.len()).map_err(|_| io_err!(InvalidInput, "Byte block too long"))?;

    (Encoder::new(w) << header << &((words.len() / 2) as u8) << words << &bcc << bytes).written()
}

/// Parse one SMB1 message.
///
/// The word and byte blocks must lie inside `frame`; trailing bytes beyond
/// the declared byte count are ignored.
pub fn read_msg(frame: &[u8]) -> Result<SmbMessage> {
    if frame.len() < MIN_MESSAGE_SIZE {
        return res!(io_err!(UnexpectedEof, "Message shorter than SMB1 header"));
    }

    let mut r = Cursor::new(frame);
    let header: SmbHeader = Decodable::decode(&mut r)?;
    let wct: u8 = Decodable::decode(&mut r)?;

    let words_start = HEADER_SIZE + 1;
    let words_end = words_start + usize::from(wct) * 2;
    if words_end + 2 > frame.len() {
        return res!(io_err!(UnexpectedEof, "Word block exceeds message"));
    }
    r.set_position(words_end as u64);
    let bcc: u16 = Decodable::decode(&mut r)?;
    let bytes_start = words_end + 2;
    let bytes_end = bytes_start + usize::from(bcc);
    if bytes_end > frame.len() {
        return res!(io_err!(UnexpectedEof, "Byte block exceeds message"));
    }

    Ok(SmbMessage {
        header,
        words: WireBuffer::from(&frame[words_start..words_end]),
        bytes: WireBuffer::from(&frame[bytes_start..bytes_end]),
        raw: WireBuffer::from(frame),
    })
}
