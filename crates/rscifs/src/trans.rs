//! Transaction envelopes.
//!
//! An [`Envelope`] is one logical request: a setup word list, a parameter
//! block and a data block, plus the bounds the caller accepts back for each.
//! It is encoded into a primary frame and, when the blocks do not fit into
//! one frame, a run of secondary frames sent after the server's interim
//! reply. Replies arrive as one or more fragments that are stitched back
//! together by a [`Reassembly`] before the caller sees them.
//!
//! Plain (non-transaction) commands reuse the same envelope: the word block is
//! the parameter block and the byte block is the data block.

use crate::{
    buffer::{Charset, WireBuffer},
    error::Error,
    proto::*,
    res,
    serialize::SmbMessage,
    status::NtStatus,
    utils::{Result, align4},
};

/// Wire form of an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransStyle {
    /// `SMBtrans`, addressed to a named pipe or mailslot
    Trans { name: String },
    /// `SMBtrans2`, the single setup word is the sub-command
    Trans2,
    /// `SMBnttrans`
    NtTrans { function: NtTransFunction },
    /// A non-transaction command
    Plain(SmbCommand),
}

impl TransStyle {
    /// Command of the primary request.
    pub fn command(&self) -> SmbCommand {
        match *self {
            TransStyle::Trans { .. } => SmbCommand::Trans,
            TransStyle::Trans2 => SmbCommand::Trans2,
            TransStyle::NtTrans { .. } => SmbCommand::NtTrans,
            TransStyle::Plain(command) => command,
        }
    }

    /// Command of the secondary requests.
    pub fn secondary_command(&self) -> Option<SmbCommand> {
        match *self {
            TransStyle::Trans { .. } => Some(SmbCommand::TransSecondary),
            TransStyle::Trans2 => Some(SmbCommand::Trans2Secondary),
            TransStyle::NtTrans { .. } => Some(SmbCommand::NtTransSecondary),
            TransStyle::Plain(_) => None,
        }
    }

    pub fn is_transaction(&self) -> bool {
        !matches!(self, TransStyle::Plain(_))
    }

    fn primary_words(&self) -> usize {
        match *self {
            TransStyle::NtTrans { .. } => 19,
            _ => 14,
        }
    }

    fn secondary_words(&self) -> usize {
        match *self {
            TransStyle::Trans { .. } => 8,
            TransStyle::Trans2 => 9,
            _ => 18,
        }
    }

    /// Largest block total representable in the word block.
    fn max_total(&self) -> u32 {
        match *self {
            TransStyle::NtTrans { .. } => u32::MAX,
            _ => u32::from(u16::MAX),
        }
    }
}

/// Inclusive bounds on the size of one reply block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: u32,
}

impl Limits {
    pub fn new(min: u32, max: u32) -> Limits {
        Limits { min, max }
    }

    fn check(&self, len: usize) -> Result<()> {
        match u32::try_from(len) {
            Ok(len) if len < self.min => res!(Error::DataError),
            Ok(len) if len <= self.max => Ok(()),
            _ => res!(Error::InvalidNetworkResponse),
        }
    }
}

/// What the caller accepts back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReplyLimits {
    pub max_setup: u8,
    pub param: Limits,
    pub data: Limits,
}

impl Default for ReplyLimits {
    fn default() -> Self {
        ReplyLimits {
            max_setup: 0,
            param: Limits::new(0, CLI_BUFFER_SIZE),
            data: Limits::new(0, CLI_BUFFER_SIZE),
        }
    }
}

/// A request before it is put on the wire.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub style: TransStyle,
    pub flags: u16,
    /// File id carried by `SMBtrans2` secondaries
    pub fid: u16,
    pub setup: Vec<u16>,
    pub params: WireBuffer,
    pub data: WireBuffer,
    pub limits: ReplyLimits,
}

/// One encoded frame, header excepted.
#[derive(Clone, Debug)]
pub struct Frame {
    pub command: SmbCommand,
    pub words: WireBuffer,
    pub bytes: WireBuffer,
}

/// Placement of one parameter/data chunk in a frame.
#[derive(Copy, Clone, Debug)]
struct Chunk {
    param_offset: usize,
    param_count: usize,
    data_offset: usize,
    data_count: usize,
}

impl Envelope {
    fn new(style: TransStyle) -> Envelope {
        Envelope {
            style,
            flags: 0,
            fid: 0xffff,
            setup: Vec::new(),
            params: WireBuffer::new(),
            data: WireBuffer::new(),
            limits: ReplyLimits::default(),
        }
    }

    pub fn trans(name: &str) -> Envelope {
        Envelope::new(TransStyle::Trans {
            name: name.to_owned(),
        })
    }

    pub fn trans2(sub: Trans2Sub) -> Envelope {
        Envelope::new(TransStyle::Trans2).setup(&[sub as u16])
    }

    pub fn nt_trans(function: NtTransFunction) -> Envelope {
        Envelope::new(TransStyle::NtTrans { function })
    }

    /// A plain command; `words` must be built from whole 16-bit words.
    pub fn plain(command: SmbCommand, words: WireBuffer, bytes: WireBuffer) -> Envelope {
        let mut envelope = Envelope::new(TransStyle::Plain(command));
        envelope.params = words;
        envelope.data = bytes;
        envelope.limits.param = Limits::new(0, u32::from(u8::MAX) * 2);
        envelope
    }

    pub fn setup(mut self, words: &[u16]) -> Self {
        self.setup = words.to_vec();
        self
    }

    pub fn params(mut self, params: WireBuffer) -> Self {
        self.params = params;
        self
    }

    pub fn data(mut self, data: WireBuffer) -> Self {
        self.data = data;
        self
    }

    pub fn max_setup(mut self, max_setup: u8) -> Self {
        self.limits.max_setup = max_setup;
        self
    }

    pub fn param_limits(mut self, min: u32, max: u32) -> Self {
        self.limits.param = Limits::new(min, max);
        self
    }

    pub fn data_limits(mut self, min: u32, max: u32) -> Self {
        self.limits.data = Limits::new(min, max);
        self
    }

    pub fn fid(mut self, fid: u16) -> Self {
        self.fid = fid;
        self
    }

    pub fn command(&self) -> SmbCommand {
        self.style.command()
    }

    /// Reject envelopes that cannot be expressed on the wire.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.param.min > limits.param.max || limits.data.min > limits.data.max {
            return res!(Error::InvalidParameter);
        }

        match self.style {
            TransStyle::Plain(_) => {
                if self.params.len() % 2 != 0
                    || self.params.len() > usize::from(u8::MAX) * 2
                    || self.data.len() > usize::from(u16::MAX)
                    || !self.setup.is_empty()
                {
                    return res!(Error::InvalidParameter);
                }
            }
            _ => {
                let max_total = self.style.max_total() as usize;
                if self.params.len() > max_total
                    || self.data.len() > max_total
                    || self.setup.len() + self.style.primary_words() > usize::from(u8::MAX)
                {
                    return res!(Error::InvalidParameter);
                }
            }
        }
        Ok(())
    }

    /// Encode the envelope into its primary frame followed by any
    /// secondaries, none of them larger than `max_xmit`.
    pub fn encode(&self, charset: Charset, max_xmit: u32) -> Result<Vec<Frame>> {
        self.validate()?;
        let max_xmit = max_xmit as usize;

        if let TransStyle::Plain(command) = self.style {
            if HEADER_SIZE + 1 + self.params.len() + 2 + self.data.len() > max_xmit {
                return res!(Error::InvalidParameter);
            }
            return Ok(vec![Frame {
                command,
                words: self.params.clone(),
                bytes: self.data.clone(),
            }]);
        }

        let mut frames = vec![];
        let (primary, mut param_sent, mut data_sent) = self.encode_primary(charset, max_xmit)?;
        frames.push(primary);

        while param_sent < self.params.len() || data_sent < self.data.len() {
            let (frame, chunk) = self.encode_secondary(param_sent, data_sent, max_xmit)?;
            frames.push(frame);
            param_sent += chunk.param_count;
            data_sent += chunk.data_count;
        }
        Ok(frames)
    }

    /// Work out how much of the remaining blocks fits behind a word block of
    /// `words` words and `prefix` leading bytes of byte block.
    fn place(
        &self,
        words: usize,
        prefix: usize,
        param_sent: usize,
        data_sent: usize,
        max_xmit: usize,
    ) -> Result<Chunk> {
        let param_left = self.params.len() - param_sent;
        let data_left = self.data.len() - data_sent;

        // Empty chunks get no alignment padding, so padding never pushes a
        // frame past max_xmit
        let base = HEADER_SIZE + 1 + words * 2 + 2 + prefix;
        let param_count = param_left.min(max_xmit.saturating_sub(align4(base)));
        let param_offset = if param_count == 0 { base } else { align4(base) };
        let param_end = param_offset + param_count;
        let data_count = data_left.min(max_xmit.saturating_sub(align4(param_end)));
        let data_offset = if data_count == 0 { param_end } else { align4(param_end) };

        if param_count == 0 && data_count == 0 && param_left + data_left > 0 {
            // Nothing fits: the frame overhead alone exceeds max_xmit
            return res!(Error::InvalidParameter);
        }

        Ok(Chunk {
            param_offset,
            param_count,
            data_offset,
            data_count,
        })
    }

    /// Byte block: `prefix`, padding, parameter chunk, padding, data chunk.
    fn byte_block(
        &self,
        words: usize,
        prefix: WireBuffer,
        chunk: &Chunk,
        param_sent: usize,
        data_sent: usize,
    ) -> Result<WireBuffer> {
        let bytes_start = HEADER_SIZE + 1 + words * 2 + 2;
        let mut bytes = prefix;
        bytes.push_fill(0, chunk.param_offset - bytes_start - bytes.len());
        bytes.push_bytes(self.params.read_bytes(param_sent, chunk.param_count)?);
        bytes.push_fill(0, chunk.data_offset - bytes_start - bytes.len());
        bytes.push_bytes(self.data.read_bytes(data_sent, chunk.data_count)?);
        Ok(bytes)
    }

    fn encode_primary(&self, charset: Charset, max_xmit: usize) -> Result<(Frame, usize, usize)> {
        let mut prefix = WireBuffer::new();
        match self.style {
            TransStyle::Trans { ref name } => {
                prefix.push_string(charset, name, true, true)?;
            }
            TransStyle::Trans2 => prefix.push_u8(0),
            _ => {}
        }

        let nwords = self.style.primary_words() + self.setup.len();
        let chunk = self.place(nwords, prefix.len(), 0, 0, max_xmit)?;
        let limits = &self.limits;

        let mut words = WireBuffer::with_capacity(nwords * 2);
        match self.style {
            TransStyle::NtTrans { function } => {
                words.push_u8(limits.max_setup);
                words.push_u16_le(0);
                words.push_u32_le(self.params.len() as u32);
                words.push_u32_le(self.data.len() as u32);
                words.push_u32_le(limits.param.max);
                words.push_u32_le(limits.data.max);
                words.push_u32_le(chunk.param_count as u32);
                words.push_u32_le(chunk.param_offset as u32);
                words.push_u32_le(chunk.data_count as u32);
                words.push_u32_le(chunk.data_offset as u32);
                words.push_u8(self.setup.len() as u8);
                words.push_u16_le(function as u16);
            }
            _ => {
                words.push_u16_le(self.params.len() as u16);
                words.push_u16_le(self.data.len() as u16);
                words.push_u16_le(limits.param.max.min(0xffff) as u16);
                words.push_u16_le(limits.data.max.min(0xffff) as u16);
                words.push_u8(limits.max_setup);
                words.push_u8(0);
                words.push_u16_le(self.flags);
                words.push_u32_le(0);
                words.push_u16_le(0);
                words.push_u16_le(chunk.param_count as u16);
                words.push_u16_le(chunk.param_offset as u16);
                words.push_u16_le(chunk.data_count as u16);
                words.push_u16_le(chunk.data_offset as u16);
                words.push_u8(self.setup.len() as u8);
                words.push_u8(0);
            }
        }
        for word in &self.setup {
            words.push_u16_le(*word);
        }

        let bytes = self.byte_block(nwords, prefix, &chunk, 0, 0)?;
        let frame = Frame {
            command: self.style.command(),
            words,
            bytes,
        };
        Ok((frame, chunk.param_count, chunk.data_count))
    }

    fn encode_secondary(
        &self,
        param_sent: usize,
        data_sent: usize,
        max_xmit: usize,
    ) -> Result<(Frame, Chunk)> {
        let command = self
            .style
            .secondary_command()
            .ok_or(Error::InvalidParameter)?;
        let nwords = self.style.secondary_words();
        let chunk = self.place(nwords, 0, param_sent, data_sent, max_xmit)?;

        let mut words = WireBuffer::with_capacity(nwords * 2);
        match self.style {
            TransStyle::NtTrans { .. } => {
                words.push_fill(0, 3);
                for v in [
                    self.params.len(),
                    self.data.len(),
                    chunk.param_count,
                    chunk.param_offset,
                    param_sent,
                    chunk.data_count,
                    chunk.data_offset,
                    data_sent,
                ] {
                    words.push_u32_le(v as u32);
                }
                words.push_u8(0);
            }
            _ => {
                for v in [
                    self.params.len(),
                    self.data.len(),
                    chunk.param_count,
                    chunk.param_offset,
                    param_sent,
                    chunk.data_count,
                    chunk.data_offset,
                    data_sent,
                ] {
                    words.push_u16_le(v as u16);
                }
                if self.style == TransStyle::Trans2 {
                    words.push_u16_le(self.fid);
                }
            }
        }

        let bytes = self.byte_block(nwords, WireBuffer::new(), &chunk, param_sent, data_sent)?;
        Ok((
            Frame {
                command,
                words,
                bytes,
            },
            chunk,
        ))
    }
}

/// One reply frame of a transaction, borrowed from the message it came in.
#[derive(Clone, Debug)]
pub struct Fragment<'a> {
    pub total_param: u32,
    pub total_data: u32,
    pub param_disp: u32,
    pub data_disp: u32,
    pub setup: Vec<u16>,
    pub params: &'a [u8],
    pub data: &'a [u8],
}

impl<'a> Fragment<'a> {
    /// Parse the transaction reply word block of `msg`.
    pub fn parse(style: &TransStyle, msg: &'a SmbMessage) -> Result<Fragment<'a>> {
        let w = &msg.words;
        let bad = |_| Error::InvalidNetworkResponse;

        let (total_param, total_data, param, data, setup_count, setup_start) = match style {
            TransStyle::NtTrans { .. } => {
                if msg.wct() < 18 {
                    return res!(Error::InvalidNetworkResponse);
                }
                let field = |i: usize| w.read_u32_le(3 + 4 * i).map_err(bad);
                (
                    field(0)?,
                    field(1)?,
                    (field(2)?, field(3)?, field(4)?),
                    (field(5)?, field(6)?, field(7)?),
                    w.read_u8(35).map_err(bad)?,
                    36,
                )
            }
            TransStyle::Plain(_) => return res!(Error::InvalidParameter),
            _ => {
                if msg.wct() < 10 {
                    return res!(Error::InvalidNetworkResponse);
                }
                let field = |off: usize| w.read_u16_le(off).map(u32::from).map_err(bad);
                (
                    field(0)?,
                    field(2)?,
                    (field(6)?, field(8)?, field(10)?),
                    (field(12)?, field(14)?, field(16)?),
                    w.read_u8(18).map_err(bad)?,
                    20,
                )
            }
        };

        let setup = (0..usize::from(setup_count))
            .map(|i| w.read_u16_le(setup_start + 2 * i).map_err(bad))
            .collect::<Result<Vec<_>>>()?;

        let (param_count, param_offset, param_disp) = param;
        let (data_count, data_offset, data_disp) = data;
        let params = msg
            .raw
            .read_bytes(param_offset as usize, param_count as usize)
            .map_err(bad)?;
        let data = msg
            .raw
            .read_bytes(data_offset as usize, data_count as usize)
            .map_err(bad)?;

        Ok(Fragment {
            total_param,
            total_data,
            param_disp,
            data_disp,
            setup,
            params,
            data,
        })
    }
}

/// Accumulation state of one transaction reply.
#[derive(Debug)]
pub struct Reassembly {
    limits: ReplyLimits,
    totals: Option<(u32, u32)>,
    status: NtStatus,
    flags2: HeaderFlags2,
    setup: Vec<u16>,
    params: WireBuffer,
    data: WireBuffer,
}

impl Reassembly {
    pub fn new(limits: ReplyLimits) -> Reassembly {
        Reassembly {
            limits,
            totals: None,
            status: NtStatus::SUCCESS,
            flags2: HeaderFlags2::empty(),
            setup: Vec::new(),
            params: WireBuffer::new(),
            data: WireBuffer::new(),
        }
    }

    /// Add one fragment. Returns `true` once both blocks are complete.
    pub fn push(&mut self, msg: &SmbMessage, frag: Fragment) -> Result<bool> {
        match self.totals {
            None => {
                if frag.total_param > self.limits.param.max || frag.total_data > self.limits.data.max {
                    return res!(Error::InvalidNetworkResponse);
                }
                self.totals = Some((frag.total_param, frag.total_data));
                self.setup = frag.setup;
            }
            Some(totals) if totals != (frag.total_param, frag.total_data) => {
                return res!(Error::InvalidNetworkResponse);
            }
            Some(_) => {}
        }
        let (total_param, total_data) = (frag.total_param as usize, frag.total_data as usize);

        if frag.param_disp as usize != self.params.len()
            || frag.data_disp as usize != self.data.len()
            || self.params.len() + frag.params.len() > total_param
            || self.data.len() + frag.data.len() > total_data
        {
            return res!(Error::InvalidNetworkResponse);
        }

        self.params.push_bytes(frag.params);
        self.data.push_bytes(frag.data);
        self.status = msg.header.status;
        self.flags2 = msg.header.flags2;

        Ok(self.params.len() == total_param && self.data.len() == total_data)
    }

    pub fn finish(self) -> EnvelopeReply {
        EnvelopeReply {
            status: self.status,
            flags2: self.flags2,
            setup: self.setup,
            params: self.params,
            data: self.data,
        }
    }
}

/// A complete reply.
#[derive(Clone, Debug)]
pub struct EnvelopeReply {
    /// Success or a "more data" warning; errors never get this far.
    pub status: NtStatus,
    pub flags2: HeaderFlags2,
    pub setup: Vec<u16>,
    pub params: WireBuffer,
    pub data: WireBuffer,
}

impl EnvelopeReply {
    /// Reply to a plain command.
    pub fn from_message(msg: SmbMessage) -> EnvelopeReply {
        EnvelopeReply {
            status: msg.header.status,
            flags2: msg.header.flags2,
            setup: Vec::new(),
            params: msg.words,
            data: msg.bytes,
        }
    }

    /// Charset the server used for strings in this reply.
    pub fn charset(&self) -> Charset {
        if self.flags2.contains(HeaderFlags2::UNICODE) {
            Charset::Wide
        } else {
            Charset::Narrow
        }
    }

    /// Check the block sizes against what the caller declared.
    pub fn check(&self, limits: &ReplyLimits) -> Result<()> {
        limits.param.check(self.params.len())?;
        limits.data.check(self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{SmbHeader, read_msg, write_msg};

    fn payload(n: usize) -> WireBuffer {
        WireBuffer::from((0..n).map(|i| i as u8).collect::<Vec<_>>())
    }

    fn frame_len(frame: &Frame) -> usize {
        HEADER_SIZE + 1 + frame.words.len() + 2 + frame.bytes.len()
    }

    fn message(words: &WireBuffer, bytes: &[u8], status: NtStatus) -> SmbMessage {
        let header = SmbHeader {
            command: SmbCommand::Trans2 as u8,
            status,
            flags: HeaderFlags::REPLY,
            flags2: HeaderFlags2::UNICODE,
            ..Default::default()
        };
        let mut buf = Vec::new();
        write_msg(&mut buf, &header, words.as_slice(), bytes).unwrap();
        read_msg(&buf).unwrap()
    }

    /// A TRANS2 reply fragment with the blocks packed back to back.
    fn trans2_reply(
        totals: (u16, u16),
        params: &[u8],
        param_disp: u16,
        data: &[u8],
        data_disp: u16,
    ) -> SmbMessage {
        let bytes_start = (HEADER_SIZE + 1 + 20 + 2) as u16;
        let mut words = WireBuffer::new();
        words.push_u16_le(totals.0);
        words.push_u16_le(totals.1);
        words.push_u16_le(0);
        words.push_u16_le(params.len() as u16);
        words.push_u16_le(bytes_start);
        words.push_u16_le(param_disp);
        words.push_u16_le(data.len() as u16);
        words.push_u16_le(bytes_start + params.len() as u16);
        words.push_u16_le(data_disp);
        words.push_u8(0);
        words.push_u8(0);
        message(&words, &[params, data].concat(), NtStatus::SUCCESS)
    }

    #[test]
    fn trans2_primary_layout() {
        let envelope = Envelope::trans2(Trans2Sub::QueryPathInfo)
            .params(payload(10))
            .data(payload(3))
            .param_limits(2, 2)
            .data_limits(0, 0xffff);
        let frames = envelope.encode(Charset::Wide, DEFAULT_MAX_XMIT).unwrap();
        assert_eq!(frames.len(), 1);

        let f = &frames[0];
        assert_eq!(f.command, SmbCommand::Trans2);
        assert_eq!(f.words.len(), 30);
        assert_eq!(f.words.read_u16_le(0).unwrap(), 10);
        assert_eq!(f.words.read_u16_le(2).unwrap(), 3);
        assert_eq!(f.words.read_u16_le(4).unwrap(), 2);
        assert_eq!(f.words.read_u16_le(6).unwrap(), 0xffff);
        assert_eq!(f.words.read_u8(26).unwrap(), 1);
        assert_eq!(f.words.read_u16_le(28).unwrap(), Trans2Sub::QueryPathInfo as u16);

        let param_offset = f.words.read_u16_le(20).unwrap() as usize;
        let data_offset = f.words.read_u16_le(24).unwrap() as usize;
        assert_eq!(param_offset % 4, 0);
        assert_eq!(data_offset % 4, 0);

        let bytes_start = HEADER_SIZE + 1 + 30 + 2;
        assert_eq!(f.bytes.read_u8(0).unwrap(), 0);
        assert_eq!(
            f.bytes.read_bytes(param_offset - bytes_start, 10).unwrap(),
            payload(10).as_slice()
        );
        assert_eq!(
            f.bytes.read_bytes(data_offset - bytes_start, 3).unwrap(),
            payload(3).as_slice()
        );
    }

    #[test]
    fn nt_trans_primary_layout() {
        let envelope = Envelope::nt_trans(NtTransFunction::NotifyChange)
            .setup(&[0x17, 0, 0x4000, 1])
            .param_limits(0, 1000)
            .data_limits(0, 0);
        let frames = envelope.encode(Charset::Wide, DEFAULT_MAX_XMIT).unwrap();
        let f = &frames[0];
        assert_eq!(f.command, SmbCommand::NtTrans);
        assert_eq!(f.words.len(), 2 * (19 + 4));
        assert_eq!(f.words.read_u32_le(11).unwrap(), 1000);
        assert_eq!(f.words.read_u8(35).unwrap(), 4);
        assert_eq!(f.words.read_u16_le(36).unwrap(), NtTransFunction::NotifyChange as u16);
        assert_eq!(f.words.read_u16_le(38).unwrap(), 0x17);
    }

    #[test]
    fn trans_carries_pipe_name() {
        let frames = Envelope::trans("\\PIPE\\LANMAN")
            .params(payload(4))
            .encode(Charset::Narrow, DEFAULT_MAX_XMIT)
            .unwrap();
        assert_eq!(frames[0].command, SmbCommand::Trans);
        assert_eq!(frames[0].bytes.read_bytes(0, 13).unwrap(), b"\\PIPE\\LANMAN\0");
    }

    #[test]
    fn large_requests_are_split() {
        let envelope = Envelope::trans2(Trans2Sub::SetPathInfo)
            .params(payload(1500))
            .data(payload(2500))
            .fid(0x42);
        let frames = envelope.encode(Charset::Wide, MIN_MAX_XMIT).unwrap();
        assert!(frames.len() > 1);
        assert!(frames.iter().all(|f| frame_len(f) <= MIN_MAX_XMIT as usize));

        let mut params = 0;
        let mut data = 0;
        for f in &frames[1..] {
            assert_eq!(f.command, SmbCommand::Trans2Secondary);
            assert_eq!(f.words.len(), 18);
            assert_eq!(f.words.read_u16_le(0).unwrap(), 1500);
            assert_eq!(f.words.read_u16_le(2).unwrap(), 2500);
            assert_eq!(f.words.read_u16_le(16).unwrap(), 0x42);
            params += f.words.read_u16_le(4).unwrap() as usize;
            data += f.words.read_u16_le(10).unwrap() as usize;
        }
        params += frames[0].words.read_u16_le(18).unwrap() as usize;
        data += frames[0].words.read_u16_le(22).unwrap() as usize;
        assert_eq!((params, data), (1500, 2500));
    }

    #[test]
    fn unaligned_max_xmit_is_never_exceeded() {
        let envelope = Envelope::trans2(Trans2Sub::SetPathInfo)
            .params(payload(2000))
            .data(payload(10));
        for max_xmit in [1025, 1026, 1027, 1029] {
            let frames = envelope.encode(Charset::Wide, max_xmit).unwrap();
            assert!(frames.iter().all(|f| frame_len(f) <= max_xmit as usize));

            let primary = &frames[0];
            let param_count = primary.words.read_u16_le(18).unwrap() as usize;
            let data_count = primary.words.read_u16_le(22).unwrap() as usize;
            assert!(param_count > 0);
            if data_count == 0 {
                let param_offset = primary.words.read_u16_le(20).unwrap();
                let data_offset = primary.words.read_u16_le(24).unwrap();
                assert_eq!(usize::from(data_offset), usize::from(param_offset) + param_count);
            }

            let data: usize = frames[1..]
                .iter()
                .map(|f| f.words.read_u16_le(10).unwrap() as usize)
                .sum();
            assert_eq!(data + data_count, 10);
        }
    }

    #[test]
    fn plain_commands_keep_their_blocks() {
        let mut words = WireBuffer::new();
        words.push_u16_le(0x16);
        let envelope = Envelope::plain(SmbCommand::Unlink, words, payload(5));
        let frames = envelope.encode(Charset::Narrow, DEFAULT_MAX_XMIT).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, SmbCommand::Unlink);
        assert_eq!(frames[0].words.len(), 2);
        assert_eq!(frames[0].bytes.len(), 5);

        let mut odd = WireBuffer::new();
        odd.push_u8(1);
        let envelope = Envelope::plain(SmbCommand::Unlink, odd, WireBuffer::new());
        assert_eq!(envelope.validate(), Err(Error::InvalidParameter));
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let envelope = Envelope::trans2(Trans2Sub::QueryFsInfo).param_limits(4, 2);
        assert_eq!(envelope.validate(), Err(Error::InvalidParameter));
    }

    #[test]
    fn fragments_reassemble_in_order() {
        let mut r = Reassembly::new(ReplyLimits::default());
        let first = trans2_reply((2, 6), &[1, 2], 0, &[10, 11, 12], 0);
        let frag = Fragment::parse(&TransStyle::Trans2, &first).unwrap();
        assert!(!r.push(&first, frag).unwrap());

        let second = trans2_reply((2, 6), &[], 2, &[13, 14, 15], 3);
        let frag = Fragment::parse(&TransStyle::Trans2, &second).unwrap();
        assert!(r.push(&second, frag).unwrap());

        let reply = r.finish();
        assert_eq!(reply.params.as_slice(), &[1, 2]);
        assert_eq!(reply.data.as_slice(), &[10, 11, 12, 13, 14, 15]);
        assert_eq!(reply.charset(), Charset::Wide);
    }

    #[test]
    fn changed_totals_are_a_protocol_violation() {
        for totals in [(2, 5), (2, 7)] {
            let mut r = Reassembly::new(ReplyLimits::default());
            let first = trans2_reply((2, 6), &[1, 2], 0, &[10, 11, 12], 0);
            r.push(&first, Fragment::parse(&TransStyle::Trans2, &first).unwrap())
                .unwrap();
            let second = trans2_reply(totals, &[], 2, &[13], 3);
            let frag = Fragment::parse(&TransStyle::Trans2, &second).unwrap();
            assert_eq!(r.push(&second, frag), Err(Error::InvalidNetworkResponse));
        }
    }

    #[test]
    fn bad_displacement_or_overrun_is_rejected() {
        let mut r = Reassembly::new(ReplyLimits::default());
        let msg = trans2_reply((2, 6), &[1, 2], 0, &[10], 1);
        let frag = Fragment::parse(&TransStyle::Trans2, &msg).unwrap();
        assert_eq!(r.push(&msg, frag), Err(Error::InvalidNetworkResponse));

        let mut r = Reassembly::new(ReplyLimits::default());
        let msg = trans2_reply((1, 0), &[1, 2], 0, &[], 0);
        let frag = Fragment::parse(&TransStyle::Trans2, &msg).unwrap();
        assert_eq!(r.push(&msg, frag), Err(Error::InvalidNetworkResponse));
    }

    #[test]
    fn totals_above_the_declared_maximum_are_rejected() {
        let limits = ReplyLimits {
            data: Limits::new(0, 4),
            ..Default::default()
        };
        let mut r = Reassembly::new(limits);
        let msg = trans2_reply((0, 6), &[], 0, &[1, 2, 3, 4, 5, 6], 0);
        let frag = Fragment::parse(&TransStyle::Trans2, &msg).unwrap();
        assert_eq!(r.push(&msg, frag), Err(Error::InvalidNetworkResponse));
    }

    #[test]
    fn out_of_frame_offsets_are_rejected() {
        let mut words = WireBuffer::new();
        for v in [0u16, 4, 0, 0, 0, 0, 4, 0x7000, 0] {
            words.push_u16_le(v);
        }
        words.push_u16_le(0);
        let msg = message(&words, &[1, 2, 3, 4], NtStatus::SUCCESS);
        assert_eq!(
            Fragment::parse(&TransStyle::Trans2, &msg).err(),
            Some(Error::InvalidNetworkResponse)
        );

        let msg = message(&WireBuffer::new(), &[], NtStatus::SUCCESS);
        assert_eq!(
            Fragment::parse(&TransStyle::Trans2, &msg).err(),
            Some(Error::InvalidNetworkResponse)
        );
    }

    #[test]
    fn reply_sizes_are_checked_against_limits() {
        let reply = EnvelopeReply {
            status: NtStatus::SUCCESS,
            flags2: HeaderFlags2::empty(),
            setup: vec![],
            params: payload(1),
            data: payload(100),
        };
        let limits = ReplyLimits {
            max_setup: 0,
            param: Limits::new(2, 2),
            data: Limits::new(0, 0xffff),
        };
        assert_eq!(reply.check(&limits), Err(Error::DataError));

        let limits = ReplyLimits {
            max_setup: 0,
            param: Limits::new(0, 2),
            data: Limits::new(0, 50),
        };
        assert_eq!(reply.check(&limits), Err(Error::InvalidNetworkResponse));

        let limits = ReplyLimits {
            max_setup: 0,
            param: Limits::new(0, 2),
            data: Limits::new(100, 100),
        };
        assert_eq!(reply.check(&limits), Ok(()));
    }
}
