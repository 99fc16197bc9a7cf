//! Scripted in-memory server for session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use rscifs::{
    HeaderFlags, HeaderFlags2, NtStatus, Session, SessionConfig, SmbCommand, Trans2Sub,
    WireBuffer,
    serialize::{SmbHeader, SmbMessage, read_msg, write_msg},
    transport::Transport,
};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&SmbMessage) -> Vec<Bytes> + Send + Sync>;

/// Answers every request the moment it is sent. `recv` reports end of stream
/// once the queued replies run out.
pub struct MockServer {
    handler: Handler,
    queue: Mutex<VecDeque<Bytes>>,
    sent: Mutex<Vec<SmbMessage>>,
}

impl MockServer {
    pub fn sent(&self) -> Vec<SmbMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<u8> {
        self.sent().iter().map(|m| m.header.command).collect()
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn send(&self, msg: Bytes) -> io::Result<()> {
        let parsed = read_msg(&msg)?;
        let replies = (self.handler)(&parsed);
        self.queue.lock().unwrap().extend(replies);
        self.sent.lock().unwrap().push(parsed);
        Ok(())
    }

    async fn recv(&self) -> io::Result<Option<Bytes>> {
        Ok(self.queue.lock().unwrap().pop_front())
    }
}

/// Accepts every request and never answers.
pub struct Silent;

#[async_trait]
impl Transport for Silent {
    async fn send(&self, _msg: Bytes) -> io::Result<()> {
        Ok(())
    }

    async fn recv(&self) -> io::Result<Option<Bytes>> {
        std::future::pending().await
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn session<F>(config: SessionConfig, handler: F) -> (Session, Arc<MockServer>)
where
    F: Fn(&SmbMessage) -> Vec<Bytes> + Send + Sync + 'static,
{
    init_logging();
    let server = Arc::new(MockServer {
        handler: Box::new(handler),
        queue: Mutex::new(VecDeque::new()),
        sent: Mutex::new(Vec::new()),
    });
    let session = Session::with_transport(server.clone(), config.with_tid(1).with_uid(100));
    (session, server)
}

pub fn silent_session() -> Session {
    init_logging();
    Session::new(Silent, SessionConfig::default().with_tid(1).with_uid(100))
}

pub fn command(msg: &SmbMessage) -> Option<SmbCommand> {
    num_traits::FromPrimitive::from_u8(msg.header.command)
}

/// TRANS2 sub-command of a primary request.
pub fn trans2_sub(msg: &SmbMessage) -> Option<Trans2Sub> {
    num_traits::FromPrimitive::from_u16(msg.words.read_u16_le(28).ok()?)
}

/// Parameter and data chunks of a TRANS2 primary or secondary request.
pub fn trans2_chunks(msg: &SmbMessage) -> (Vec<u8>, Vec<u8>) {
    let w = &msg.words;
    let at = |off: usize| w.read_u16_le(off).unwrap() as usize;
    let (pc, po, dc, dof) = match command(msg) {
        Some(SmbCommand::Trans2Secondary) => (at(4), at(6), at(10), at(12)),
        _ => (at(18), at(20), at(22), at(24)),
    };
    (
        msg.raw.read_bytes(po, pc).unwrap().to_vec(),
        msg.raw.read_bytes(dof, dc).unwrap().to_vec(),
    )
}

pub fn reply_to(req: &SmbMessage, status: NtStatus, words: &[u8], bytes: &[u8]) -> Bytes {
    let header = SmbHeader {
        command: req.header.command,
        status,
        flags: HeaderFlags::REPLY,
        flags2: HeaderFlags2::NT_STATUS | HeaderFlags2::UNICODE,
        tid: req.header.tid,
        pid: req.header.pid,
        uid: req.header.uid,
        mid: req.header.mid,
        ..Default::default()
    };
    let mut buf = Vec::new();
    write_msg(&mut buf, &header, words, bytes).unwrap();
    Bytes::from(buf)
}

pub fn error_reply(req: &SmbMessage, status: NtStatus) -> Bytes {
    reply_to(req, status, &[], &[])
}

/// Interim response to a transaction primary: go ahead with the secondaries.
pub fn interim_reply(req: &SmbMessage) -> Bytes {
    reply_to(req, NtStatus::SUCCESS, &[], &[])
}

/// One fragment of a TRANS/TRANS2 reply.
pub fn trans2_fragment(
    req: &SmbMessage,
    totals: (u16, u16),
    params: &[u8],
    param_disp: u16,
    data: &[u8],
    data_disp: u16,
) -> Bytes {
    let bytes_start = 32 + 1 + 20 + 2;
    let param_offset = (bytes_start + 3) & !3;
    let data_offset = (param_offset + params.len() + 3) & !3;

    let mut words = WireBuffer::new();
    words.push_u16_le(totals.0);
    words.push_u16_le(totals.1);
    words.push_u16_le(0);
    words.push_u16_le(params.len() as u16);
    words.push_u16_le(param_offset as u16);
    words.push_u16_le(param_disp);
    words.push_u16_le(data.len() as u16);
    words.push_u16_le(data_offset as u16);
    words.push_u16_le(data_disp);
    words.push_u8(0);
    words.push_u8(0);

    let mut bytes = WireBuffer::new();
    bytes.push_fill(0, param_offset - bytes_start);
    bytes.push_bytes(params);
    bytes.push_fill(0, data_offset - bytes_start - bytes.len());
    bytes.push_bytes(data);
    reply_to(req, NtStatus::SUCCESS, words.as_slice(), bytes.as_slice())
}

/// A complete single-fragment TRANS2 reply.
pub fn trans2_reply(req: &SmbMessage, params: &[u8], data: &[u8]) -> Bytes {
    let totals = (params.len() as u16, data.len() as u16);
    trans2_fragment(req, totals, params, 0, data, 0)
}

/// A complete single-fragment NT_TRANSACT reply.
pub fn nt_trans_reply(req: &SmbMessage, params: &[u8], data: &[u8]) -> Bytes {
    let bytes_start = 32 + 1 + 36 + 2;
    let param_offset = (bytes_start + 3) & !3;
    let data_offset = (param_offset + params.len() + 3) & !3;

    let mut words = WireBuffer::new();
    words.push_fill(0, 3);
    for v in [
        params.len(),
        data.len(),
        params.len(),
        param_offset,
        0,
        data.len(),
        data_offset,
        0,
    ] {
        words.push_u32_le(v as u32);
    }
    words.push_u8(0);

    let mut bytes = WireBuffer::new();
    bytes.push_fill(0, param_offset - bytes_start);
    bytes.push_bytes(params);
    bytes.push_fill(0, data_offset - bytes_start - bytes.len());
    bytes.push_bytes(data);
    reply_to(req, NtStatus::SUCCESS, words.as_slice(), bytes.as_slice())
}

/// `SMBntcreateX` reply words for handle `fnum`.
pub fn nt_create_words(fnum: u16, is_directory: bool) -> Vec<u8> {
    let mut w = WireBuffer::new();
    w.push_u8(0xff);
    w.push_u8(0);
    w.push_u16_le(0);
    w.push_u8(0);
    w.push_u16_le(fnum);
    w.push_u32_le(1);
    w.push_fill(0, 32);
    w.push_u32_le(0x80);
    w.push_u64_le(0);
    w.push_u64_le(0);
    w.push_u16_le(0);
    w.push_u16_le(0);
    w.push_u8(u8::from(is_directory));
    w.as_slice().to_vec()
}
