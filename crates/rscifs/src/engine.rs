//! Asynchronous transaction engine.
//!
//! A [`Session`] owns one transport and any number of in-flight requests.
//! Submitting an [`Envelope`] puts its primary frame on the wire and returns
//! a [`PendingRequest`]; collecting it waits for the matching reply.
//!
//! There is no background task. Whichever collector first takes the reader
//! lock receives the next frame and routes it by multiplex id to the request
//! it belongs to, completing that request's channel; every other collector
//! just waits on its own channel. Replies may therefore arrive in any order
//! and interleave freely.
//!
//! Collectors only hold a weak reference to the session while they wait, so
//! [`Session::shutdown`] or dropping the last handle interrupts even a
//! collector blocked reading the transport.

use {
    crate::{
        buffer::{Charset, WireBuffer},
        config::SessionConfig,
        error::{Error, errno::*, map_io_error},
        proto::*,
        res,
        serialize::{self, SmbHeader, SmbMessage},
        trans::{Envelope, EnvelopeReply, Fragment, Frame, Reassembly, ReplyLimits, TransStyle},
        transport::Transport,
        utils::Result,
    },
    bytes::{BufMut, Bytes, BytesMut},
    log::{debug, error, warn},
    num_traits::FromPrimitive,
    std::{
        collections::{HashMap, VecDeque},
        io,
        sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, atomic::AtomicBool},
    },
    tokio::sync::{
        oneshot::{self, error::TryRecvError},
        watch,
    },
};

type Completion = oneshot::Sender<Result<EnvelopeReply>>;

/// Engine-side state of one request.
struct Slot {
    serial: u64,
    style: TransStyle,
    /// `None` for plain commands
    reassembly: Option<Reassembly>,
    /// Encoded secondaries not yet on the wire
    secondaries: VecDeque<Bytes>,
    /// The interim reply arrived, `secondaries` may be sent
    interim: bool,
    /// The caller dropped its handle and a cancel is queued; the slot goes
    /// away with whatever reply the server sends last
    abandoned: bool,
    tx: Completion,
}

#[derive(Default)]
struct State {
    next_mid: u16,
    next_serial: u64,
    pending: HashMap<u16, Slot>,
    /// Frames belonging to no live request (cancels), sent first
    outgoing: VecDeque<Bytes>,
    closed: bool,
}

impl State {
    fn alloc_mid(&mut self) -> Result<u16> {
        for _ in 0..=u16::MAX {
            let mid = self.next_mid;
            self.next_mid = self.next_mid.wrapping_add(1);
            if mid != RESERVED_MID && !self.pending.contains_key(&mid) {
                return Ok(mid);
            }
        }
        res!(Error::NoMemory)
    }

    fn drain(&mut self) -> Vec<Slot> {
        self.outgoing.clear();
        self.pending.drain().map(|(_, slot)| slot).collect()
    }

    /// Next frame waiting to go on the wire, taken one at a time so that
    /// an interrupted flush leaves the rest queued.
    fn next_outgoing(&mut self) -> Option<Bytes> {
        if let Some(frame) = self.outgoing.pop_front() {
            return Some(frame);
        }
        self.pending
            .values_mut()
            .filter(|slot| slot.interim)
            .find_map(|slot| slot.secondaries.pop_front())
    }
}

pub(crate) struct Inner {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    state: Mutex<State>,
    /// Held by the collector currently reading from the transport
    reader: Arc<tokio::sync::Mutex<()>>,
    /// Set by `shutdown`, closed when the session is dropped
    closing: watch::Sender<bool>,
    pub(crate) sync_active: AtomicBool,
}

/// What a routed reply does to its request.
enum Step {
    Wait,
    ReleaseSecondaries,
    Complete(Result<EnvelopeReply>),
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encode_frame(&self, frame: &Frame, mid: u16) -> Result<Bytes> {
        let header = SmbHeader {
            command: frame.command as u8,
            flags: HeaderFlags::CASELESS_PATHNAMES,
            flags2: self.config.flags2(),
            pid_high: (self.config.pid >> 16) as u16,
            tid: self.config.tid,
            pid: self.config.pid as u16,
            uid: self.config.uid,
            mid,
            ..Default::default()
        };

        let capacity = HEADER_SIZE + 3 + frame.words.len() + frame.bytes.len();
        let mut writer = BytesMut::with_capacity(capacity).writer();
        serialize::write_msg(
            &mut writer,
            &header,
            frame.words.as_slice(),
            frame.bytes.as_slice(),
        )
        .map_err(|_| Error::InvalidParameter)?;
        Ok(writer.into_inner().freeze())
    }

    /// Complete every outstanding request with `err`.
    fn fail_all(&self, err: Error) {
        let slots = self.lock_state().drain();
        if !slots.is_empty() {
            error!("Failing {} outstanding request(s): {}", slots.len(), err);
        }
        for slot in slots {
            let _ = slot.tx.send(Err(err));
        }
    }

    fn fail(&self, mid: u16, err: Error) {
        let slot = self.lock_state().pending.remove(&mid);
        if let Some(slot) = slot {
            let _ = slot.tx.send(Err(err));
        }
    }

    /// Send queued cancels and released secondaries.
    async fn flush(&self) -> Result<()> {
        loop {
            let next = self.lock_state().next_outgoing();
            let Some(frame) = next else {
                return Ok(());
            };
            if let Err(e) = self.transport.send(frame).await {
                error!("Transport error: {}", e);
                let err = map_io_error(&e);
                self.fail_all(err);
                return Err(err);
            }
        }
    }

    /// Route the outcome of one transport read.
    async fn dispatch(&self, received: io::Result<Option<Bytes>>) {
        let frame = match received {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                error!("Connection closed by server");
                self.fail_all(Error::Transport(ECONNRESET));
                return;
            }
            Err(e) => {
                error!("Transport error: {}", e);
                self.fail_all(map_io_error(&e));
                return;
            }
        };

        match serialize::read_msg(&frame) {
            Ok(msg) => self.route(msg).await,
            Err(e) => warn!("Dropping malformed frame ({} bytes): {}", frame.len(), e),
        }
    }

    async fn route(&self, msg: SmbMessage) {
        let mid = msg.header.mid;
        debug!(
            "\t← {:?} mid {} {} wct {}",
            SmbCommand::from_u8(msg.header.command),
            mid,
            msg.header.status,
            msg.wct()
        );

        let released = {
            let mut state = self.lock_state();
            let Some(slot) = state.pending.get_mut(&mid) else {
                warn!("Dropping reply for unknown mid {}", mid);
                return;
            };
            if !msg.header.is_reply() {
                warn!("Dropping non-reply message for mid {}", mid);
                return;
            }

            match Self::advance(slot, msg) {
                Step::Complete(result) => {
                    if let Some(slot) = state.pending.remove(&mid) {
                        if slot.abandoned {
                            debug!("Reaped abandoned mid {}", mid);
                        }
                        let _ = slot.tx.send(result);
                    }
                    false
                }
                Step::ReleaseSecondaries => true,
                Step::Wait => false,
            }
        };

        if released {
            debug!("\t→ secondaries for mid {}", mid);
            let _ = self.flush().await;
        }
    }

    /// Apply one reply to a request's state.
    fn advance(slot: &mut Slot, msg: SmbMessage) -> Step {
        let status = msg.header.status;
        if status.is_error() {
            return Step::Complete(Err(Error::from(status)));
        }

        if !slot.interim && !slot.secondaries.is_empty() {
            // Interim reply: go ahead with the rest of the request
            return if msg.wct() == 0 {
                slot.interim = true;
                Step::ReleaseSecondaries
            } else {
                Step::Complete(Err(Error::InvalidNetworkResponse))
            };
        }

        let Some(reassembly) = slot.reassembly.as_mut() else {
            return Step::Complete(Ok(EnvelopeReply::from_message(msg)));
        };
        match Fragment::parse(&slot.style, &msg).and_then(|frag| reassembly.push(&msg, frag)) {
            Ok(false) => Step::Wait,
            Ok(true) => match slot.reassembly.take() {
                Some(reassembly) => Step::Complete(Ok(reassembly.finish())),
                None => Step::Complete(Err(Error::InvalidNetworkResponse)),
            },
            Err(e) => Step::Complete(Err(e)),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for slot in state.drain() {
            let _ = slot.tx.send(Err(Error::Aborted));
        }
    }
}

/// A client session over one transport.
///
/// Cloning is cheap and every clone refers to the same session. Dropping the
/// last clone, or calling [`Session::shutdown`], completes every outstanding
/// request with [`Error::Aborted`].
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<Inner>,
}

/// A handle that does not keep the session alive.
#[derive(Clone)]
pub(crate) struct WeakSession(Weak<Inner>);

impl WeakSession {
    pub(crate) fn upgrade(&self) -> Result<Session> {
        match self.0.upgrade() {
            Some(inner) => Ok(Session { inner }),
            None => res!(Error::Aborted),
        }
    }
}

impl Session {
    pub fn new<T: Transport + 'static>(transport: T, config: SessionConfig) -> Session {
        Session::with_transport(Arc::new(transport), config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: SessionConfig) -> Session {
        let (closing, _) = watch::channel(false);
        Session {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(State {
                    next_mid: 1,
                    ..Default::default()
                }),
                reader: Arc::new(tokio::sync::Mutex::new(())),
                closing,
                sync_active: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakSession {
        WeakSession(Arc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Charset used for strings in requests.
    pub fn charset(&self) -> Charset {
        self.inner.config.charset
    }

    pub fn large_files(&self) -> bool {
        self.inner.config.large_files
    }

    /// Number of requests submitted and not yet completed.
    pub fn outstanding(&self) -> usize {
        self.inner
            .lock_state()
            .pending
            .values()
            .filter(|slot| !slot.abandoned)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }

    /// Encode `envelope`, register it and send its primary frame.
    pub async fn submit(&self, envelope: Envelope) -> Result<PendingRequest> {
        let frames = envelope.encode(self.charset(), self.inner.config.max_xmit)?;
        let (tx, rx) = oneshot::channel();

        let (mid, serial, primary) = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return res!(Error::Aborted);
            }
            let mid = state.alloc_mid()?;
            let mut encoded = frames
                .iter()
                .map(|frame| self.inner.encode_frame(frame, mid))
                .collect::<Result<VecDeque<_>>>()?;
            let primary = encoded.pop_front().ok_or(Error::InvalidParameter)?;

            let serial = state.next_serial;
            state.next_serial += 1;
            state.pending.insert(
                mid,
                Slot {
                    serial,
                    style: envelope.style.clone(),
                    reassembly: envelope
                        .style
                        .is_transaction()
                        .then(|| Reassembly::new(envelope.limits)),
                    secondaries: encoded,
                    interim: false,
                    abandoned: false,
                    tx,
                },
            );
            (mid, serial, primary)
        };

        debug!(
            "\t→ {:?} mid {} params {} data {}",
            envelope.command(),
            mid,
            envelope.params.len(),
            envelope.data.len()
        );
        if let Err(e) = self.inner.transport.send(primary).await {
            error!("Transport error: {}", e);
            let err = map_io_error(&e);
            self.inner.fail(mid, err);
            return Err(err);
        }

        Ok(PendingRequest {
            mid,
            serial,
            limits: envelope.limits,
            rx,
            session: Arc::downgrade(&self.inner),
        })
    }

    /// Submit and collect in one step.
    pub async fn transact(&self, envelope: Envelope) -> Result<EnvelopeReply> {
        self.submit(envelope).await?.collect().await
    }

    /// Refuse new requests and abort every outstanding one.
    pub fn shutdown(&self) {
        self.inner.lock_state().closed = true;
        self.inner.fail_all(Error::Aborted);
        self.inner.closing.send_replace(true);
    }
}

/// A submitted request awaiting its reply.
///
/// Dropping it before the reply arrives sends `SMBntcancel` for its mid with
/// the next read, and the request is forgotten once the server answers.
pub struct PendingRequest {
    mid: u16,
    serial: u64,
    limits: ReplyLimits,
    rx: oneshot::Receiver<Result<EnvelopeReply>>,
    session: Weak<Inner>,
}

impl PendingRequest {
    /// Multiplex id identifying this request on the wire.
    pub fn mid(&self) -> u16 {
        self.mid
    }

    /// Wait for the complete reply and check it against the declared limits.
    pub async fn collect(mut self) -> Result<EnvelopeReply> {
        let reply = self.wait().await?;
        reply.check(&self.limits)?;
        Ok(reply)
    }

    fn try_take(&mut self) -> Option<Result<EnvelopeReply>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Closed) => Some(Err(Error::Aborted)),
            Err(TryRecvError::Empty) => None,
        }
    }

    async fn wait(&mut self) -> Result<EnvelopeReply> {
        loop {
            if let Some(result) = self.try_take() {
                return result;
            }
            let Some((reader, mut closing)) = self
                .session
                .upgrade()
                .map(|inner| (inner.reader.clone(), inner.closing.subscribe()))
            else {
                return res!(Error::Aborted);
            };

            tokio::select! {
                result = &mut self.rx => return result.unwrap_or(Err(Error::Aborted)),
                _reading = reader.lock_owned() => {
                    // Another collector may have routed our reply meanwhile
                    if let Some(result) = self.try_take() {
                        return result;
                    }
                    self.read_one(&mut closing).await;
                }
            }
        }
    }

    /// Read one frame and route it, unless the session closes first.
    async fn read_one(&self, closing: &mut watch::Receiver<bool>) {
        let transport = {
            let Some(inner) = self.session.upgrade() else {
                return;
            };
            if inner.flush().await.is_err() {
                return;
            }
            inner.transport.clone()
        };

        let received = tokio::select! {
            received = transport.recv() => received,
            _ = closing.wait_for(|closed| *closed) => {
                debug!("Session closed during read for mid {}", self.mid);
                return;
            }
        };
        if let Some(inner) = self.session.upgrade() {
            inner.dispatch(received).await;
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        let Some(inner) = self.session.upgrade() else {
            return;
        };
        let mut state = inner.lock_state();
        let Some(slot) = state.pending.get_mut(&self.mid) else {
            return;
        };
        if slot.serial != self.serial || slot.abandoned {
            return;
        }
        slot.abandoned = true;
        slot.secondaries.clear();

        let cancel = Frame {
            command: SmbCommand::NtCancel,
            words: WireBuffer::new(),
            bytes: WireBuffer::new(),
        };
        match inner.encode_frame(&cancel, self.mid) {
            Ok(frame) => state.outgoing.push_back(frame),
            Err(e) => warn!("Cannot cancel mid {}: {}", self.mid, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::WireBuffer;
    use crate::status::NtStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io;

    /// Replies queued up front; sent frames recorded.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<io::Result<Option<Bytes>>>>,
        sent: Mutex<Vec<Bytes>>,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, msg: Bytes) -> io::Result<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        async fn recv(&self) -> io::Result<Option<Bytes>> {
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn reply(command: SmbCommand, mid: u16, status: NtStatus, words: &[u8], bytes: &[u8]) -> Bytes {
        let header = SmbHeader {
            command: command as u8,
            status,
            flags: HeaderFlags::REPLY,
            mid,
            ..Default::default()
        };
        let mut buf = Vec::new();
        serialize::write_msg(&mut buf, &header, words, bytes).unwrap();
        Bytes::from(buf)
    }

    fn session(replies: Vec<io::Result<Option<Bytes>>>) -> (Session, Arc<Scripted>) {
        let transport = Arc::new(Scripted {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        });
        let session = Session::with_transport(transport.clone(), SessionConfig::default());
        (session, transport)
    }

    fn close_request(fnum: u16) -> Envelope {
        let mut words = WireBuffer::new();
        words.push_u16_le(fnum);
        words.push_u32_le(u32::MAX);
        Envelope::plain(SmbCommand::Close, words, WireBuffer::new())
    }

    #[test]
    fn mids_skip_reserved_and_in_flight() {
        let mut state = State::default();
        state.next_mid = RESERVED_MID;
        assert_eq!(state.alloc_mid().unwrap(), 0);
        state.pending.clear();
        state.next_mid = 5;
        let (tx, _rx) = oneshot::channel();
        state.pending.insert(
            5,
            Slot {
                serial: 0,
                style: TransStyle::Trans2,
                reassembly: None,
                secondaries: VecDeque::new(),
                interim: false,
                abandoned: false,
                tx,
            },
        );
        assert_eq!(state.alloc_mid().unwrap(), 6);
    }

    #[test]
    fn cancels_go_first_and_secondaries_wait_for_the_interim() {
        let mut state = State::default();
        let (tx, _rx) = oneshot::channel();
        state.pending.insert(
            3,
            Slot {
                serial: 0,
                style: TransStyle::Trans2,
                reassembly: None,
                secondaries: VecDeque::from(vec![Bytes::from_static(b"s1"), Bytes::from_static(b"s2")]),
                interim: false,
                abandoned: false,
                tx,
            },
        );
        state.outgoing.push_back(Bytes::from_static(b"cancel"));

        assert_eq!(state.next_outgoing().unwrap(), Bytes::from_static(b"cancel"));
        assert_eq!(state.next_outgoing(), None);

        state.pending.get_mut(&3).unwrap().interim = true;
        assert_eq!(state.next_outgoing().unwrap(), Bytes::from_static(b"s1"));
        // An interrupted flush leaves the rest queued
        assert_eq!(state.pending[&3].secondaries.len(), 1);
        assert_eq!(state.next_outgoing().unwrap(), Bytes::from_static(b"s2"));
        assert_eq!(state.next_outgoing(), None);
    }

    #[tokio::test]
    async fn replies_route_by_mid() {
        let (session, transport) = session(vec![
            Ok(Some(reply(SmbCommand::Close, 2, NtStatus::SUCCESS, &[], b"two"))),
            Ok(Some(reply(SmbCommand::Close, 1, NtStatus::ACCESS_DENIED, &[], &[]))),
        ]);

        let first = session.submit(close_request(1)).await.unwrap();
        let second = session.submit(close_request(2)).await.unwrap();
        assert_eq!((first.mid(), second.mid()), (1, 2));
        assert_eq!(session.outstanding(), 2);

        assert_eq!(
            first.collect().await.err(),
            Some(Error::Server(NtStatus::ACCESS_DENIED))
        );
        assert_eq!(second.collect().await.unwrap().data.as_slice(), b"two");
        assert_eq!(session.outstanding(), 0);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_mids_are_dropped() {
        let (session, _) = session(vec![
            Ok(Some(reply(SmbCommand::Close, 77, NtStatus::SUCCESS, &[], &[]))),
            Ok(Some(Bytes::from_static(b"garbage"))),
            Ok(Some(reply(SmbCommand::Close, 1, NtStatus::SUCCESS, &[], &[]))),
        ]);
        let pending = session.submit(close_request(1)).await.unwrap();
        assert!(pending.collect().await.is_ok());
    }

    #[tokio::test]
    async fn eof_fails_outstanding_requests() {
        let (session, _) = session(vec![]);
        let pending = session.submit(close_request(1)).await.unwrap();
        assert_eq!(
            pending.collect().await.err(),
            Some(Error::Transport(ECONNRESET))
        );
        assert_eq!(session.outstanding(), 0);
    }

    #[tokio::test]
    async fn shutdown_aborts_everything() {
        let (session, _) = session(vec![]);
        let pending = session.submit(close_request(1)).await.unwrap();
        session.shutdown();
        assert!(session.is_closed());
        assert_eq!(pending.collect().await.err(), Some(Error::Aborted));
        assert_eq!(
            session.submit(close_request(2)).await.err(),
            Some(Error::Aborted)
        );
    }

    #[tokio::test]
    async fn dropping_the_session_aborts_requests() {
        let (session, _) = session(vec![]);
        let pending = session.submit(close_request(1)).await.unwrap();
        drop(session);
        assert_eq!(pending.collect().await.err(), Some(Error::Aborted));
    }

    #[tokio::test]
    async fn abandoned_requests_stop_counting() {
        let (session, _) = session(vec![]);
        let pending = session.submit(close_request(1)).await.unwrap();
        assert_eq!(session.outstanding(), 1);
        drop(pending);
        assert_eq!(session.outstanding(), 0);
    }

    #[tokio::test]
    async fn abandoned_requests_are_cancelled_and_reaped() {
        let (session, transport) = session(vec![
            Ok(Some(reply(SmbCommand::NtTrans, 1, NtStatus::CANCELLED, &[], &[]))),
            Ok(Some(reply(SmbCommand::Close, 2, NtStatus::SUCCESS, &[], &[]))),
        ]);
        let watch = session
            .submit(Envelope::nt_trans(NtTransFunction::NotifyChange).setup(&[0, 0, 7, 0]))
            .await
            .unwrap();
        drop(watch);

        let pending = session.submit(close_request(2)).await.unwrap();
        assert!(pending.collect().await.is_ok());

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        let cancel = serialize::read_msg(&sent[2]).unwrap();
        assert_eq!(cancel.header.command, SmbCommand::NtCancel as u8);
        assert_eq!(cancel.header.mid, 1);
        assert_eq!(cancel.wct(), 0);
        assert!(session.inner.lock_state().pending.is_empty());
    }
}
