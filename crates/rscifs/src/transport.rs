//! Message transports.
//!
//! A [`Transport`] moves whole SMB messages. Both implementations here speak
//! the direct-hosted NetBIOS session framing: a type byte followed by a 24-bit
//! big-endian length. Keep-alive frames are consumed silently.

use {
    crate::{io_err, proto::SMB_PORT, utils},
    async_trait::async_trait,
    bytes::{Bytes, BytesMut},
    futures::sink::SinkExt,
    log::{info, warn},
    std::io,
    tokio::{
        io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
        net::tcp::{OwnedReadHalf, OwnedWriteHalf},
        sync::Mutex,
    },
    tokio_stream::StreamExt,
    tokio_util::codec::{
        Decoder, Encoder, FramedRead, FramedWrite, length_delimited::LengthDelimitedCodec,
    },
};

const SESSION_MESSAGE: u8 = 0x00;
const SESSION_KEEPALIVE: u8 = 0x85;
const SESSION_HEADER_SIZE: usize = 4;
const MAX_FRAME_LENGTH: usize = 0x1ffff;

/// Moves complete SMB messages to and from the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message.
    async fn send(&self, msg: Bytes) -> io::Result<()>;

    /// Receive the next message, or `None` once the peer has closed the
    /// connection. Must be cancel safe: a dropped call loses no bytes.
    async fn recv(&self) -> io::Result<Option<Bytes>>;
}

/// Decoder yielding whole session frames, header included. The length field
/// counts the payload only.
fn read_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_offset(1)
        .length_field_length(3)
        .length_adjustment(SESSION_HEADER_SIZE as isize)
        .num_skip(0)
        .max_frame_length(MAX_FRAME_LENGTH)
        .big_endian()
        .new_codec()
}

/// Encoder prefixing a four-byte big-endian length. Frames never exceed 17
/// bits, so the top byte is the session message type.
fn write_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LENGTH)
        .big_endian()
        .new_codec()
}

/// Strip the session header; `None` for frames that carry no message.
fn session_payload(frame: BytesMut) -> Option<Bytes> {
    match frame.first().copied() {
        Some(SESSION_MESSAGE) => Some(frame.freeze().slice(SESSION_HEADER_SIZE..)),
        Some(SESSION_KEEPALIVE) => None,
        typ => {
            warn!("Dropping NetBIOS session frame of type {:?}", typ);
            None
        }
    }
}

/// Transport over any async byte stream pair.
pub struct FramedTransport<R, W> {
    reader: Mutex<FramedRead<R, LengthDelimitedCodec>>,
    writer: Mutex<FramedWrite<W, LengthDelimitedCodec>>,
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        FramedTransport {
            reader: Mutex::new(FramedRead::new(reader, read_codec())),
            writer: Mutex::new(FramedWrite::new(writer, write_codec())),
        }
    }
}

impl FramedTransport<OwnedReadHalf, OwnedWriteHalf> {
    /// Connect to `tcp!host[!port]` on the current runtime.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let addr = tcp_addr(addr)?;
        let stream = tokio::net::TcpStream::connect(&addr).await?;
        info!("connected: {:?}", stream.peer_addr()?);
        let (readhalf, writehalf) = stream.into_split();
        Ok(FramedTransport::new(readhalf, writehalf))
    }
}

#[async_trait]
impl<R, W> Transport for FramedTransport<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    async fn send(&self, msg: Bytes) -> io::Result<()> {
        self.writer.lock().await.send(msg).await
    }

    async fn recv(&self) -> io::Result<Option<Bytes>> {
        let mut framedread = self.reader.lock().await;
        while let Some(frame) = framedread.next().await {
            if let Some(msg) = session_payload(frame?) {
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }
}

/// TCP transport that is not bound to one runtime.
///
/// Each call registers a duplicate of the socket with whichever runtime is
/// driving it, so the same connection serves both long-lived async tasks and
/// the short-lived runtimes of [`run_sync`](crate::sync::run_sync).
pub struct NetbiosTransport {
    stream: std::net::TcpStream,
    reader: Mutex<(LengthDelimitedCodec, BytesMut)>,
    writer: Mutex<LengthDelimitedCodec>,
}

impl NetbiosTransport {
    /// Connect to `tcp!host[!port]`; the port defaults to 445.
    pub fn connect(addr: &str) -> io::Result<Self> {
        let addr = tcp_addr(addr)?;
        let stream = std::net::TcpStream::connect(&addr)?;
        info!("connected: {:?}", stream.peer_addr()?);
        Self::from_std(stream)
    }

    pub fn from_std(stream: std::net::TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(NetbiosTransport {
            stream,
            reader: Mutex::new((read_codec(), BytesMut::with_capacity(4096))),
            writer: Mutex::new(write_codec()),
        })
    }

    fn attach(&self) -> io::Result<tokio::net::TcpStream> {
        tokio::net::TcpStream::from_std(self.stream.try_clone()?)
    }
}

fn next_payload(codec: &mut LengthDelimitedCodec, buf: &mut BytesMut) -> io::Result<Option<Bytes>> {
    while let Some(frame) = codec.decode(buf)? {
        if let Some(msg) = session_payload(frame) {
            return Ok(Some(msg));
        }
    }
    Ok(None)
}

#[async_trait]
impl Transport for NetbiosTransport {
    async fn send(&self, msg: Bytes) -> io::Result<()> {
        let mut codec = self.writer.lock().await;
        let mut frame = BytesMut::with_capacity(msg.len() + SESSION_HEADER_SIZE);
        codec.encode(msg, &mut frame)?;
        self.attach()?.write_all(&frame).await
    }

    async fn recv(&self) -> io::Result<Option<Bytes>> {
        let mut reader = self.reader.lock().await;
        let (codec, buf) = &mut *reader;
        if let Some(msg) = next_payload(codec, buf)? {
            return Ok(Some(msg));
        }

        let mut stream = self.attach()?;
        loop {
            if stream.read_buf(buf).await? == 0 {
                return if buf.is_empty() {
                    Ok(None)
                } else {
                    Err(io_err!(UnexpectedEof, "Connection closed mid-frame"))
                };
            }
            if let Some(msg) = next_payload(codec, buf)? {
                return Ok(Some(msg));
            }
        }
    }
}

fn tcp_addr(addr: &str) -> io::Result<String> {
    let (proto, host, port) =
        utils::parse_proto(addr).ok_or_else(|| io_err!(InvalidInput, "Invalid protocol or address"))?;
    if proto != "tcp" {
        return Err(io_err!(InvalidInput, "Unsupported protocol"));
    }
    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| io_err!(InvalidInput, "Invalid port"))?,
        None => SMB_PORT,
    };
    Ok(format!("{}:{}", host, port))
}
