#![forbid(unsafe_code)]
//! Asynchronous SMB1/CIFS client transaction engine for Rust.
//!
//! This crate implements the request/reply core of an SMB1 client: the
//! `SMBtrans`, `SMBtrans2` and `SMBnttrans` transaction envelopes, a
//! tokio-based engine matching replies to requests, and the codecs of the
//! file operations built on top, including the CIFS UNIX (POSIX) extensions.
//!
//! # Overview
//!
//! A [`Session`] wraps one transport to a server whose session (negotiation,
//! authentication, tree connect) has already been set up by the caller; the
//! negotiated values are passed in through a [`SessionConfig`].
//!
//! Every operation comes in two layers:
//!
//! 1. A pair of pure functions in [`ops`], building an [`Envelope`] and
//!    decoding an [`EnvelopeReply`].
//! 2. An async method on [`Session`] that submits, collects and decodes.
//!
//! Any number of requests may be outstanding on one session. Replies are
//! routed by multiplex id, so they may arrive in any order.
//!
//! # Example
//!
//! ```no_run
//! use rscifs::{DenyMode, Session, SessionConfig, transport::NetbiosTransport};
//! use nix::fcntl::OFlag;
//!
//! #[tokio::main]
//! async fn main() -> rscifs::Result<()> {
//!     let transport = NetbiosTransport::connect("tcp!fileserver!445")?;
//!     let config = SessionConfig::default().with_tid(1).with_uid(100);
//!     let session = Session::new(transport, config);
//!
//!     let fnum = session.open("\\docs\\a.txt", OFlag::O_RDONLY, DenyMode::None).await?;
//!     let stat = session.posix_fstat(fnum).await?;
//!     println!("{} bytes, mode {:o}", stat.size, stat.mode);
//!     session.close(fnum).await
//! }
//! ```
//!
//! # Blocking callers
//!
//! [`sync::run_sync`] drives one operation to completion on a private
//! runtime. It refuses to run while asynchronous requests are outstanding on
//! the same session.
//!
//! # Error Handling
//!
//! Every entry point returns [`Result`]. Server failures surface as
//! [`Error::Server`] carrying the NT status; [`Error::errno`] maps any error
//! to a POSIX errno:
//! - `ENOENT` - No such file
//! - `EACCES` - Access denied
//! - `EEXIST` - Name collision
//! - `EPROTO` - Malformed reply
//!
//! # Transport
//!
//! Addresses use the `"tcp!host!port"` notation (e.g. `"tcp!fileserver!445"`),
//! the port defaulting to 445.
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod ops;
pub mod proto;
pub mod serialize;
pub mod status;
pub mod sync;
pub mod trans;
pub mod transport;
#[macro_use]
pub mod utils;

pub use crate::buffer::{Charset, WireBuffer};
pub use crate::config::SessionConfig;
pub use crate::engine::{PendingRequest, Session};
pub use crate::error::Error;
pub use crate::error::errno;
pub use crate::proto::*;
pub use crate::status::NtStatus;
pub use crate::trans::{Envelope, EnvelopeReply};
pub use crate::utils::Result;
