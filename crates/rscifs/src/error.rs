//! Client error representations.
//!
//! Every public entry point returns either its typed payload or one of the
//! failure kinds below. Server failures that have no dedicated kind are passed
//! through as [`Error::Server`], transport failures as [`Error::Transport`].
//! Any error can be turned into a POSIX errno with [`Error::errno`].

use crate::error::errno::*;
use crate::status::NtStatus;
use nix::errno::Errno;
use std::io::ErrorKind::*;
use std::{fmt, io};

fn errno_from_ioerror(e: &io::Error) -> Errno {
    e.raw_os_error()
        .map(Errno::from_raw)
        .unwrap_or(match e.kind() {
            NotFound => ENOENT,
            PermissionDenied => EPERM,
            ConnectionRefused => ECONNREFUSED,
            ConnectionReset => ECONNRESET,
            ConnectionAborted => ECONNABORTED,
            NotConnected => ENOTCONN,
            AddrInUse => EADDRINUSE,
            AddrNotAvailable => EADDRNOTAVAIL,
            BrokenPipe => EPIPE,
            AlreadyExists => EALREADY,
            WouldBlock => EAGAIN,
            InvalidInput => EINVAL,
            InvalidData => EINVAL,
            TimedOut => ETIMEDOUT,
            WriteZero => EAGAIN,
            Interrupted => EINTR,
            UnexpectedEof => ECONNRESET,
            OutOfMemory => ENOMEM,
            _ => EIO,
        })
}

/// Translate a raw transport failure into the error kind every request reports.
pub fn map_io_error(e: &io::Error) -> Error {
    match e.kind() {
        OutOfMemory => Error::NoMemory,
        _ => Error::Transport(errno_from_ioerror(e)),
    }
}

fn errno_from_status(status: NtStatus) -> Errno {
    match status {
        NtStatus::NO_SUCH_FILE | NtStatus::OBJECT_NAME_NOT_FOUND => ENOENT,
        NtStatus::OBJECT_PATH_NOT_FOUND => ENOTDIR,
        NtStatus::OBJECT_NAME_INVALID => ENOENT,
        NtStatus::ACCESS_DENIED | NtStatus::CANNOT_DELETE => EACCES,
        NtStatus::OBJECT_NAME_COLLISION => EEXIST,
        NtStatus::SHARING_VIOLATION => EBUSY,
        NtStatus::DELETE_PENDING => ENOENT,
        NtStatus::INVALID_HANDLE => EBADF,
        NtStatus::INVALID_PARAMETER | NtStatus::INVALID_INFO_CLASS => EINVAL,
        NtStatus::NO_MEMORY => ENOMEM,
        NtStatus::DISK_FULL => ENOSPC,
        NtStatus::DIRECTORY_NOT_EMPTY => ENOTEMPTY,
        NtStatus::NOT_A_DIRECTORY => ENOTDIR,
        NtStatus::FILE_IS_A_DIRECTORY => EISDIR,
        NtStatus::FILE_LOCK_CONFLICT | NtStatus::LOCK_NOT_GRANTED => EACCES,
        NtStatus::RANGE_NOT_LOCKED => ENOLCK,
        NtStatus::EAS_NOT_SUPPORTED => EOPNOTSUPP,
        NtStatus::NOT_IMPLEMENTED | NtStatus::NOT_SUPPORTED => EOPNOTSUPP,
        NtStatus::END_OF_FILE => ENODATA,
        NtStatus::CANCELLED => ECANCELED,
        NtStatus::BUFFER_TOO_SMALL => ERANGE,
        _ => EIO,
    }
}

/// Failure kinds reported by the transaction engine and the operation codecs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The caller misused the API, e.g. a sync call while async requests are
    /// outstanding or a lock request carrying an unlock type.
    InvalidParameter,
    /// A buffer could not be allocated.
    NoMemory,
    /// The reply is too short or internally inconsistent for the fields the
    /// caller wants to read.
    DataError,
    /// The reply violates the transaction framing: mismatched totals, bad
    /// offsets or a malformed sub-record.
    InvalidNetworkResponse,
    /// The server rejected this wire form of the operation.
    NotSupported,
    /// The owning session went away before the request completed.
    Aborted,
    /// Any other error status returned by the server.
    Server(NtStatus),
    /// The transport failed.
    Transport(Errno),
}

impl Error {
    /// Get an errno representation.
    pub fn errno(&self) -> Errno {
        match *self {
            Error::InvalidParameter => EINVAL,
            Error::NoMemory => ENOMEM,
            Error::DataError => EIO,
            Error::InvalidNetworkResponse => EPROTO,
            Error::NotSupported => EOPNOTSUPP,
            Error::Aborted => ECONNABORTED,
            Error::Server(status) => errno_from_status(status),
            Error::Transport(errno) => errno,
        }
    }

    /// The NT status this error corresponds to.
    pub fn status(&self) -> NtStatus {
        match *self {
            Error::InvalidParameter => NtStatus::INVALID_PARAMETER,
            Error::NoMemory => NtStatus::NO_MEMORY,
            Error::DataError => NtStatus::DATA_ERROR,
            Error::InvalidNetworkResponse => NtStatus::INVALID_NETWORK_RESPONSE,
            Error::NotSupported => NtStatus::NOT_SUPPORTED,
            Error::Aborted => NtStatus::CANCELLED,
            Error::Server(status) => status,
            Error::Transport(_) => NtStatus::UNSUCCESSFUL,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidParameter => write!(f, "invalid parameter"),
            Error::NoMemory => write!(f, "out of memory"),
            Error::DataError => write!(f, "reply too short or inconsistent"),
            Error::InvalidNetworkResponse => write!(f, "invalid network response"),
            Error::NotSupported => write!(f, "operation not supported by server"),
            Error::Aborted => write!(f, "request aborted"),
            Error::Server(status) => write!(f, "server returned {}", status),
            Error::Transport(errno) => write!(f, "transport error: {}", errno.desc()),
        }
    }
}

impl std::error::Error for Error {}

impl From<NtStatus> for Error {
    fn from(status: NtStatus) -> Self {
        match status {
            NtStatus::NOT_SUPPORTED => Error::NotSupported,
            _ => Error::Server(status),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        map_io_error(&e)
    }
}

impl<'a> From<&'a io::Error> for Error {
    fn from(e: &'a io::Error) -> Self {
        map_io_error(e)
    }
}

impl From<Errno> for Error {
    fn from(e: Errno) -> Self {
        Error::Transport(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::from_raw_os_error(e.errno() as i32)
    }
}

pub mod errno {
    pub use nix::errno::Errno::*;
}
