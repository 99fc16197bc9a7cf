//! Negotiated session parameters.

use crate::{buffer::Charset, proto::*};

/// What the session layer negotiated with the server.
///
/// The transaction engine never negotiates anything itself; it is handed one
/// of these when a [`Session`](crate::engine::Session) is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// String encoding of names on the wire.
    pub charset: Charset,
    /// The server advertised `CAP_LARGE_FILES`.
    pub large_files: bool,
    /// Largest request the server accepts, header included.
    pub max_xmit: u32,
    /// Reply ceiling for operations that do not pick their own.
    pub max_buffer: u32,
    pub tid: u16,
    pub uid: u16,
    pub pid: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            charset: Charset::Wide,
            large_files: true,
            max_xmit: DEFAULT_MAX_XMIT,
            max_buffer: CLI_BUFFER_SIZE,
            tid: 0,
            uid: 0,
            pid: std::process::id(),
        }
    }
}

impl SessionConfig {
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_large_files(mut self, large_files: bool) -> Self {
        self.large_files = large_files;
        self
    }

    /// Values below the smallest usable frame are raised to it.
    pub fn with_max_xmit(mut self, max_xmit: u32) -> Self {
        self.max_xmit = max_xmit.max(MIN_MAX_XMIT);
        self
    }

    pub fn with_max_buffer(mut self, max_buffer: u32) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    pub fn with_tid(mut self, tid: u16) -> Self {
        self.tid = tid;
        self
    }

    pub fn with_uid(mut self, uid: u16) -> Self {
        self.uid = uid;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Request `flags2` for this session.
    pub fn flags2(&self) -> HeaderFlags2 {
        let mut flags2 = HeaderFlags2::LONG_PATH_COMPONENTS
            | HeaderFlags2::EXTENDED_ATTRIBUTES
            | HeaderFlags2::IS_LONG_NAME
            | HeaderFlags2::NT_STATUS;
        if self.charset.is_wide() {
            flags2 |= HeaderFlags2::UNICODE;
        }
        flags2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_flag_follows_charset() {
        let wide = SessionConfig::default();
        assert!(wide.flags2().contains(HeaderFlags2::UNICODE));
        assert_eq!(wide.flags2().bits(), 0xc043);

        let narrow = SessionConfig::default().with_charset(Charset::Narrow);
        assert_eq!(narrow.flags2().bits(), 0x4043);
    }

    #[test]
    fn max_xmit_has_a_floor() {
        assert_eq!(SessionConfig::default().with_max_xmit(10).max_xmit, MIN_MAX_XMIT);
        assert_eq!(SessionConfig::default().with_max_xmit(4356).max_xmit, 4356);
    }
}
