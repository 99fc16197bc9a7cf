//! NT status codes carried in the SMB1 header.

use std::fmt;

/// A 32-bit NT status as reported by the server.
///
/// The top two bits carry the severity: `00` success, `01` informational,
/// `10` warning, `11` error. Warnings such as [`NtStatus::BUFFER_OVERFLOW`] still
/// carry a usable payload.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0x0000_0000);
    pub const NOTIFY_ENUM_DIR: NtStatus = NtStatus(0x0000_010C);
    pub const BUFFER_OVERFLOW: NtStatus = NtStatus(0x8000_0005);
    pub const NO_MORE_FILES: NtStatus = NtStatus(0x8000_0006);
    pub const UNSUCCESSFUL: NtStatus = NtStatus(0xC000_0001);
    pub const NOT_IMPLEMENTED: NtStatus = NtStatus(0xC000_0002);
    pub const INVALID_INFO_CLASS: NtStatus = NtStatus(0xC000_0003);
    pub const INVALID_HANDLE: NtStatus = NtStatus(0xC000_0008);
    pub const INVALID_PARAMETER: NtStatus = NtStatus(0xC000_000D);
    pub const NO_SUCH_FILE: NtStatus = NtStatus(0xC000_000F);
    pub const END_OF_FILE: NtStatus = NtStatus(0xC000_0011);
    pub const NO_MEMORY: NtStatus = NtStatus(0xC000_0017);
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022);
    pub const BUFFER_TOO_SMALL: NtStatus = NtStatus(0xC000_0023);
    pub const OBJECT_NAME_INVALID: NtStatus = NtStatus(0xC000_0033);
    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034);
    pub const OBJECT_NAME_COLLISION: NtStatus = NtStatus(0xC000_0035);
    pub const OBJECT_PATH_NOT_FOUND: NtStatus = NtStatus(0xC000_003A);
    pub const DATA_ERROR: NtStatus = NtStatus(0xC000_003E);
    pub const SHARING_VIOLATION: NtStatus = NtStatus(0xC000_0043);
    pub const EAS_NOT_SUPPORTED: NtStatus = NtStatus(0xC000_004F);
    pub const FILE_LOCK_CONFLICT: NtStatus = NtStatus(0xC000_0054);
    pub const LOCK_NOT_GRANTED: NtStatus = NtStatus(0xC000_0055);
    pub const DELETE_PENDING: NtStatus = NtStatus(0xC000_0056);
    pub const RANGE_NOT_LOCKED: NtStatus = NtStatus(0xC000_007E);
    pub const DISK_FULL: NtStatus = NtStatus(0xC000_007F);
    pub const FILE_IS_A_DIRECTORY: NtStatus = NtStatus(0xC000_00BA);
    pub const NOT_SUPPORTED: NtStatus = NtStatus(0xC000_00BB);
    pub const INVALID_NETWORK_RESPONSE: NtStatus = NtStatus(0xC000_00C3);
    pub const DIRECTORY_NOT_EMPTY: NtStatus = NtStatus(0xC000_0101);
    pub const NOT_A_DIRECTORY: NtStatus = NtStatus(0xC000_0103);
    pub const CANCELLED: NtStatus = NtStatus(0xC000_0120);
    pub const CANNOT_DELETE: NtStatus = NtStatus(0xC000_0121);

    /// Raw status value.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Severity `11`.
    pub fn is_error(self) -> bool {
        self.0 >> 30 == 0b11
    }

    /// The server has more data than it could return in this reply.
    pub fn is_more_data(self) -> bool {
        self == NtStatus::BUFFER_OVERFLOW
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            NtStatus::SUCCESS => "NT_STATUS_OK",
            NtStatus::NOTIFY_ENUM_DIR => "NT_STATUS_NOTIFY_ENUM_DIR",
            NtStatus::BUFFER_OVERFLOW => "STATUS_BUFFER_OVERFLOW",
            NtStatus::NO_MORE_FILES => "STATUS_NO_MORE_FILES",
            NtStatus::UNSUCCESSFUL => "NT_STATUS_UNSUCCESSFUL",
            NtStatus::NOT_IMPLEMENTED => "NT_STATUS_NOT_IMPLEMENTED",
            NtStatus::INVALID_INFO_CLASS => "NT_STATUS_INVALID_INFO_CLASS",
            NtStatus::INVALID_HANDLE => "NT_STATUS_INVALID_HANDLE",
            NtStatus::INVALID_PARAMETER => "NT_STATUS_INVALID_PARAMETER",
            NtStatus::NO_SUCH_FILE => "NT_STATUS_NO_SUCH_FILE",
            NtStatus::END_OF_FILE => "NT_STATUS_END_OF_FILE",
            NtStatus::NO_MEMORY => "NT_STATUS_NO_MEMORY",
            NtStatus::ACCESS_DENIED => "NT_STATUS_ACCESS_DENIED",
            NtStatus::BUFFER_TOO_SMALL => "NT_STATUS_BUFFER_TOO_SMALL",
            NtStatus::OBJECT_NAME_INVALID => "NT_STATUS_OBJECT_NAME_INVALID",
            NtStatus::OBJECT_NAME_NOT_FOUND => "NT_STATUS_OBJECT_NAME_NOT_FOUND",
            NtStatus::OBJECT_NAME_COLLISION => "NT_STATUS_OBJECT_NAME_COLLISION",
            NtStatus::OBJECT_PATH_NOT_FOUND => "NT_STATUS_OBJECT_PATH_NOT_FOUND",
            NtStatus::DATA_ERROR => "NT_STATUS_DATA_ERROR",
            NtStatus::SHARING_VIOLATION => "NT_STATUS_SHARING_VIOLATION",
            NtStatus::EAS_NOT_SUPPORTED => "NT_STATUS_EAS_NOT_SUPPORTED",
            NtStatus::FILE_LOCK_CONFLICT => "NT_STATUS_FILE_LOCK_CONFLICT",
            NtStatus::LOCK_NOT_GRANTED => "NT_STATUS_LOCK_NOT_GRANTED",
            NtStatus::DELETE_PENDING => "NT_STATUS_DELETE_PENDING",
            NtStatus::RANGE_NOT_LOCKED => "NT_STATUS_RANGE_NOT_LOCKED",
            NtStatus::DISK_FULL => "NT_STATUS_DISK_FULL",
            NtStatus::FILE_IS_A_DIRECTORY => "NT_STATUS_FILE_IS_A_DIRECTORY",
            NtStatus::NOT_SUPPORTED => "NT_STATUS_NOT_SUPPORTED",
            NtStatus::INVALID_NETWORK_RESPONSE => "NT_STATUS_INVALID_NETWORK_RESPONSE",
            NtStatus::DIRECTORY_NOT_EMPTY => "NT_STATUS_DIRECTORY_NOT_EMPTY",
            NtStatus::NOT_A_DIRECTORY => "NT_STATUS_NOT_A_DIRECTORY",
            NtStatus::CANCELLED => "NT_STATUS_CANCELLED",
            NtStatus::CANNOT_DELETE => "NT_STATUS_CANNOT_DELETE",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "NT_STATUS(0x{:08x})", self.0),
        }
    }
}

impl From<u32> for NtStatus {
    fn from(code: u32) -> Self {
        NtStatus(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_classes() {
        assert!(!NtStatus::SUCCESS.is_error());
        assert!(!NtStatus::BUFFER_OVERFLOW.is_error());
        assert!(NtStatus::BUFFER_OVERFLOW.is_more_data());
        assert!(NtStatus::NOT_SUPPORTED.is_error());
        assert!(!NtStatus::NOTIFY_ENUM_DIR.is_error());
    }

    #[test]
    fn display_falls_back_to_hex() {
        assert_eq!(NtStatus::ACCESS_DENIED.to_string(), "NT_STATUS_ACCESS_DENIED");
        assert_eq!(NtStatus(0xC0DE_0001).to_string(), "NT_STATUS(0xc0de0001)");
    }
}
