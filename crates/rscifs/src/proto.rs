//! SMB1 protocol data types and constants.
//!
//! # Protocol
//! SMB1/CIFS with the CIFS UNIX (POSIX) extensions

use bitflags::bitflags;
use enum_primitive::*;
use nix::fcntl::OFlag;
use nix::sys::stat::{Mode, SFlag};

/// SMB1 protocol id, the first four bytes of every message
pub const SMB_MAGIC: [u8; 4] = [0xff, b'S', b'M', b'B'];

/// Size of the fixed SMB1 header
pub const HEADER_SIZE: usize = 32;

/// Smallest well-formed message: header, word count and byte count
pub const MIN_MESSAGE_SIZE: usize = HEADER_SIZE + 1 + 2;

/// Direct-hosted SMB port
pub const SMB_PORT: u16 = 445;

/// Largest request frame used when the session did not negotiate one
pub const DEFAULT_MAX_XMIT: u32 = 16644;

/// Smallest request frame the engine will work with
pub const MIN_MAX_XMIT: u32 = 1024;

/// Reply ceiling used by the single-reply information queries
pub const CLI_BUFFER_SIZE: u32 = 0xffff;

/// Multiplex id reserved for unsolicited server messages
pub const RESERVED_MID: u16 = 0xffff;

/// Buffer-format tag preceding paths in legacy byte blocks
pub const BUFFER_FORMAT_ASCII: u8 = 4;

/// AndX command value meaning "nothing chained"
pub const NO_ANDX_COMMAND: u8 = 0xff;

/// Fixed-width shadow copy label, `@GMT-YYYY.MM.DD-HH.MM.SS` plus terminator
pub const SHADOW_COPY_LABEL_LEN: usize = 25;

/// "No change" value for uid/gid/mode in `SMB_SET_FILE_UNIX_BASIC`
pub const UNIX_NO_CHANGE: u32 = 0xffff_ffff;

/// Sentinel asking the server not to return an info level after a POSIX open
pub const NO_INFO_LEVEL_RETURNED: u16 = 0xffff;

/// FSCTL code for shadow copy enumeration
pub const FSCTL_GET_SHADOW_COPY_DATA: u32 = 0x0014_4064;

bitflags! {
    /// SMB header `flags`
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct HeaderFlags: u8 {
        const CASELESS_PATHNAMES = 0x08;
        const CANONICAL_PATHNAMES = 0x10;
        #[doc = "Set by the server on every reply"]
        const REPLY = 0x80;
    }
}

bitflags! {
    /// SMB header `flags2`
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct HeaderFlags2: u16 {
        const LONG_PATH_COMPONENTS = 0x0001;
        const EXTENDED_ATTRIBUTES = 0x0002;
        const IS_LONG_NAME = 0x0040;
        const DFS_PATHNAMES = 0x1000;
        const NT_STATUS = 0x4000;
        const UNICODE = 0x8000;
    }
}

enum_from_primitive! {
    #[doc = "SMB1 commands used by this client"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum SmbCommand {
        Mkdir           = 0x00,
        Rmdir           = 0x01,
        Close           = 0x04,
        Unlink          = 0x06,
        Rename          = 0x07,
        LockingX        = 0x24,
        Trans           = 0x25,
        TransSecondary  = 0x26,
        OpenX           = 0x2d,
        Trans2          = 0x32,
        Trans2Secondary = 0x33,
        DiskAttr        = 0x80,
        NtTrans         = 0xa0,
        NtTransSecondary = 0xa1,
        NtCreateX       = 0xa2,
        NtCancel        = 0xa4,
        NtRename        = 0xa5,
    }
}

enum_from_primitive! {
    #[doc = "TRANS2 sub-commands, carried in the single setup word"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum Trans2Sub {
        QueryFsInfo     = 0x03,
        QueryPathInfo   = 0x05,
        SetPathInfo     = 0x06,
        QueryFileInfo   = 0x07,
        SetFileInfo     = 0x08,
    }
}

enum_from_primitive! {
    #[doc = "NT_TRANSACT functions"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum NtTransFunction {
        Ioctl           = 0x02,
        NotifyChange    = 0x04,
    }
}

/// Information levels for the query/set information sub-commands.
pub mod level {
    pub const INFO_SET_EA: u16 = 0x0002;
    pub const INFO_QUERY_ALL_EAS: u16 = 0x0004;
    pub const QUERY_FILE_BASIC_INFO: u16 = 0x0101;
    pub const QUERY_FILE_UNIX_BASIC: u16 = 0x0200;
    pub const SET_FILE_UNIX_BASIC: u16 = 0x0200;
    pub const QUERY_FILE_UNIX_LINK: u16 = 0x0201;
    pub const SET_FILE_UNIX_LINK: u16 = 0x0201;
    pub const SET_FILE_UNIX_HLINK: u16 = 0x0203;
    pub const QUERY_POSIX_ACL: u16 = 0x0204;
    pub const POSIX_PATH_OPEN: u16 = 0x0209;
    pub const POSIX_PATH_UNLINK: u16 = 0x020a;
    pub const FS_FULL_SIZE_INFORMATION: u16 = 0x03ef;
}

bitflags! {
    /// DOS/NT file attributes
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct FileAttributes: u32 {
        const READONLY  = 0x0001;
        const HIDDEN    = 0x0002;
        const SYSTEM    = 0x0004;
        const VOLUME    = 0x0008;
        const DIRECTORY = 0x0010;
        const ARCHIVE   = 0x0020;
        const NORMAL    = 0x0080;
    }
}

impl FileAttributes {
    /// Search attributes matching everything but volume labels.
    pub fn search_all() -> FileAttributes {
        FileAttributes::SYSTEM | FileAttributes::HIDDEN | FileAttributes::DIRECTORY
    }
}

bitflags! {
    /// NT access mask
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct AccessMask: u32 {
        const READ_DATA         = 0x0000_0001;
        const WRITE_DATA        = 0x0000_0002;
        const APPEND_DATA       = 0x0000_0004;
        const READ_EA           = 0x0000_0008;
        const WRITE_EA          = 0x0000_0010;
        const EXECUTE           = 0x0000_0020;
        const READ_ATTRIBUTES   = 0x0000_0080;
        const WRITE_ATTRIBUTES  = 0x0000_0100;
        const DELETE            = 0x0001_0000;
        const READ_CONTROL      = 0x0002_0000;
        const SYNCHRONIZE       = 0x0010_0000;
        const GENERIC_ALL       = 0x1000_0000;
        const GENERIC_WRITE     = 0x4000_0000;
        const GENERIC_READ      = 0x8000_0000;
    }
}

impl AccessMask {
    /// Standard rights for reading data, attributes and EAs.
    pub fn generic_read_access() -> AccessMask {
        AccessMask::READ_CONTROL
            | AccessMask::READ_DATA
            | AccessMask::READ_ATTRIBUTES
            | AccessMask::READ_EA
            | AccessMask::SYNCHRONIZE
    }

    /// Standard rights for writing data, attributes and EAs.
    pub fn generic_write_access() -> AccessMask {
        AccessMask::READ_CONTROL
            | AccessMask::WRITE_DATA
            | AccessMask::WRITE_ATTRIBUTES
            | AccessMask::WRITE_EA
            | AccessMask::APPEND_DATA
            | AccessMask::SYNCHRONIZE
    }
}

bitflags! {
    /// NT share access
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ShareAccess: u32 {
        const READ      = 0x1;
        const WRITE     = 0x2;
        const DELETE    = 0x4;
    }
}

bitflags! {
    /// NT create options
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CreateOptions: u32 {
        const DIRECTORY_FILE        = 0x0000_0001;
        const WRITE_THROUGH         = 0x0000_0002;
        const NON_DIRECTORY_FILE    = 0x0000_0040;
        const DELETE_ON_CLOSE       = 0x0000_1000;
    }
}

enum_from_primitive! {
    #[doc = "NT create disposition"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum CreateDisposition {
        Supersede   = 0,
        Open        = 1,
        Create      = 2,
        OpenIf      = 3,
        Overwrite   = 4,
        OverwriteIf = 5,
    }
}

enum_from_primitive! {
    #[doc = "Legacy share (deny) modes used by the OpenX form"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum DenyMode {
        Dos     = 0,
        All     = 1,
        Write   = 2,
        Read    = 3,
        None    = 4,
        Fcb     = 7,
    }
}

impl DenyMode {
    /// Share access granting what the deny mode leaves open.
    pub fn share_access(self) -> ShareAccess {
        match self {
            DenyMode::All => ShareAccess::empty(),
            DenyMode::Write => ShareAccess::READ,
            DenyMode::Read => ShareAccess::WRITE,
            DenyMode::None | DenyMode::Dos | DenyMode::Fcb => ShareAccess::READ | ShareAccess::WRITE,
        }
    }
}

enum_from_primitive! {
    #[doc = "NTRENAME information level"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum NtRenameFlag {
        HardLink    = 0x0103,
        Rename      = 0x0104,
        Copy        = 0x0105,
    }
}

enum_from_primitive! {
    #[doc = "Byte-range lock request type"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LockType {
        Read    = 0,
        Write   = 1,
        Unlock  = 2,
    }
}

bitflags! {
    /// LOCKING_ANDX lock type byte
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct LockingAndXType: u8 {
        const SHARED_LOCK   = 0x01;
        const OPLOCK_RELEASE = 0x02;
        const CHANGE_LOCKTYPE = 0x04;
        const CANCEL_LOCK   = 0x08;
        const LARGE_FILES   = 0x10;
    }
}

/// How long a byte-range lock request may wait for a conflicting lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockWait {
    /// Fail at once on conflict.
    NoWait,
    /// Wait up to the given number of milliseconds.
    Millis(u32),
    /// Wait until the lock is granted.
    Forever,
}

impl LockWait {
    /// Timeout field of the wire request.
    pub fn wire(self) -> u32 {
        match self {
            LockWait::NoWait => 0,
            LockWait::Millis(ms) => ms.min(0xffff_fffe),
            LockWait::Forever => 0xffff_ffff,
        }
    }
}

bitflags! {
    /// Change notification completion filter
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct NotifyFilter: u32 {
        const FILE_NAME     = 0x0000_0001;
        const DIR_NAME      = 0x0000_0002;
        const ATTRIBUTES    = 0x0000_0004;
        const SIZE          = 0x0000_0008;
        const LAST_WRITE    = 0x0000_0010;
        const LAST_ACCESS   = 0x0000_0020;
        const CREATION      = 0x0000_0040;
        const EA            = 0x0000_0080;
        const SECURITY      = 0x0000_0100;
        const STREAM_NAME   = 0x0000_0200;
        const STREAM_SIZE   = 0x0000_0400;
        const STREAM_WRITE  = 0x0000_0800;
    }
}

enum_from_primitive! {
    #[doc = "Change notification action"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum NotifyAction {
        Added           = 1,
        Removed         = 2,
        Modified        = 3,
        RenamedOldName  = 4,
        RenamedNewName  = 5,
        AddedStream     = 6,
        RemovedStream   = 7,
        ModifiedStream  = 8,
    }
}

bitflags! {
    /// Permission bits as carried by the UNIX extensions
    ///
    /// # Protocol
    /// CIFS UNIX extensions
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct WirePerms: u32 {
        const X_OTH     = 0x0001;
        const W_OTH     = 0x0002;
        const R_OTH     = 0x0004;
        const X_GRP     = 0x0008;
        const W_GRP     = 0x0010;
        const R_GRP     = 0x0020;
        const X_USR     = 0x0040;
        const W_USR     = 0x0080;
        const R_USR     = 0x0100;
        const STICKY    = 0x0200;
        const SET_GID   = 0x0400;
        const SET_UID   = 0x0800;
    }
}

const PERM_BITS: [(WirePerms, Mode); 9] = [
    (WirePerms::X_OTH, Mode::S_IXOTH),
    (WirePerms::W_OTH, Mode::S_IWOTH),
    (WirePerms::R_OTH, Mode::S_IROTH),
    (WirePerms::X_GRP, Mode::S_IXGRP),
    (WirePerms::W_GRP, Mode::S_IWGRP),
    (WirePerms::R_GRP, Mode::S_IRGRP),
    (WirePerms::X_USR, Mode::S_IXUSR),
    (WirePerms::W_USR, Mode::S_IWUSR),
    (WirePerms::R_USR, Mode::S_IRUSR),
];

const SPECIAL_BITS: [(WirePerms, Mode); 3] = [
    (WirePerms::STICKY, Mode::S_ISVTX),
    (WirePerms::SET_GID, Mode::S_ISGID),
    (WirePerms::SET_UID, Mode::S_ISUID),
];

/// Map host permission bits to their wire form.
pub fn unix_perms_to_wire(mode: u32) -> WirePerms {
    let mode = Mode::from_bits_truncate(mode as nix::libc::mode_t);
    PERM_BITS
        .iter()
        .chain(SPECIAL_BITS.iter())
        .filter(|(_, host)| mode.contains(*host))
        .fold(WirePerms::empty(), |acc, (wire, _)| acc | *wire)
}

/// Map wire permission bits to host permission bits.
pub fn wire_perms_to_unix(perms: WirePerms) -> u32 {
    PERM_BITS
        .iter()
        .chain(SPECIAL_BITS.iter())
        .filter(|(wire, _)| perms.contains(*wire))
        .fold(Mode::empty(), |acc, (_, host)| acc | *host)
        .bits() as u32
}

enum_from_primitive! {
    #[doc = "File type as carried by the UNIX extensions"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum UnixFileType {
        File        = 0,
        Directory   = 1,
        Symlink     = 2,
        CharDevice  = 3,
        BlockDevice = 4,
        Fifo        = 5,
        Socket      = 6,
    }
}

impl UnixFileType {
    /// Host `S_IF*` bits for this type.
    pub fn mode_bits(self) -> u32 {
        let flag = match self {
            UnixFileType::File => SFlag::S_IFREG,
            UnixFileType::Directory => SFlag::S_IFDIR,
            UnixFileType::Symlink => SFlag::S_IFLNK,
            UnixFileType::CharDevice => SFlag::S_IFCHR,
            UnixFileType::BlockDevice => SFlag::S_IFBLK,
            UnixFileType::Fifo => SFlag::S_IFIFO,
            UnixFileType::Socket => SFlag::S_IFSOCK,
        };
        flag.bits() as u32
    }
}

bitflags! {
    /// Open flags for `SMB_POSIX_PATH_OPEN`
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct PosixOpenFlags: u32 {
        const RDONLY    = 0x0001;
        const WRONLY    = 0x0002;
        const RDWR      = 0x0004;
        const CREAT     = 0x0010;
        const EXCL      = 0x0020;
        const TRUNC     = 0x0040;
        const APPEND    = 0x0080;
        const SYNC      = 0x0100;
        const DIRECTORY = 0x0200;
        const NOFOLLOW  = 0x0400;
        const DIRECT    = 0x0800;
    }
}

/// Map host open flags to their POSIX-extension wire form.
pub fn open_flags_to_wire(flags: OFlag) -> PosixOpenFlags {
    let mut wire = match flags & OFlag::O_ACCMODE {
        f if f == OFlag::O_WRONLY => PosixOpenFlags::WRONLY,
        f if f == OFlag::O_RDWR => PosixOpenFlags::RDWR,
        _ => PosixOpenFlags::RDONLY,
    };

    let map = [
        (OFlag::O_CREAT, PosixOpenFlags::CREAT),
        (OFlag::O_EXCL, PosixOpenFlags::EXCL),
        (OFlag::O_TRUNC, PosixOpenFlags::TRUNC),
        (OFlag::O_APPEND, PosixOpenFlags::APPEND),
        (OFlag::O_SYNC, PosixOpenFlags::SYNC),
        (OFlag::O_DIRECTORY, PosixOpenFlags::DIRECTORY),
        (OFlag::O_NOFOLLOW, PosixOpenFlags::NOFOLLOW),
        #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
        (OFlag::O_DIRECT, PosixOpenFlags::DIRECT),
    ];
    for (host, bit) in map {
        if flags.contains(host) {
            wire.insert(bit);
        }
    }
    wire
}

enum_from_primitive! {
    #[doc = "POSIX_PATH_UNLINK target"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum PosixUnlinkTarget {
        File        = 0,
        Directory   = 1,
    }
}

/// Seconds between 1601-01-01 and 1970-01-01
const NT_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Time struct
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
    pub sec: i64,
    pub nsec: u32,
}

impl Time {
    /// Convert a 64-bit NT time (100ns ticks since 1601). Zero and all-ones
    /// mean "unset" and map to the Unix epoch.
    pub fn from_nt(nt: u64) -> Time {
        if nt == 0 || nt == u64::MAX {
            return Time::default();
        }
        Time {
            sec: (nt / 10_000_000) as i64 - NT_EPOCH_OFFSET,
            nsec: ((nt % 10_000_000) * 100) as u32,
        }
    }

    /// 64-bit NT time for this instant. Times before 1601 clamp to zero.
    pub fn to_nt(self) -> u64 {
        let ticks = (self.sec + NT_EPOCH_OFFSET).max(0) as u64;
        ticks * 10_000_000 + u64::from(self.nsec / 100)
    }
}

/// File attributes returned by `SMB_QUERY_FILE_UNIX_BASIC`, corresponding to
/// `struct stat`.
///
/// # Protocol
/// CIFS UNIX extensions
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PosixStat {
    /// Total size, in bytes
    pub size: u64,
    /// Number of 512B blocks allocated
    pub blocks: u64,
    /// Time of last status change
    pub ctime: Time,
    /// Time of last access
    pub atime: Time,
    /// Time of last modification
    pub mtime: Time,
    /// User ID of owner
    pub uid: u32,
    /// Group ID of owner
    pub gid: u32,
    /// File type and permission bits
    pub mode: u32,
    pub dev_major: u32,
    pub dev_minor: u32,
    /// Inode number
    pub ino: u64,
    /// Number of hard links
    pub nlink: u32,
}

impl PosixStat {
    /// Device ID (if special file)
    pub fn rdev(&self) -> u64 {
        nix::sys::stat::makedev(u64::from(self.dev_major), u64::from(self.dev_minor)) as u64
    }
}

/// Result of an NT create.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateResult {
    pub fnum: u16,
    pub oplock_level: u8,
    pub create_action: u32,
    pub create_time: Time,
    pub access_time: Time,
    pub write_time: Time,
    pub change_time: Time,
    pub attributes: FileAttributes,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub is_directory: bool,
}

/// `FILE_BASIC_INFO`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicInfo {
    pub create_time: Time,
    pub access_time: Time,
    pub write_time: Time,
    pub change_time: Time,
    pub attributes: FileAttributes,
}

/// One extended attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EaEntry {
    pub flags: u8,
    pub name: String,
    pub value: Vec<u8>,
}

/// One change reported by a change notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifyChange {
    /// Raw action code; see [`NotifyChange::kind`].
    pub action: u32,
    pub name: String,
}

impl NotifyChange {
    pub fn kind(&self) -> Option<NotifyAction> {
        NotifyAction::from_u32(self.action)
    }
}

/// Shadow copy enumeration result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShadowCopyData {
    /// Number of shadow copies the server reports.
    pub count: u32,
    /// Labels, only filled when names were requested.
    pub names: Vec<String>,
}

/// Disk usage in allocation units.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskSize {
    /// Bytes per allocation unit
    pub block_size: u64,
    pub total: u64,
    pub avail: u64,
}

bitflags! {
    /// POSIX ACL permission bits
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct AclPerms: u8 {
        const EXECUTE   = 0x01;
        const WRITE     = 0x02;
        const READ      = 0x04;
    }
}

enum_from_primitive! {
    #[doc = "POSIX ACL entry tag"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum AclTag {
        UserObj     = 0x01,
        User        = 0x02,
        GroupObj    = 0x04,
        Group       = 0x08,
        Mask        = 0x10,
        Other       = 0x20,
    }
}

/// One POSIX ACL entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AclEntry {
    pub tag: AclTag,
    pub perms: AclPerms,
    /// uid or gid for `User`/`Group`, `None` otherwise
    pub id: Option<u32>,
}

/// Access and default ACLs of one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PosixAcl {
    pub access: Vec<AclEntry>,
    pub default: Vec<AclEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_permission_combination_round_trips() {
        for mode in 0..0o10000u32 {
            assert_eq!(wire_perms_to_unix(unix_perms_to_wire(mode)), mode);
        }
    }

    #[test]
    fn special_bits_do_not_disturb_rwx() {
        assert_eq!(unix_perms_to_wire(0o755).bits(), 0x1ed);
        assert_eq!(unix_perms_to_wire(0o4755).bits(), 0x9ed);
        assert_eq!(unix_perms_to_wire(0o1777), WirePerms::all() - WirePerms::SET_GID - WirePerms::SET_UID);
        assert_eq!(wire_perms_to_unix(WirePerms::R_USR | WirePerms::W_USR), 0o600);
    }

    #[test]
    fn file_type_bits() {
        assert_eq!(UnixFileType::Directory.mode_bits(), SFlag::S_IFDIR.bits() as u32);
        assert_eq!(UnixFileType::from_u32(2), Some(UnixFileType::Symlink));
        assert_eq!(UnixFileType::from_u32(7), None);
    }

    #[test]
    fn open_flags() {
        assert_eq!(open_flags_to_wire(OFlag::O_RDONLY), PosixOpenFlags::RDONLY);
        assert_eq!(
            open_flags_to_wire(OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL),
            PosixOpenFlags::RDWR | PosixOpenFlags::CREAT | PosixOpenFlags::EXCL
        );
        assert_eq!(
            open_flags_to_wire(OFlag::O_WRONLY | OFlag::O_TRUNC | OFlag::O_APPEND),
            PosixOpenFlags::WRONLY | PosixOpenFlags::TRUNC | PosixOpenFlags::APPEND
        );
    }

    #[test]
    fn nt_time_conversion() {
        // 2001-09-09T01:46:40Z
        let t = Time {
            sec: 1_000_000_000,
            nsec: 500,
        };
        assert_eq!(Time::from_nt(t.to_nt()), t);
        assert_eq!(Time::from_nt(116_444_736_000_000_000), Time { sec: 0, nsec: 0 });
        assert_eq!(Time::from_nt(0), Time::default());
    }

    #[test]
    fn lock_wait_timeout_field() {
        assert_eq!(LockWait::NoWait.wire(), 0);
        assert_eq!(LockWait::Millis(2500).wire(), 2500);
        assert_eq!(LockWait::Forever.wire(), 0xffff_ffff);
    }

    #[test]
    fn deny_modes_to_share_access() {
        assert_eq!(DenyMode::All.share_access(), ShareAccess::empty());
        assert_eq!(DenyMode::Write.share_access(), ShareAccess::READ);
        assert_eq!(DenyMode::None.share_access(), ShareAccess::READ | ShareAccess::WRITE);
    }
}
