//! CIFS UNIX extension calls.
//!
//! Everything here multiplexes through the TRANS2 query/set information
//! sub-commands, selected by a UNIX information level.
//!
//! # Protocol
//! CIFS UNIX extensions

use {
    crate::{
        buffer::{Charset, WireBuffer},
        engine::Session,
        error::Error,
        proto::*,
        res,
        trans::{Envelope, EnvelopeReply},
        utils::Result,
    },
    nix::fcntl::OFlag,
    num_traits::FromPrimitive,
};

/// Size of the `SMB_QUERY_FILE_UNIX_BASIC` block.
pub const UNIX_BASIC_SIZE: usize = 100;

/// Size of the `SMB_POSIX_PATH_OPEN` request block.
pub const POSIX_OPEN_SIZE: usize = 18;

/// Size of the `SMB_POSIX_PATH_OPEN` reply block when no info level is returned.
pub const POSIX_OPEN_REPLY_SIZE: u32 = 12;

const ACL_VERSION: u16 = 1;
const ACL_HEADER_SIZE: usize = 6;
const ACL_ENTRY_SIZE: usize = 10;

/// Decode an `SMB_QUERY_FILE_UNIX_BASIC` block. A file type with no host
/// equivalent is a [`Error::DataError`].
pub fn parse_posix_stat(data: &WireBuffer) -> Result<PosixStat> {
    if data.len() < UNIX_BASIC_SIZE {
        return res!(Error::DataError);
    }

    let file_type = UnixFileType::from_u32(data.read_u32_le(56)?)
        .map(UnixFileType::mode_bits)
        .ok_or(Error::DataError)?;
    let perms = WirePerms::from_bits_truncate(data.read_u32_le(84)?);

    Ok(PosixStat {
        size: data.read_u32_pair_le(0)?,
        blocks: data.read_u32_pair_le(8)? / 512,
        ctime: Time::from_nt(data.read_u64_le(16)?),
        atime: Time::from_nt(data.read_u64_le(24)?),
        mtime: Time::from_nt(data.read_u64_le(32)?),
        uid: data.read_u32_le(40)?,
        gid: data.read_u32_le(48)?,
        mode: file_type | wire_perms_to_unix(perms),
        dev_major: data.read_u32_le(60)?,
        dev_minor: data.read_u32_le(68)?,
        ino: data.read_u32_pair_le(76)?,
        nlink: data.read_u32_le(92)?,
    })
}

/// `SMB_SET_FILE_UNIX_BASIC` block changing only owner, group and mode.
///
/// Sizes and times are left as "no change"; pass [`UNIX_NO_CHANGE`] for any
/// of `uid`, `gid` or `wire_mode` that should stay as it is.
pub fn build_unix_basic_set(uid: u32, gid: u32, wire_mode: u32) -> Result<WireBuffer> {
    let mut data = WireBuffer::with_capacity(UNIX_BASIC_SIZE);
    data.push_fill(0xff, 40);
    data.push_fill(0, UNIX_BASIC_SIZE - 40);
    data.patch_u32_le(40, uid)?;
    data.patch_u32_le(48, gid)?;
    data.patch_u32_le(84, wire_mode)?;
    Ok(data)
}

pub fn build_posix_open(
    charset: Charset,
    path: &str,
    flags: PosixOpenFlags,
    mode: u32,
) -> Result<Envelope> {
    let mut data = WireBuffer::with_capacity(POSIX_OPEN_SIZE);
    data.push_u32_le(0);
    data.push_u32_le(flags.bits());
    data.push_u32_le(unix_perms_to_wire(mode).bits());
    data.push_u32_le(0);
    data.push_u16_le(NO_INFO_LEVEL_RETURNED);

    let envelope = super::build_set_path_info(charset, path, level::POSIX_PATH_OPEN, data)?;
    Ok(envelope.data_limits(POSIX_OPEN_REPLY_SIZE, POSIX_OPEN_REPLY_SIZE))
}

pub fn parse_posix_open(reply: &EnvelopeReply) -> Result<u16> {
    reply.data.read_u16_le(2)
}

pub fn build_posix_unlink(charset: Charset, path: &str, target: PosixUnlinkTarget) -> Result<Envelope> {
    let mut data = WireBuffer::with_capacity(2);
    data.push_u16_le(target as u16);
    super::build_set_path_info(charset, path, level::POSIX_PATH_UNLINK, data)
}

/// Link creation: `link` names the new entry, `target` what it points at.
pub fn build_posix_link(charset: Charset, target: &str, link: &str, hard: bool) -> Result<Envelope> {
    let mut data = WireBuffer::new();
    data.push_string(charset, target, true, false)?;
    let level = if hard {
        level::SET_FILE_UNIX_HLINK
    } else {
        level::SET_FILE_UNIX_LINK
    };
    super::build_set_path_info(charset, link, level, data)
}

/// Decode a symlink target. The block must end in a terminator.
pub fn parse_readlink(reply: &EnvelopeReply) -> Result<String> {
    let data = reply.data.as_slice();
    match data.last() {
        Some(0) => {}
        _ => return res!(Error::DataError),
    }
    reply.data.read_string(reply.charset(), 0, data.len())
}

fn parse_acl_entries(data: &WireBuffer, mut offset: usize, count: usize) -> Result<Vec<AclEntry>> {
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = AclTag::from_u8(data.read_u8(offset)?).ok_or(Error::InvalidNetworkResponse)?;
        let perms = AclPerms::from_bits_truncate(data.read_u8(offset + 1)?);
        let id = match tag {
            AclTag::User | AclTag::Group => Some(data.read_u32_le(offset + 2)?),
            _ => None,
        };
        entries.push(AclEntry { tag, perms, id });
        offset += ACL_ENTRY_SIZE;
    }
    Ok(entries)
}

/// Decode an `SMB_QUERY_POSIX_ACL` blob.
pub fn parse_posix_acl(data: &WireBuffer) -> Result<PosixAcl> {
    if data.len() < ACL_HEADER_SIZE {
        return res!(Error::DataError);
    }
    if data.read_u16_le(0)? != ACL_VERSION {
        return res!(Error::InvalidNetworkResponse);
    }
    let n_access = usize::from(data.read_u16_le(2)?);
    let n_default = usize::from(data.read_u16_le(4)?);
    if data.len() < ACL_HEADER_SIZE + (n_access + n_default) * ACL_ENTRY_SIZE {
        return res!(Error::InvalidNetworkResponse);
    }

    let access = parse_acl_entries(data, ACL_HEADER_SIZE, n_access)?;
    let default = parse_acl_entries(
        data,
        ACL_HEADER_SIZE + n_access * ACL_ENTRY_SIZE,
        n_default,
    )?;
    Ok(PosixAcl { access, default })
}

impl Session {
    pub async fn posix_stat(&self, path: &str) -> Result<PosixStat> {
        let reply = self
            .query_path_info(path, level::QUERY_FILE_UNIX_BASIC, UNIX_BASIC_SIZE as u32)
            .await?;
        parse_posix_stat(&reply.data)
    }

    pub async fn posix_fstat(&self, fnum: u16) -> Result<PosixStat> {
        let reply = self
            .query_file_info(fnum, level::QUERY_FILE_UNIX_BASIC, UNIX_BASIC_SIZE as u32)
            .await?;
        parse_posix_stat(&reply.data)
    }

    /// Set the permission bits of `path`; file type bits in `mode` are ignored.
    pub async fn posix_chmod(&self, path: &str, mode: u32) -> Result<()> {
        let wire_mode = unix_perms_to_wire(mode).bits();
        let data = build_unix_basic_set(UNIX_NO_CHANGE, UNIX_NO_CHANGE, wire_mode)?;
        self.set_path_info(path, level::SET_FILE_UNIX_BASIC, data)
            .await?;
        Ok(())
    }

    pub async fn posix_chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        let data = build_unix_basic_set(uid, gid, UNIX_NO_CHANGE)?;
        self.set_path_info(path, level::SET_FILE_UNIX_BASIC, data)
            .await?;
        Ok(())
    }

    /// Open `path` with POSIX semantics and return its file handle.
    pub async fn posix_open(&self, path: &str, flags: OFlag, mode: u32) -> Result<u16> {
        let wire = open_flags_to_wire(flags);
        let reply = self
            .transact(build_posix_open(self.charset(), path, wire, mode)?)
            .await?;
        parse_posix_open(&reply)
    }

    pub async fn posix_mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let flags = PosixOpenFlags::CREAT | PosixOpenFlags::DIRECTORY;
        self.transact(build_posix_open(self.charset(), path, flags, mode)?)
            .await?;
        Ok(())
    }

    pub async fn posix_unlink(&self, path: &str) -> Result<()> {
        let envelope = build_posix_unlink(self.charset(), path, PosixUnlinkTarget::File)?;
        self.transact(envelope).await?;
        Ok(())
    }

    pub async fn posix_rmdir(&self, path: &str) -> Result<()> {
        let envelope = build_posix_unlink(self.charset(), path, PosixUnlinkTarget::Directory)?;
        self.transact(envelope).await?;
        Ok(())
    }

    /// Create `link` as a symbolic link to `target`.
    pub async fn posix_symlink(&self, target: &str, link: &str) -> Result<()> {
        self.transact(build_posix_link(self.charset(), target, link, false)?)
            .await?;
        Ok(())
    }

    /// Create `link` as another name for `target`.
    pub async fn posix_hardlink(&self, target: &str, link: &str) -> Result<()> {
        self.transact(build_posix_link(self.charset(), target, link, true)?)
            .await?;
        Ok(())
    }

    pub async fn posix_readlink(&self, path: &str) -> Result<String> {
        let reply = self
            .query_path_info(path, level::QUERY_FILE_UNIX_LINK, 0)
            .await?;
        parse_readlink(&reply)
    }

    pub async fn posix_getfacl(&self, path: &str) -> Result<PosixAcl> {
        let reply = self
            .query_path_info(path, level::QUERY_POSIX_ACL, ACL_HEADER_SIZE as u32)
            .await?;
        parse_posix_acl(&reply.data)
    }
}
