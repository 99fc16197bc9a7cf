//! Opening, closing and removing files.
//!
//! [`Session::open`] first tries the legacy `SMBopenX` form. Servers that
//! reject it with `NT_STATUS_NOT_SUPPORTED` get a second request in the
//! `SMBntcreateX` form built from the same open flags; the caller sees one
//! file handle either way.

use {
    crate::{
        buffer::{Charset, WireBuffer},
        engine::{PendingRequest, Session, WeakSession},
        error::Error,
        proto::*,
        trans::{Envelope, EnvelopeReply},
        utils::Result,
    },
    log::{debug, warn},
    nix::fcntl::OFlag,
};

/// Create parameters of an `SMBntcreateX` request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CreateParams {
    pub create_flags: u32,
    pub access: AccessMask,
    pub attributes: FileAttributes,
    pub share: ShareAccess,
    pub disposition: CreateDisposition,
    pub options: CreateOptions,
}

impl CreateParams {
    /// Translate POSIX open flags and a legacy deny mode.
    pub fn from_open_flags(flags: OFlag, deny: DenyMode) -> CreateParams {
        let access = match flags & OFlag::O_ACCMODE {
            f if f == OFlag::O_WRONLY => AccessMask::generic_write_access(),
            f if f == OFlag::O_RDWR => {
                AccessMask::generic_read_access() | AccessMask::generic_write_access()
            }
            _ => AccessMask::generic_read_access(),
        };

        let creat = flags.contains(OFlag::O_CREAT);
        let disposition = if creat && flags.contains(OFlag::O_EXCL) {
            CreateDisposition::Create
        } else if creat && flags.contains(OFlag::O_TRUNC) {
            CreateDisposition::OverwriteIf
        } else if creat {
            CreateDisposition::OpenIf
        } else if flags.contains(OFlag::O_TRUNC) {
            CreateDisposition::Overwrite
        } else {
            CreateDisposition::Open
        };

        let mut options = CreateOptions::empty();
        if flags.contains(OFlag::O_SYNC) {
            options |= CreateOptions::WRITE_THROUGH;
        }

        CreateParams {
            create_flags: 0,
            access,
            attributes: FileAttributes::NORMAL,
            share: deny.share_access(),
            disposition,
            options,
        }
    }
}

/// `SMBopenX`
pub fn build_openx(charset: Charset, path: &str, flags: OFlag, deny: DenyMode) -> Result<Envelope> {
    let mut access_mode: u16 = match flags & OFlag::O_ACCMODE {
        f if f == OFlag::O_WRONLY => 1,
        f if f == OFlag::O_RDWR => 2,
        _ => 0,
    };
    access_mode |= (deny as u16) << 4;
    if flags.contains(OFlag::O_SYNC) {
        access_mode |= 1 << 14;
    }

    let mut open_func: u16 = 0;
    if flags.contains(OFlag::O_CREAT) {
        open_func |= 1 << 4;
    }
    if !flags.contains(OFlag::O_EXCL) {
        open_func |= if flags.contains(OFlag::O_TRUNC) { 1 << 1 } else { 1 };
    }

    let mut words = WireBuffer::with_capacity(30);
    words.push_u8(NO_ANDX_COMMAND);
    words.push_u8(0);
    words.push_u16_le(0);
    words.push_u16_le(0);
    words.push_u16_le(access_mode);
    words.push_u16_le((FileAttributes::SYSTEM | FileAttributes::HIDDEN).bits() as u16);
    words.push_u16_le(0);
    words.push_u32_le(0);
    words.push_u16_le(open_func);
    words.push_u32_le(0);
    words.push_u32_le(0);
    words.push_u32_le(0);

    let mut bytes = WireBuffer::new();
    bytes.push_string(charset, path, true, true)?;

    Ok(Envelope::plain(SmbCommand::OpenX, words, bytes).param_limits(6, 0x1fe))
}

pub fn parse_openx(reply: &EnvelopeReply) -> Result<u16> {
    reply.params.read_u16_le(4)
}

/// `SMBntcreateX`
pub fn build_nt_create(charset: Charset, path: &str, params: &CreateParams) -> Result<Envelope> {
    let mut bytes = WireBuffer::new();
    let name_len = bytes.push_string(charset, path, true, true)?;
    // The name is followed by an empty string
    bytes.push_string(charset, "", true, false)?;
    let name_len = u16::try_from(name_len).map_err(|_| Error::InvalidParameter)?;

    let mut words = WireBuffer::with_capacity(48);
    words.push_u8(NO_ANDX_COMMAND);
    words.push_u8(0);
    words.push_u16_le(0);
    words.push_u8(0);
    words.push_u16_le(name_len);
    words.push_u32_le(params.create_flags);
    words.push_u32_le(0);
    words.push_u32_le(params.access.bits());
    words.push_u64_le(0);
    words.push_u32_le(params.attributes.bits());
    words.push_u32_le(params.share.bits());
    words.push_u32_le(params.disposition as u32);
    words.push_u32_le(params.options.bits());
    words.push_u32_le(2);
    words.push_u8(0);

    Ok(Envelope::plain(SmbCommand::NtCreateX, words, bytes).param_limits(68, 0x1fe))
}

pub fn parse_nt_create(reply: &EnvelopeReply) -> Result<CreateResult> {
    let w = &reply.params;
    Ok(CreateResult {
        oplock_level: w.read_u8(4)?,
        fnum: w.read_u16_le(5)?,
        create_action: w.read_u32_le(7)?,
        create_time: Time::from_nt(w.read_u64_le(11)?),
        access_time: Time::from_nt(w.read_u64_le(19)?),
        write_time: Time::from_nt(w.read_u64_le(27)?),
        change_time: Time::from_nt(w.read_u64_le(35)?),
        attributes: FileAttributes::from_bits_retain(w.read_u32_le(43)?),
        allocation_size: w.read_u64_le(47)?,
        end_of_file: w.read_u64_le(55)?,
        is_directory: w.read_u8(67)? != 0,
    })
}

/// `SMBclose`
pub fn build_close(fnum: u16) -> Envelope {
    let mut words = WireBuffer::new();
    words.push_u16_le(fnum);
    words.push_u32_le(u32::MAX);
    Envelope::plain(SmbCommand::Close, words, WireBuffer::new())
}

/// `SMBunlink`
pub fn build_unlink(charset: Charset, path: &str, attrs: FileAttributes) -> Result<Envelope> {
    let mut words = WireBuffer::new();
    words.push_u16_le(attrs.bits() as u16);
    let mut bytes = WireBuffer::new();
    bytes.push_path(charset, path)?;
    Ok(Envelope::plain(SmbCommand::Unlink, words, bytes))
}

/// `SMBmkdir` or `SMBrmdir`
pub fn build_dir_command(charset: Charset, command: SmbCommand, path: &str) -> Result<Envelope> {
    let mut bytes = WireBuffer::new();
    bytes.push_path(charset, path)?;
    Ok(Envelope::plain(command, WireBuffer::new(), bytes))
}

/// An open in flight. The legacy request is already on the wire; collecting
/// may submit the fallback.
pub struct OpenRequest {
    session: WeakSession,
    path: String,
    flags: OFlag,
    deny: DenyMode,
    pending: PendingRequest,
}

impl OpenRequest {
    /// The file handle, from whichever wire form the server accepted.
    pub async fn collect(self) -> Result<u16> {
        match self.pending.collect().await {
            Err(Error::NotSupported) => {
                warn!("OpenX rejected for {:?}, retrying as NTCreateX", self.path);
                let params = CreateParams::from_open_flags(self.flags, self.deny);
                let session = self.session.upgrade()?;
                let created = session.nt_create(&self.path, &params).await?;
                Ok(created.fnum)
            }
            reply => parse_openx(&reply?),
        }
    }
}

impl Session {
    /// Submit the legacy open.
    pub async fn open_send(&self, path: &str, flags: OFlag, deny: DenyMode) -> Result<OpenRequest> {
        let pending = self
            .submit(build_openx(self.charset(), path, flags, deny)?)
            .await?;
        Ok(OpenRequest {
            session: self.downgrade(),
            path: path.to_owned(),
            flags,
            deny,
            pending,
        })
    }

    /// Open `path` and return its file handle.
    pub async fn open(&self, path: &str, flags: OFlag, deny: DenyMode) -> Result<u16> {
        self.open_send(path, flags, deny).await?.collect().await
    }

    pub async fn nt_create(&self, path: &str, params: &CreateParams) -> Result<CreateResult> {
        let reply = self
            .transact(build_nt_create(self.charset(), path, params)?)
            .await?;
        let created = parse_nt_create(&reply)?;
        debug!("{:?}: fnum {} action {}", path, created.fnum, created.create_action);
        Ok(created)
    }

    pub async fn close(&self, fnum: u16) -> Result<()> {
        self.transact(build_close(fnum)).await?;
        Ok(())
    }

    pub async fn unlink(&self, path: &str, attrs: FileAttributes) -> Result<()> {
        self.transact(build_unlink(self.charset(), path, attrs)?)
            .await?;
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let envelope = build_dir_command(self.charset(), SmbCommand::Mkdir, path)?;
        self.transact(envelope).await?;
        Ok(())
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let envelope = build_dir_command(self.charset(), SmbCommand::Rmdir, path)?;
        self.transact(envelope).await?;
        Ok(())
    }
}
