//! Rename, NT rename and NT hard link.

use crate::{
    buffer::{Charset, WireBuffer},
    engine::Session,
    proto::*,
    trans::Envelope,
    utils::Result,
};

fn path_pair(charset: Charset, src: &str, dst: &str) -> Result<WireBuffer> {
    let mut bytes = WireBuffer::new();
    bytes.push_path(charset, src)?;
    bytes.push_path(charset, dst)?;
    Ok(bytes)
}

/// `SMBmv`
pub fn build_rename(charset: Charset, src: &str, dst: &str) -> Result<Envelope> {
    let mut words = WireBuffer::new();
    words.push_u16_le(FileAttributes::search_all().bits() as u16);
    Ok(Envelope::plain(
        SmbCommand::Rename,
        words,
        path_pair(charset, src, dst)?,
    ))
}

/// `SMBntrename`; `flag` picks between rename, hard link and copy.
pub fn build_nt_rename(
    charset: Charset,
    src: &str,
    dst: &str,
    flag: NtRenameFlag,
) -> Result<Envelope> {
    let mut words = WireBuffer::new();
    words.push_u16_le(FileAttributes::search_all().bits() as u16);
    words.push_u16_le(flag as u16);
    words.push_u32_le(0);
    Ok(Envelope::plain(
        SmbCommand::NtRename,
        words,
        path_pair(charset, src, dst)?,
    ))
}

impl Session {
    pub async fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.transact(build_rename(self.charset(), src, dst)?).await?;
        Ok(())
    }

    pub async fn nt_rename(&self, src: &str, dst: &str) -> Result<()> {
        let envelope = build_nt_rename(self.charset(), src, dst, NtRenameFlag::Rename)?;
        self.transact(envelope).await?;
        Ok(())
    }

    /// Create `dst` as another name for `src`.
    pub async fn nt_hardlink(&self, src: &str, dst: &str) -> Result<()> {
        let envelope = build_nt_rename(self.charset(), src, dst, NtRenameFlag::HardLink)?;
        self.transact(envelope).await?;
        Ok(())
    }
}
