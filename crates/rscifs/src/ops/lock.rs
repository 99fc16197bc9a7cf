//! Byte-range locks through `SMBlockingX`.
//!
//! The 64-bit forms are only sent on sessions that negotiated large files.
//! Elsewhere they fall back to the 32-bit forms, keeping the low 32 bits of
//! offset and length.

use {
    crate::{
        buffer::WireBuffer,
        engine::Session,
        error::Error,
        proto::*,
        res,
        trans::Envelope,
        utils::Result,
    },
    log::debug,
};

fn locking_andx(
    fnum: u16,
    lock_type: LockingAndXType,
    wait: LockWait,
    unlocks: u16,
    locks: u16,
    ranges: WireBuffer,
) -> Envelope {
    let mut words = WireBuffer::with_capacity(16);
    words.push_u8(NO_ANDX_COMMAND);
    words.push_u8(0);
    words.push_u16_le(0);
    words.push_u16_le(fnum);
    words.push_u8(lock_type.bits());
    words.push_u8(0);
    words.push_u32_le(wait.wire());
    words.push_u16_le(unlocks);
    words.push_u16_le(locks);
    Envelope::plain(SmbCommand::LockingX, words, ranges)
}

fn lock_type_bits(lock_type: LockType) -> Result<LockingAndXType> {
    match lock_type {
        LockType::Read => Ok(LockingAndXType::SHARED_LOCK),
        LockType::Write => Ok(LockingAndXType::empty()),
        LockType::Unlock => res!(Error::InvalidParameter),
    }
}

fn range32(pid: u16, offset: u32, len: u32) -> WireBuffer {
    let mut range = WireBuffer::with_capacity(10);
    range.push_u16_le(pid);
    range.push_u32_le(offset);
    range.push_u32_le(len);
    range
}

fn range64(pid: u16, offset: u64, len: u64) -> WireBuffer {
    let mut range = WireBuffer::with_capacity(20);
    range.push_u16_le(pid);
    range.push_u16_le(0);
    range.push_u32_le((offset >> 32) as u32);
    range.push_u32_le(offset as u32);
    range.push_u32_le((len >> 32) as u32);
    range.push_u32_le(len as u32);
    range
}

pub fn build_lock(
    fnum: u16,
    pid: u16,
    offset: u32,
    len: u32,
    wait: LockWait,
    lock_type: LockType,
) -> Result<Envelope> {
    let bits = lock_type_bits(lock_type)?;
    Ok(locking_andx(fnum, bits, wait, 0, 1, range32(pid, offset, len)))
}

pub fn build_lock64(
    fnum: u16,
    pid: u16,
    offset: u64,
    len: u64,
    wait: LockWait,
    lock_type: LockType,
) -> Result<Envelope> {
    let bits = lock_type_bits(lock_type)? | LockingAndXType::LARGE_FILES;
    Ok(locking_andx(fnum, bits, wait, 0, 1, range64(pid, offset, len)))
}

pub fn build_unlock(fnum: u16, pid: u16, offset: u32, len: u32) -> Envelope {
    locking_andx(
        fnum,
        LockingAndXType::empty(),
        LockWait::NoWait,
        1,
        0,
        range32(pid, offset, len),
    )
}

pub fn build_unlock64(fnum: u16, pid: u16, offset: u64, len: u64) -> Envelope {
    locking_andx(
        fnum,
        LockingAndXType::LARGE_FILES,
        LockWait::NoWait,
        1,
        0,
        range64(pid, offset, len),
    )
}

impl Session {
    fn lock_pid(&self) -> u16 {
        self.config().pid as u16
    }

    /// Lock `len` bytes at `offset`. [`LockType::Unlock`] is rejected with
    /// [`Error::InvalidParameter`]; use [`Session::unlock`].
    pub async fn lock(
        &self,
        fnum: u16,
        offset: u32,
        len: u32,
        wait: LockWait,
        lock_type: LockType,
    ) -> Result<()> {
        let envelope = build_lock(fnum, self.lock_pid(), offset, len, wait, lock_type)?;
        self.transact(envelope).await?;
        Ok(())
    }

    pub async fn unlock(&self, fnum: u16, offset: u32, len: u32) -> Result<()> {
        self.transact(build_unlock(fnum, self.lock_pid(), offset, len))
            .await?;
        Ok(())
    }

    pub async fn lock64(
        &self,
        fnum: u16,
        offset: u64,
        len: u64,
        wait: LockWait,
        lock_type: LockType,
    ) -> Result<()> {
        if !self.large_files() {
            debug!("No large file support, locking {:#x}+{:#x} as 32-bit", offset, len);
            return self
                .lock(fnum, offset as u32, len as u32, wait, lock_type)
                .await;
        }
        let envelope = build_lock64(fnum, self.lock_pid(), offset, len, wait, lock_type)?;
        self.transact(envelope).await?;
        Ok(())
    }

    pub async fn unlock64(&self, fnum: u16, offset: u64, len: u64) -> Result<()> {
        if !self.large_files() {
            return self.unlock(fnum, offset as u32, len as u32).await;
        }
        self.transact(build_unlock64(fnum, self.lock_pid(), offset, len))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock32_layout() {
        let envelope = build_lock(3, 0x99, 100, 10, LockWait::Millis(500), LockType::Read).unwrap();
        let w = &envelope.params;
        assert_eq!(w.len(), 16);
        assert_eq!(w.read_u8(0).unwrap(), NO_ANDX_COMMAND);
        assert_eq!(w.read_u16_le(4).unwrap(), 3);
        assert_eq!(w.read_u8(6).unwrap(), LockingAndXType::SHARED_LOCK.bits());
        assert_eq!(w.read_u32_le(8).unwrap(), 500);
        assert_eq!(w.read_u16_le(12).unwrap(), 0);
        assert_eq!(w.read_u16_le(14).unwrap(), 1);
        assert_eq!(
            envelope.data.as_slice(),
            &[0x99, 0, 100, 0, 0, 0, 10, 0, 0, 0]
        );
    }

    #[test]
    fn lock64_splits_halves_high_first() {
        let envelope = build_lock64(
            3,
            1,
            0x0000_0001_0000_0010,
            0x20,
            LockWait::Forever,
            LockType::Write,
        )
        .unwrap();
        assert_eq!(envelope.params.read_u8(6).unwrap(), 0x10);
        assert_eq!(envelope.params.read_u32_le(8).unwrap(), u32::MAX);
        let d = &envelope.data;
        assert_eq!(d.len(), 20);
        assert_eq!(d.read_u32_le(4).unwrap(), 1);
        assert_eq!(d.read_u32_le(8).unwrap(), 0x10);
        assert_eq!(d.read_u32_le(12).unwrap(), 0);
        assert_eq!(d.read_u32_le(16).unwrap(), 0x20);
    }

    #[test]
    fn unlock_counts_one_unlock() {
        let envelope = build_unlock(3, 1, 0, 5);
        assert_eq!(envelope.params.read_u16_le(12).unwrap(), 1);
        assert_eq!(envelope.params.read_u16_le(14).unwrap(), 0);
        assert_eq!(envelope.params.read_u32_le(8).unwrap(), 0);

        let envelope = build_unlock64(3, 1, 0, 5);
        assert_eq!(envelope.params.read_u8(6).unwrap(), 0x10);
        assert_eq!(envelope.data.len(), 20);
    }

    #[test]
    fn unlock_is_not_a_lock_type() {
        assert_eq!(
            build_lock(1, 1, 0, 1, LockWait::NoWait, LockType::Unlock).err(),
            Some(Error::InvalidParameter)
        );
        assert_eq!(
            build_lock64(1, 1, 0, 1, LockWait::NoWait, LockType::Unlock).err(),
            Some(Error::InvalidParameter)
        );
    }
}
