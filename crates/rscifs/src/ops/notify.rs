//! Directory change notification.
//!
//! A notify request stays outstanding until something changes under the
//! watched directory, so it is usually submitted with
//! [`Session::notify_send`] and collected later.

use {
    crate::{
        buffer::{Charset, WireBuffer},
        engine::{PendingRequest, Session},
        error::Error,
        proto::*,
        res,
        trans::Envelope,
        utils::Result,
    },
    log::debug,
};

/// `next`, `action`, `name_len`
const ENTRY_HEADER_SIZE: usize = 12;

pub fn build_notify(fnum: u16, buffer_size: u32, filter: NotifyFilter, recursive: bool) -> Envelope {
    let filter = filter.bits();
    Envelope::nt_trans(NtTransFunction::NotifyChange)
        .setup(&[
            filter as u16,
            (filter >> 16) as u16,
            fnum,
            u16::from(recursive),
        ])
        .param_limits(0, buffer_size)
        .data_limits(0, 0)
}

/// Decode a notify reply.
///
/// Entries chain through their `next` field, zero marking the last one. An
/// entry whose name runs past its successor or past the block, or whose
/// `next` leaves the block, fails the whole reply.
pub fn parse_notify(params: &WireBuffer) -> Result<Vec<NotifyChange>> {
    let mut changes = Vec::new();
    if params.is_empty() {
        return Ok(changes);
    }

    let mut offset = 0;
    loop {
        if params.len() - offset < ENTRY_HEADER_SIZE {
            return res!(Error::InvalidNetworkResponse);
        }
        let next = params.read_u32_le(offset)? as usize;
        let action = params.read_u32_le(offset + 4)?;
        let name_len = params.read_u32_le(offset + 8)? as usize;

        let entry_len = ENTRY_HEADER_SIZE
            .checked_add(name_len)
            .ok_or(Error::InvalidNetworkResponse)?;
        if next != 0 && entry_len > next {
            return res!(Error::InvalidNetworkResponse);
        }
        if entry_len > params.len() - offset {
            return res!(Error::InvalidNetworkResponse);
        }

        let name = params.read_string(Charset::Wide, offset + ENTRY_HEADER_SIZE, name_len)?;
        changes.push(NotifyChange { action, name });

        if next == 0 {
            return Ok(changes);
        }
        offset += next;
        if offset >= params.len() {
            return res!(Error::InvalidNetworkResponse);
        }
    }
}

/// A notify request in flight.
pub struct NotifyRequest {
    pending: PendingRequest,
}

impl NotifyRequest {
    pub fn mid(&self) -> u16 {
        self.pending.mid()
    }

    /// Wait for the changes. An empty list means the server overflowed its
    /// buffer and the caller should rescan.
    pub async fn collect(self) -> Result<Vec<NotifyChange>> {
        let mid = self.pending.mid();
        let reply = self.pending.collect().await?;
        let changes = parse_notify(&reply.params)?;
        debug!("{} change(s) on mid {}", changes.len(), mid);
        Ok(changes)
    }
}

impl Session {
    /// Watch the directory open as `fnum`.
    pub async fn notify_send(
        &self,
        fnum: u16,
        buffer_size: u32,
        filter: NotifyFilter,
        recursive: bool,
    ) -> Result<NotifyRequest> {
        let envelope = build_notify(fnum, buffer_size, filter, recursive);
        Ok(NotifyRequest {
            pending: self.submit(envelope).await?,
        })
    }

    pub async fn notify(
        &self,
        fnum: u16,
        buffer_size: u32,
        filter: NotifyFilter,
        recursive: bool,
    ) -> Result<Vec<NotifyChange>> {
        self.notify_send(fnum, buffer_size, filter, recursive)
            .await?
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::encode_string;

    fn entry(buf: &mut WireBuffer, action: NotifyAction, name: &str, last: bool) {
        let name = encode_string(Charset::Wide, name, false).unwrap();
        let padded = (ENTRY_HEADER_SIZE + name.len() + 3) & !3;
        buf.push_u32_le(if last { 0 } else { padded as u32 });
        buf.push_u32_le(action as u32);
        buf.push_u32_le(name.len() as u32);
        buf.push_bytes(&name);
        if !last {
            buf.push_fill(0, padded - ENTRY_HEADER_SIZE - name.len());
        }
    }

    #[test]
    fn setup_words() {
        let filter = NotifyFilter::FILE_NAME | NotifyFilter::STREAM_WRITE;
        let envelope = build_notify(0x0102, 1000, filter, true);
        assert_eq!(envelope.setup, vec![0x0801, 0x0000, 0x0102, 1]);
        assert_eq!(envelope.limits.param.max, 1000);
        assert_eq!(envelope.limits.data.max, 0);
        assert_eq!(envelope.command(), SmbCommand::NtTrans);
    }

    #[test]
    fn three_changes_in_order() {
        let mut params = WireBuffer::new();
        entry(&mut params, NotifyAction::Added, "new.txt", false);
        entry(&mut params, NotifyAction::RenamedOldName, "a", false);
        entry(&mut params, NotifyAction::RenamedNewName, "résumé", true);

        let changes = parse_notify(&params).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].name, "new.txt");
        assert_eq!(changes[0].kind(), Some(NotifyAction::Added));
        assert_eq!(changes[1].kind(), Some(NotifyAction::RenamedOldName));
        assert_eq!(changes[2].name, "résumé");
        assert_eq!(changes[2].action, NotifyAction::RenamedNewName as u32);
    }

    #[test]
    fn empty_reply_means_rescan() {
        assert!(parse_notify(&WireBuffer::new()).unwrap().is_empty());
    }

    #[test]
    fn inconsistent_chains_are_rejected() {
        let mut params = WireBuffer::new();
        entry(&mut params, NotifyAction::Added, "abcd", false);
        entry(&mut params, NotifyAction::Removed, "x", true);

        let mut overlapping = params.clone();
        overlapping.patch_u32_le(0, 16).unwrap();
        assert_eq!(parse_notify(&overlapping), Err(Error::InvalidNetworkResponse));

        let mut past_end = params.clone();
        past_end.patch_u32_le(0, 400).unwrap();
        assert_eq!(parse_notify(&past_end), Err(Error::InvalidNetworkResponse));

        let mut long_name = params.clone();
        long_name.patch_u32_le(20 + 8, 100).unwrap();
        assert_eq!(parse_notify(&long_name), Err(Error::InvalidNetworkResponse));

        let truncated = params.slice(0, 26).unwrap();
        assert_eq!(parse_notify(&truncated), Err(Error::InvalidNetworkResponse));
    }
}
