//! Shadow copy (previous versions) enumeration.

use crate::{
    buffer::{Charset, WireBuffer},
    engine::Session,
    error::Error,
    proto::*,
    res,
    trans::Envelope,
    utils::Result,
};

/// Header plus the list terminator
const MIN_REPLY_SIZE: usize = 16;
const DATA_START: usize = 12;
/// One label slot, in bytes
const LABEL_SLOT: usize = SHADOW_COPY_LABEL_LEN * 2;

pub fn build_shadow_copy(fnum: u16, get_names: bool) -> Envelope {
    let code = FSCTL_GET_SHADOW_COPY_DATA;
    Envelope::nt_trans(NtTransFunction::Ioctl)
        .setup(&[code as u16, (code >> 16) as u16, fnum, 0x0001])
        .param_limits(0, 0)
        .data_limits(0, if get_names { 0x4000 } else { 16 })
}

pub fn parse_shadow_copy(data: &WireBuffer, get_names: bool) -> Result<ShadowCopyData> {
    if data.len() < MIN_REPLY_SIZE {
        return res!(Error::InvalidNetworkResponse);
    }
    let count = data.read_u32_le(4)?;
    let dlength = data.read_u32_le(8)? as usize;
    if dlength > data.len() - DATA_START {
        return res!(Error::InvalidNetworkResponse);
    }
    let labels = usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(LABEL_SLOT))
        .ok_or(Error::DataError)?;
    if labels > dlength {
        return res!(Error::InvalidNetworkResponse);
    }

    let names = if get_names {
        (0..count as usize)
            .map(|i| data.read_string(Charset::Wide, DATA_START + i * LABEL_SLOT, LABEL_SLOT))
            .collect::<Result<Vec<_>>>()?
    } else {
        Vec::new()
    };
    Ok(ShadowCopyData { count, names })
}

impl Session {
    /// List the shadow copies of the volume holding `fnum`. Without
    /// `get_names` only the count is fetched.
    pub async fn shadow_copy_data(&self, fnum: u16, get_names: bool) -> Result<ShadowCopyData> {
        let reply = self.transact(build_shadow_copy(fnum, get_names)).await?;
        parse_shadow_copy(&reply.data, get_names)
    }
}
