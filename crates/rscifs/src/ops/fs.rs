//! Volume size and basic file information.

use {
    crate::{
        buffer::WireBuffer,
        engine::Session,
        error::Error,
        proto::*,
        trans::{Envelope, EnvelopeReply},
        utils::Result,
    },
    log::warn,
};

const FULL_SIZE_INFO_SIZE: u32 = 32;
const BASIC_INFO_SIZE: u32 = 36;
const DSKATTR_WORDS_SIZE: u32 = 8;

pub fn build_fs_full_size() -> Envelope {
    let mut params = WireBuffer::with_capacity(2);
    params.push_u16_le(level::FS_FULL_SIZE_INFORMATION);
    Envelope::trans2(Trans2Sub::QueryFsInfo)
        .params(params)
        .param_limits(0, 0)
        .data_limits(FULL_SIZE_INFO_SIZE, CLI_BUFFER_SIZE)
}

pub fn parse_fs_full_size(data: &WireBuffer) -> Result<DiskSize> {
    let sectors_per_unit = u64::from(data.read_u32_le(24)?);
    let bytes_per_sector = u64::from(data.read_u32_le(28)?);
    Ok(DiskSize {
        block_size: sectors_per_unit * bytes_per_sector,
        total: data.read_u64_le(0)?,
        avail: data.read_u64_le(8)?,
    })
}

/// `SMBdskattr`
pub fn build_dskattr() -> Envelope {
    Envelope::plain(SmbCommand::DiskAttr, WireBuffer::new(), WireBuffer::new())
        .param_limits(DSKATTR_WORDS_SIZE, 0x1fe)
}

pub fn parse_dskattr(reply: &EnvelopeReply) -> Result<DiskSize> {
    let w = &reply.params;
    let blocks_per_unit = u64::from(w.read_u16_le(2)?);
    let block_size = u64::from(w.read_u16_le(4)?);
    Ok(DiskSize {
        block_size: blocks_per_unit * block_size,
        total: u64::from(w.read_u16_le(0)?),
        avail: u64::from(w.read_u16_le(6)?),
    })
}

pub fn parse_basic_info(data: &WireBuffer) -> Result<BasicInfo> {
    Ok(BasicInfo {
        create_time: Time::from_nt(data.read_u64_le(0)?),
        access_time: Time::from_nt(data.read_u64_le(8)?),
        write_time: Time::from_nt(data.read_u64_le(16)?),
        change_time: Time::from_nt(data.read_u64_le(24)?),
        attributes: FileAttributes::from_bits_retain(data.read_u32_le(32)?),
    })
}

impl Session {
    /// Size of the share's volume, in allocation units.
    ///
    /// Servers that reject the full size query get the legacy 16-bit query.
    pub async fn disk_size(&self) -> Result<DiskSize> {
        match self.transact(build_fs_full_size()).await {
            Ok(reply) => parse_fs_full_size(&reply.data),
            Err(e @ (Error::Server(_) | Error::NotSupported)) => {
                warn!("Full size query rejected ({}), retrying as dskattr", e);
                let reply = self.transact(build_dskattr()).await?;
                parse_dskattr(&reply)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn query_basic_info(&self, path: &str) -> Result<BasicInfo> {
        let reply = self
            .query_path_info(path, level::QUERY_FILE_BASIC_INFO, BASIC_INFO_SIZE)
            .await?;
        parse_basic_info(&reply.data)
    }

    pub async fn query_basic_info_fnum(&self, fnum: u16) -> Result<BasicInfo> {
        let reply = self
            .query_file_info(fnum, level::QUERY_FILE_BASIC_INFO, BASIC_INFO_SIZE)
            .await?;
        parse_basic_info(&reply.data)
    }
}
