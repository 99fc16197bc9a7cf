//! Operation codecs.
//!
//! Each operation is a pair of pure functions, `build_*` producing an
//! [`Envelope`] and `parse_*` turning an [`EnvelopeReply`] into a typed result,
//! plus an async method on [`Session`] tying the two together. Parsers only
//! read through the bounds-checked [`WireBuffer`] accessors and build their
//! result in one piece, so a failed parse never yields partial output.

use crate::{
    buffer::{Charset, WireBuffer},
    engine::Session,
    proto::*,
    trans::{Envelope, EnvelopeReply},
    utils::Result,
};

pub mod ea;
pub mod file;
pub mod fs;
pub mod lock;
pub mod notify;
pub mod posix;
pub mod rename;
pub mod shadow;

/// Parameter block addressing a path: level, reserved, name.
pub fn path_info_params(charset: Charset, level: u16, path: &str) -> Result<WireBuffer> {
    let mut params = WireBuffer::new();
    params.push_u16_le(level);
    params.push_u32_le(0);
    params.push_string(charset, path, true, false)?;
    Ok(params)
}

/// Parameter block addressing an open file: handle, level.
pub fn file_info_params(fnum: u16, level: u16) -> WireBuffer {
    let mut params = WireBuffer::new();
    params.push_u16_le(fnum);
    params.push_u16_le(level);
    params
}

pub fn build_query_path_info(
    charset: Charset,
    path: &str,
    level: u16,
    data: (u32, u32),
) -> Result<Envelope> {
    Ok(Envelope::trans2(Trans2Sub::QueryPathInfo)
        .params(path_info_params(charset, level, path)?)
        .param_limits(0, 2)
        .data_limits(data.0, data.1))
}

pub fn build_query_file_info(fnum: u16, level: u16, data: (u32, u32)) -> Envelope {
    Envelope::trans2(Trans2Sub::QueryFileInfo)
        .params(file_info_params(fnum, level))
        .param_limits(0, 2)
        .data_limits(data.0, data.1)
}

pub fn build_set_path_info(
    charset: Charset,
    path: &str,
    level: u16,
    data: WireBuffer,
) -> Result<Envelope> {
    Ok(Envelope::trans2(Trans2Sub::SetPathInfo)
        .params(path_info_params(charset, level, path)?)
        .data(data)
        .param_limits(0, 2)
        .data_limits(0, 0))
}

pub fn build_set_file_info(fnum: u16, level: u16, data: WireBuffer) -> Envelope {
    Envelope::trans2(Trans2Sub::SetFileInfo)
        .params(file_info_params(fnum, level))
        .data(data)
        .param_limits(0, 2)
        .data_limits(0, 0)
        .fid(fnum)
}

impl Session {
    /// Query `level` on `path`; the reply must carry at least `min_data` bytes.
    pub(crate) async fn query_path_info(
        &self,
        path: &str,
        level: u16,
        min_data: u32,
    ) -> Result<EnvelopeReply> {
        let max = self.config().max_buffer.max(min_data);
        let envelope = build_query_path_info(self.charset(), path, level, (min_data, max))?;
        self.transact(envelope).await
    }

    pub(crate) async fn query_file_info(
        &self,
        fnum: u16,
        level: u16,
        min_data: u32,
    ) -> Result<EnvelopeReply> {
        let max = self.config().max_buffer.max(min_data);
        self.transact(build_query_file_info(fnum, level, (min_data, max)))
            .await
    }

    pub(crate) async fn set_path_info(
        &self,
        path: &str,
        level: u16,
        data: WireBuffer,
    ) -> Result<EnvelopeReply> {
        let envelope = build_set_path_info(self.charset(), path, level, data)?;
        self.transact(envelope).await
    }

    pub(crate) async fn set_file_info(
        &self,
        fnum: u16,
        level: u16,
        data: WireBuffer,
    ) -> Result<EnvelopeReply> {
        self.transact(build_set_file_info(fnum, level, data)).await
    }
}
