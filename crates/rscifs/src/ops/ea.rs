//! Extended attributes.
//!
//! An EA list is a 32-bit total size (itself included) followed by records
//! of `flags: u8, name_len: u8, value_len: u16`, the terminated name and the
//! value. Names are always in the narrow charset.

use {
    crate::{
        buffer::{Charset, WireBuffer, encode_string},
        engine::Session,
        error::Error,
        proto::*,
        res,
        utils::Result,
    },
    log::debug,
};

const EA_LIST_HEADER_SIZE: usize = 4;
const EA_RECORD_HEADER_SIZE: usize = 4;

/// Decode an EA list.
///
/// Every record is checked against the declared size before its contents
/// are read. A zero-length name, a record running past the list or a name
/// without its terminator fails the whole list.
pub fn parse_ea_list(data: &WireBuffer) -> Result<Vec<EaEntry>> {
    if data.len() < EA_LIST_HEADER_SIZE {
        return res!(Error::DataError);
    }
    let size = data.read_u32_le(0)? as usize;
    if size > data.len() {
        return res!(Error::InvalidNetworkResponse);
    }
    if size <= EA_LIST_HEADER_SIZE {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut offset = EA_LIST_HEADER_SIZE;
    while size - offset >= EA_RECORD_HEADER_SIZE {
        let flags = data.read_u8(offset)?;
        let name_len = usize::from(data.read_u8(offset + 1)?);
        let value_len = usize::from(data.read_u16_le(offset + 2)?);
        if name_len == 0 {
            return res!(Error::InvalidNetworkResponse);
        }
        let record_len = EA_RECORD_HEADER_SIZE + name_len + 1 + value_len;
        if record_len > size - offset {
            return res!(Error::InvalidNetworkResponse);
        }

        let name_start = offset + EA_RECORD_HEADER_SIZE;
        let value_start = name_start + name_len + 1;
        if data.read_u8(value_start - 1)? != 0 {
            return res!(Error::InvalidNetworkResponse);
        }
        entries.push(EaEntry {
            flags,
            name: data.read_string(Charset::Narrow, name_start, name_len)?,
            value: data.read_bytes(value_start, value_len)?.to_vec(),
        });
        offset += record_len;
    }
    Ok(entries)
}

/// EA list holding one attribute. An empty name and value produce an empty
/// list.
pub fn build_ea_set_data(name: &str, value: &[u8]) -> Result<WireBuffer> {
    let mut data = WireBuffer::new();
    if name.is_empty() && value.is_empty() {
        data.push_u32_le(EA_LIST_HEADER_SIZE as u32);
        return Ok(data);
    }

    let encoded = encode_string(Charset::Narrow, name, false)?;
    let name_len = u8::try_from(encoded.len()).map_err(|_| Error::InvalidParameter)?;
    let value_len = u16::try_from(value.len()).map_err(|_| Error::InvalidParameter)?;
    if name_len == 0 {
        return res!(Error::InvalidParameter);
    }

    let total = EA_LIST_HEADER_SIZE + EA_RECORD_HEADER_SIZE + encoded.len() + 1 + value.len();
    data.push_u32_le(total as u32);
    data.push_u8(0);
    data.push_u8(name_len);
    data.push_u16_le(value_len);
    data.push_bytes(&encoded);
    data.push_u8(0);
    data.push_bytes(value);
    Ok(data)
}

impl Session {
    pub async fn get_ea_list(&self, path: &str) -> Result<Vec<EaEntry>> {
        let reply = self
            .query_path_info(path, level::INFO_QUERY_ALL_EAS, EA_LIST_HEADER_SIZE as u32)
            .await?;
        let entries = parse_ea_list(&reply.data)?;
        debug!("{:?}: {} EA(s)", path, entries.len());
        Ok(entries)
    }

    pub async fn get_ea_list_fnum(&self, fnum: u16) -> Result<Vec<EaEntry>> {
        let reply = self
            .query_file_info(fnum, level::INFO_QUERY_ALL_EAS, EA_LIST_HEADER_SIZE as u32)
            .await?;
        parse_ea_list(&reply.data)
    }

    /// Set one EA on `path`. An empty value removes the attribute.
    pub async fn set_ea_path(&self, path: &str, name: &str, value: &[u8]) -> Result<()> {
        self.set_path_info(path, level::INFO_SET_EA, build_ea_set_data(name, value)?)
            .await?;
        Ok(())
    }

    pub async fn set_ea_fnum(&self, fnum: u16, name: &str, value: &[u8]) -> Result<()> {
        self.set_file_info(fnum, level::INFO_SET_EA, build_ea_set_data(name, value)?)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(buf: &mut WireBuffer, name: &[u8], value: &[u8]) {
        buf.push_u8(0);
        buf.push_u8(name.len() as u8);
        buf.push_u16_le(value.len() as u16);
        buf.push_bytes(name);
        buf.push_u8(0);
        buf.push_bytes(value);
    }

    fn list(records: &[(&str, &str)]) -> WireBuffer {
        let mut body = WireBuffer::new();
        for (name, value) in records {
            record(&mut body, name.as_bytes(), value.as_bytes());
        }
        let mut buf = WireBuffer::new();
        buf.push_u32_le(4 + body.len() as u32);
        buf.push_bytes(body.as_slice());
        buf
    }

    #[test]
    fn two_attributes() {
        let entries = parse_ea_list(&list(&[("user.a", "1"), ("user.bb", "")])).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "user.a");
        assert_eq!(entries[0].value, b"1");
        assert_eq!(entries[1].name, "user.bb");
        assert!(entries[1].value.is_empty());
    }

    #[test]
    fn empty_list() {
        assert!(parse_ea_list(&WireBuffer::from(vec![4, 0, 0, 0])).unwrap().is_empty());
        assert!(parse_ea_list(&WireBuffer::from(vec![0, 0, 0, 0])).unwrap().is_empty());
        assert_eq!(
            parse_ea_list(&WireBuffer::from(vec![4, 0])),
            Err(Error::DataError)
        );
    }

    #[test]
    fn malformed_records_fail_the_list() {
        let zero_name = list(&[("", "x")]);
        assert_eq!(parse_ea_list(&zero_name), Err(Error::InvalidNetworkResponse));

        let mut overflow = list(&[("a", "xyz")]);
        overflow.patch_u16_le(6, 4).unwrap();
        assert_eq!(parse_ea_list(&overflow), Err(Error::InvalidNetworkResponse));

        let mut unterminated = list(&[("a", "xyz")]);
        unterminated.patch_u16_le(9, u16::from_le_bytes([b'!', b'x'])).unwrap();
        assert_eq!(parse_ea_list(&unterminated), Err(Error::InvalidNetworkResponse));

        let mut oversized = list(&[("a", "")]);
        oversized.patch_u32_le(0, 100).unwrap();
        assert_eq!(parse_ea_list(&oversized), Err(Error::InvalidNetworkResponse));
    }

    #[test]
    fn records_end_at_the_declared_size() {
        let mut data = list(&[("user.a", "1"), ("user.b", "22")]);
        let declared = data.len() as u32;
        record(&mut data, b"user.trailing", b"ignored");
        data.patch_u32_le(0, declared).unwrap();

        let entries = parse_ea_list(&data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "user.b");
        assert_eq!(entries[1].value, b"22");

        // A record header cut short by the declared size is padding
        let mut padded = list(&[("user.a", "1")]);
        padded.push_fill(0, 3);
        let size = padded.len() as u32;
        padded.patch_u32_le(0, size).unwrap();
        assert_eq!(parse_ea_list(&padded).unwrap().len(), 1);
    }

    #[test]
    fn set_data_layout() {
        let data = build_ea_set_data("user.k", b"val").unwrap();
        assert_eq!(data.read_u32_le(0).unwrap(), data.len() as u32);
        assert_eq!(data.as_slice(), b"\x12\0\0\0\0\x06\x03\0user.k\0val");
        assert_eq!(parse_ea_list(&data).unwrap()[0].value, b"val");

        assert_eq!(build_ea_set_data("", b"").unwrap().as_slice(), &[4, 0, 0, 0]);
        assert_eq!(build_ea_set_data("", b"x").err(), Some(Error::InvalidParameter));
        let long = "n".repeat(256);
        assert_eq!(build_ea_set_data(&long, b"").err(), Some(Error::InvalidParameter));
    }
}
