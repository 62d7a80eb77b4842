//! File header parsing: the 12- or 14-byte `.FIT` header, with an optional
//! header CRC.

use crate::byteio::ByteSource;
use crate::crc::fit_crc;
use crate::error::{FitError, FitResult};
use crate::ParserOptions;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub header_size: u8,
    pub protocol_ver_raw: u8,
    pub profile_ver_raw: u16,
    pub data_size: u32,
    /// `Some(0)` means the producer didn't bother computing one; absent
    /// entirely when `header_size == 12`.
    pub crc: Option<u16>,
}

impl FileHeader {
    pub fn protocol_version(&self) -> (u8, u8) {
        (self.protocol_ver_raw >> 4, self.protocol_ver_raw & 0xF)
    }

    pub fn profile_version(&self) -> (u16, u16) {
        (self.profile_ver_raw / 100, self.profile_ver_raw % 100)
    }
}

/// Parses the 12/14-byte file header, advancing `src` past it and leaving
/// `src.remaining()` set to `data_size`.
pub fn parse_file_header<R: Read>(src: &mut ByteSource<R>, opts: &ParserOptions) -> FitResult<FileHeader> {
    let fixed = src.read(12)?;
    src.write(&fixed)?;

    if &fixed[8..12] != b".FIT" {
        return Err(FitError::Header("missing .FIT magic".into()));
    }

    let header_size = fixed[0];
    let protocol_ver_raw = fixed[1];
    let profile_ver_raw = u16::from_le_bytes([fixed[2], fixed[3]]);
    let data_size = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);

    let mut crc = None;
    if header_size > 12 {
        if header_size < 14 {
            return Err(FitError::Header("irregular header size".into()));
        }
        let crc_bytes = src.read(2)?;
        let crc_in_file = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
        let calculated = fit_crc(&fixed, 0);
        if opts.check_crc && crc_in_file != calculated && !(opts.allow_zero_crc && crc_in_file == 0) {
            return Err(FitError::Crc { expected: calculated, actual: crc_in_file });
        }
        src.write(&crc_bytes)?;
        crc = Some(crc_in_file);

        let extra = header_size as usize - 14;
        if extra > 0 {
            let unknown = src.read(extra)?;
            src.write(&unknown)?;
        }
    }

    src.set_remaining(data_size as i64);
    tracing::debug!(header_size, data_size, "parsed FIT file header");

    Ok(FileHeader { header_size, protocol_ver_raw, profile_ver_raw, data_size, crc })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_header_bytes(data_size: u32) -> Vec<u8> {
        let mut v = vec![12u8, 0x10, 0x64, 0x00];
        v.extend_from_slice(&data_size.to_le_bytes());
        v.extend_from_slice(b".FIT");
        v
    }

    #[test]
    fn parses_12_byte_header() {
        let bytes = minimal_header_bytes(0);
        let mut src = ByteSource::new(Cursor::new(bytes));
        let header = parse_file_header(&mut src, &ParserOptions::default()).unwrap();
        assert_eq!(header.header_size, 12);
        assert_eq!(header.crc, None);
        assert_eq!(src.remaining(), Some(0));
    }

    #[test]
    fn rejects_missing_magic() {
        let mut bytes = minimal_header_bytes(0);
        bytes[8] = b'X';
        let mut src = ByteSource::new(Cursor::new(bytes));
        assert!(matches!(parse_file_header(&mut src, &ParserOptions::default()), Err(FitError::Header(_))));
    }

    #[test]
    fn accepts_zero_crc_sentinel() {
        let mut bytes = vec![14u8, 0x10, 0x64, 0x00];
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(&[0, 0]); // sentinel "unchecked" CRC
        let mut src = ByteSource::new(Cursor::new(bytes));
        let header = parse_file_header(&mut src, &ParserOptions::default()).unwrap();
        assert_eq!(header.crc, Some(0));
    }

    #[test]
    fn rejects_bad_header_crc_when_nonzero() {
        let mut bytes = vec![14u8, 0x10, 0x64, 0x00];
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(&[0xAB, 0xCD]);
        let mut src = ByteSource::new(Cursor::new(bytes));
        assert!(matches!(parse_file_header(&mut src, &ParserOptions::default()), Err(FitError::Crc { .. })));
    }
}
