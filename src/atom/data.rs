use std::io::{Read, Write};

use crate::atom::head::{parse_full_head, parse_head, write_full_head, write_head, Head, Size};
use crate::atom::ident::DATA;
use crate::atom::util::{ReadUtil, WriteUtil};
use crate::error::{Error, Result};

/// Well-known data type codes from the iTunes metadata "data" atom (a
/// subset of Apple's Table 3-5, only the codes this format actually uses).
pub const TYPE_RESERVED: u32 = 0;
pub const TYPE_UTF8: u32 = 1;
pub const TYPE_BE_SIGNED: u32 = 21;

/// The decoded payload of a `data` atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    /// Type code 0: implicit/binary payload (used for free-form binary
    /// blobs such as vocal-pitch curves and onset timestamps).
    Reserved(Vec<u8>),
    /// Type code 1: a UTF-8 string.
    Utf8(String),
    /// Type code 21: a big-endian signed integer, stored in its minimal
    /// encoded width (1, 2, 4 or 8 bytes).
    BeSigned(Vec<u8>),
    /// Any other type code, preserved verbatim.
    Unknown { code: u32, data: Vec<u8> },
}

impl Data {
    pub fn type_code(&self) -> u32 {
        match self {
            Self::Reserved(_) => TYPE_RESERVED,
            Self::Utf8(_) => TYPE_UTF8,
            Self::BeSigned(_) => TYPE_BE_SIGNED,
            Self::Unknown { code, .. } => *code,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Reserved(b) | Self::BeSigned(b) | Self::Unknown { data: b, .. } => b,
            Self::Utf8(s) => s.as_bytes(),
        }
    }

    pub fn as_utf8(&self) -> Result<&str> {
        match self {
            Self::Utf8(s) => Ok(s),
            _ => Err(Error::malformed_payload(format!(
                "expected utf8 data atom, found type code {}",
                self.type_code()
            ))),
        }
    }

    pub fn as_be_signed_i64(&self) -> Result<i64> {
        match self {
            Self::BeSigned(bytes) => {
                let mut padded = [0u8; 8];
                let fill = if bytes.first().map_or(false, |b| b & 0x80 != 0) { 0xff } else { 0x00 };
                padded.fill(fill);
                let start = 8usize.saturating_sub(bytes.len());
                padded[start..].copy_from_slice(bytes);
                Ok(i64::from_be_bytes(padded))
            }
            _ => Err(Error::malformed_payload(format!(
                "expected be_signed data atom, found type code {}",
                self.type_code()
            ))),
        }
    }

    /// Content length (header bytes excluded) of the `data` atom body:
    /// full-head (4 bytes) + locale (4 bytes) + payload.
    fn body_len(&self) -> u64 {
        8 + self.as_bytes().len() as u64
    }

    pub fn parse(reader: &mut (impl Read + ?Sized), content_len: u64) -> Result<Self> {
        if content_len < 8 {
            return Err(Error::invalid_size("data atom content too small for full head + locale"));
        }
        let (_version, flags) = parse_full_head(reader)?;
        let code = u32::from_be_bytes([0, flags[0], flags[1], flags[2]]);
        let _locale = reader.read_be_u32()?;

        let payload_len = content_len - 8;
        let bytes = reader.read_u8_vec(payload_len as usize)?;

        match code {
            TYPE_RESERVED => Ok(Self::Reserved(bytes)),
            TYPE_UTF8 => Ok(Self::Utf8(String::from_utf8(bytes)?)),
            TYPE_BE_SIGNED => Ok(Self::BeSigned(bytes)),
            other => Ok(Self::Unknown { code: other, data: bytes }),
        }
    }

    pub fn write(&self, writer: &mut (impl Write + ?Sized)) -> Result<()> {
        let head = Head { size: Size::from_content_len(self.body_len()), fourcc: DATA };
        write_head(writer, &head)?;
        let code = self.type_code();
        let flags = [(code >> 16) as u8, (code >> 8) as u8, code as u8];
        write_full_head(writer, 0, flags)?;
        writer.write_be_u32(0)?; // locale
        writer.write_all(self.as_bytes())?;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        8 + self.body_len()
    }
}
