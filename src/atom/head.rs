use std::io::{Read, Write};

use crate::atom::util::{ReadUtil, WriteUtil};
use crate::atom::Fourcc;
use crate::error::{Error, Result};

/// The size of an atom, distinguishing the ordinary 32-bit form from the
/// extended 64-bit form (`size == 1` sentinel followed by an 8 byte length).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    ext: bool,
    len: u64,
}

impl Size {
    /// Build a `Size` for a box whose content (everything after the header)
    /// is `content_len` bytes long.
    pub fn from_content_len(content_len: u64) -> Self {
        let ext = content_len + 8 > u32::MAX as u64;
        Self { ext, len: content_len + Self::head_len_for(ext) }
    }

    fn head_len_for(ext: bool) -> u64 {
        if ext {
            16
        } else {
            8
        }
    }

    pub fn ext(&self) -> bool {
        self.ext
    }

    /// Total length of the box, header included.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head_len(&self) -> u64 {
        Self::head_len_for(self.ext)
    }

    pub fn content_len(&self) -> u64 {
        self.len - self.head_len()
    }
}

/// A parsed box header: total size plus the four byte type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    pub size: Size,
    pub fourcc: Fourcc,
}

impl Head {
    pub fn len(&self) -> u64 {
        self.size.len()
    }

    pub fn head_len(&self) -> u64 {
        self.size.head_len()
    }

    pub fn content_len(&self) -> u64 {
        self.size.content_len()
    }
}

/// The byte range of a fully scanned atom within its containing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomBounds {
    pub pos: u64,
    pub head: Head,
}

impl AtomBounds {
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn content_pos(&self) -> u64 {
        self.pos + self.head.head_len()
    }

    pub fn end(&self) -> u64 {
        self.pos + self.head.len()
    }

    pub fn fourcc(&self) -> Fourcc {
        self.head.fourcc
    }
}

/// Parse a box header (`size`, `fourcc`, and extended size if present) from
/// the current position of `reader`.
pub fn parse_head(reader: &mut (impl Read + ?Sized)) -> Result<Head> {
    let len32 = reader.read_be_u32()?;
    let fourcc = Fourcc::from(reader.read_fourcc()?);

    let (ext, len) = if len32 == 1 {
        let len64 = reader.read_be_u64()?;
        if len64 < 16 {
            return Err(Error::invalid_size(format!(
                "extended size {} too small for atom '{}'",
                len64, fourcc
            )));
        }
        (true, len64)
    } else if len32 == 0 {
        // Size extends to the end of the enclosing container; callers that
        // need a concrete length resolve this against their own bounds.
        (false, 0)
    } else if (len32 as u64) < 8 {
        return Err(Error::invalid_size(format!(
            "size {} too small for atom '{}'",
            len32, fourcc
        )));
    } else {
        (false, len32 as u64)
    };

    Ok(Head { size: Size { ext, len }, fourcc })
}

/// Build a complete atom (header + body) for `fourcc` wrapping `content`.
/// Used wherever a whole atom is synthesized wholesale rather than parsed
/// (track extraction, atom mutation, test fixtures).
pub fn build_atom(fourcc: crate::atom::ident::Fourcc, content: &[u8]) -> Vec<u8> {
    let head = Head { size: Size::from_content_len(content.len() as u64), fourcc };
    let mut out = Vec::with_capacity(head.head_len() as usize + content.len());
    write_head(&mut out, &head).expect("writing to a Vec never fails");
    out.extend_from_slice(content);
    out
}

pub fn write_head(writer: &mut (impl Write + ?Sized), head: &Head) -> Result<()> {
    if head.size.ext() {
        writer.write_be_u32(1)?;
        writer.write_fourcc(head.fourcc.as_bytes())?;
        writer.write_be_u64(head.size.len())?;
    } else {
        writer.write_be_u32(head.size.len() as u32)?;
        writer.write_fourcc(head.fourcc.as_bytes())?;
    }
    Ok(())
}

/// Parse the version + flags word shared by "full box" atoms.
pub fn parse_full_head(reader: &mut (impl Read + ?Sized)) -> Result<(u8, [u8; 3])> {
    let version = reader.read_u8()?;
    let mut flags = [0u8; 3];
    reader.read_exact(&mut flags)?;
    Ok((version, flags))
}

pub fn write_full_head(writer: &mut (impl Write + ?Sized), version: u8, flags: [u8; 3]) -> Result<()> {
    writer.write_u8(version)?;
    writer.write_all(&flags)?;
    Ok(())
}
