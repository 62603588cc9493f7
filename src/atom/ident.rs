use std::fmt;

/// A raw four byte atom type code.
///
/// Atom type codes are not text: iTunes atoms such as `©nam` use `0xA9` as
/// their first byte, which is not valid UTF-8 on its own. Fourcc is always
/// built from and compared as raw bytes, never decoded as a string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fourcc(pub [u8; 4]);

impl Fourcc {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fourcc({})", self)
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl From<[u8; 4]> for Fourcc {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl From<&[u8; 4]> for Fourcc {
    fn from(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }
}

macro_rules! fourcc {
    ($name:ident, $bytes:expr) => {
        pub const $name: Fourcc = Fourcc::new(*$bytes);
    };
}

fourcc!(FTYP, b"ftyp");
fourcc!(MDAT, b"mdat");
fourcc!(FREE, b"free");
fourcc!(MOOV, b"moov");
fourcc!(MVHD, b"mvhd");
fourcc!(TRAK, b"trak");
fourcc!(TKHD, b"tkhd");
fourcc!(EDTS, b"edts");
fourcc!(MDIA, b"mdia");
fourcc!(MDHD, b"mdhd");
fourcc!(HDLR, b"hdlr");
fourcc!(MINF, b"minf");
fourcc!(STBL, b"stbl");
fourcc!(STSD, b"stsd");
fourcc!(STSC, b"stsc");
fourcc!(STSZ, b"stsz");
fourcc!(STCO, b"stco");
fourcc!(CO64, b"co64");
fourcc!(STTS, b"stts");
fourcc!(UDTA, b"udta");
fourcc!(SMHD, b"smhd");
fourcc!(DINF, b"dinf");
fourcc!(DREF, b"dref");
fourcc!(URL, b"url ");
fourcc!(META, b"meta");
fourcc!(ILST, b"ilst");
fourcc!(STEM, b"stem");
fourcc!(DATA, b"data");
fourcc!(MEAN, b"mean");
fourcc!(NAME, b"name");
fourcc!(FREEFORM, b"----");

/// A typed key for a piece of metadata: either a plain four byte atom type,
/// or a free-form `----` atom keyed by its `mean` and `name` children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataIdent {
    Fourcc(Fourcc),
    Freeform { mean: String, name: String },
}

impl DataIdent {
    pub fn fourcc(fourcc: impl Into<Fourcc>) -> Self {
        Self::Fourcc(fourcc.into())
    }

    pub fn freeform(mean: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Freeform { mean: mean.into(), name: name.into() }
    }

    pub fn is_freeform(&self) -> bool {
        matches!(self, Self::Freeform { .. })
    }
}

impl fmt::Display for DataIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fourcc(fourcc) => write!(f, "{}", fourcc),
            Self::Freeform { mean, name } => write!(f, "----:{}:{}", mean, name),
        }
    }
}
