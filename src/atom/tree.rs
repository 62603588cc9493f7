//! Generic atom tree structure and parser.
//!
//! ```md
//! ftyp
//! mdat
//! moov
//! ├─ mvhd
//! ├─ trak
//! │  └─ mdia
//! │     ├─ mdhd
//! │     └─ minf
//! │        └─ stbl
//! │           ├─ stsd
//! │           ├─ stsc
//! │           ├─ stsz
//! │           ├─ stts
//! │           └─ stco / co64
//! └─ udta
//!    ├─ stem
//!    └─ meta
//!       ├─ hdlr
//!       └─ ilst
//!          ├─ **** (any fourcc)
//!          │  └─ data
//!          └─ ---- (freeform fourcc)
//!             ├─ mean
//!             ├─ name
//!             └─ data
//! ```

use std::io::{Cursor, SeekFrom};

use crate::atom::head::{parse_head, AtomBounds, Head};
use crate::atom::ident::{Fourcc, CO64, EDTS, FREEFORM, ILST, MDIA, META, MINF, MOOV, STBL, STCO, TRAK, UDTA};
use crate::atom::util::SeekUtil;
use crate::config::ParseConfig;
use crate::error::{Error, Result};

/// A node in the parsed atom tree: byte range plus, for known container
/// types, the recursively parsed children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub bounds: AtomBounds,
    pub children: Vec<Atom>,
}

impl Atom {
    pub fn fourcc(&self) -> Fourcc {
        self.bounds.fourcc()
    }

    pub fn pos(&self) -> u64 {
        self.bounds.pos()
    }

    pub fn content_pos(&self) -> u64 {
        self.bounds.content_pos()
    }

    pub fn end(&self) -> u64 {
        self.bounds.end()
    }

    pub fn len(&self) -> u64 {
        self.bounds.head.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, fourcc: Fourcc) -> Option<&Atom> {
        self.children.iter().find(|a| a.fourcc() == fourcc)
    }

    pub fn find_path(&self, path: &[Fourcc]) -> Option<&Atom> {
        let mut cur = self;
        for fourcc in path {
            cur = cur.find(*fourcc)?;
        }
        Some(cur)
    }

    pub fn find_all<'a>(&'a self, fourcc: Fourcc) -> impl Iterator<Item = &'a Atom> {
        self.children.iter().filter(move |a| a.fourcc() == fourcc)
    }
}

/// Whether `fourcc` is one of the container types whose children are
/// materialized by [`walk`] rather than treated as an opaque leaf.
pub fn is_container(fourcc: Fourcc) -> bool {
    matches!(fourcc, MOOV | TRAK | MDIA | MINF | STBL | UDTA | META | ILST | EDTS | FREEFORM)
}

/// Content offset at which a container's children begin: `meta` carries a
/// 4-byte version/flags word before its children, everything else does not.
fn children_start(fourcc: Fourcc, content_pos: u64) -> u64 {
    if fourcc == META {
        content_pos + 4
    } else {
        content_pos
    }
}

/// Scan a contiguous window `[offset, limit)` of `bytes`, producing the
/// flat list of atoms found there. Children are not materialized; callers
/// that need the full tree call [`walk`] on each resulting atom.
pub fn parse(bytes: &[u8], offset: u64, limit: u64) -> Result<Vec<Atom>> {
    if limit > bytes.len() as u64 || offset > limit {
        return Err(Error::truncated("parse window exceeds buffer bounds"));
    }

    let mut atoms = Vec::new();
    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(offset))?;
    let mut pos = offset;

    while pos < limit {
        let remaining = limit - pos;
        if remaining < 8 {
            return Err(Error::truncated("trailing bytes too short for an atom header"));
        }

        let head = parse_head(&mut cursor)?;
        let len = if head.size.len() == 0 {
            // size 0: this box extends to the end of the enclosing window.
            limit - pos
        } else {
            head.size.len()
        };

        if pos + len > limit {
            return Err(Error::truncated(format!(
                "atom '{}' at {} claims size {} past window end {}",
                head.fourcc, pos, len, limit
            )));
        }

        // Preserve the parsed size's extended-size flag; only the size==0
        // (extends-to-end) case needs a freshly synthesized Size, since its
        // resolved length was never actually encoded in the header.
        let size = if head.size.len() == 0 {
            crate::atom::head::Size::from_content_len(len - head.head_len())
        } else {
            head.size
        };
        let head = Head { size, fourcc: head.fourcc };
        atoms.push(Atom { bounds: AtomBounds { pos, head }, children: Vec::new() });

        pos += len;
        cursor.seek(SeekFrom::Start(pos))?;
    }

    Ok(atoms)
}

/// Recursively materialize `atom`'s children (and their children, down to
/// `max_depth`) for container types, leaving leaf atoms untouched.
pub fn walk(bytes: &[u8], mut atom: Atom, cfg: &ParseConfig, depth: u8) -> Result<Atom> {
    if !is_container(atom.fourcc()) {
        return Ok(atom);
    }
    if depth >= cfg.max_depth {
        return Err(Error::invalid_container(format!(
            "atom tree exceeds max_depth {} at '{}'",
            cfg.max_depth, atom.fourcc()
        )));
    }

    let start = children_start(atom.fourcc(), atom.content_pos());
    let end = atom.end();
    let children = parse(bytes, start, end)?;
    atom.children = children
        .into_iter()
        .map(|child| walk(bytes, child, cfg, depth + 1))
        .collect::<Result<Vec<_>>>()?;
    Ok(atom)
}

/// Parse the full tree of top-level atoms (`ftyp`, `moov`, `mdat`, ...) in
/// `bytes`, recursively materializing children of known container types.
pub fn parse_tree(bytes: &[u8], cfg: &ParseConfig) -> Result<Vec<Atom>> {
    let top = parse(bytes, 0, bytes.len() as u64)?;
    top.into_iter().map(|a| walk(bytes, a, cfg, 0)).collect()
}

pub fn parse_tree_default(bytes: &[u8]) -> Result<Vec<Atom>> {
    parse_tree(bytes, &ParseConfig::default())
}

/// Convenience: find `moov` among a parsed top-level atom list.
pub fn find_moov(top: &[Atom]) -> Option<&Atom> {
    top.iter().find(|a| a.fourcc() == MOOV)
}

pub fn find_mdat(top: &[Atom]) -> Option<&Atom> {
    top.iter().find(|a| a.fourcc() == crate::atom::ident::MDAT)
}

pub fn find_ftyp(top: &[Atom]) -> Option<&Atom> {
    top.iter().find(|a| a.fourcc() == crate::atom::ident::FTYP)
}

/// Whether `fourcc` names an offset-table leaf (`stco`/`co64`), used by the
/// chunk-offset rewriter's traversal filter.
pub fn is_offset_table(fourcc: Fourcc) -> bool {
    matches!(fourcc, STCO | CO64)
}
