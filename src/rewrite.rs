//! Patches `stco`/`co64` chunk offsets after a mutation shifts the byte
//! position of sample data.
//!
//! After a mutation changes the size of `moov` by some delta `Δ`, every
//! byte at or beyond the original end of `moov` has physically moved by
//! `Δ`. This module walks the *new* `moov` tree and patches every
//! `stco`/`co64` entry that pointed at or past that threshold, so sample
//! data stays locatable without touching the `mdat` payload itself.

use crate::atom::ident::{CO64, MDIA, MINF, STBL, STCO, TRAK};
use crate::atom::tree::Atom;
use crate::error::{Error, Result};

/// Rewrite every `stco`/`co64` entry in `buf`'s `moov` atom (located fresh,
/// post-splice) that is `>= threshold`, adding `delta`. `threshold` is the
/// *original* end offset of `moov` before the mutation that produced
/// `delta` was applied. Operates in place on `buf`.
pub fn rewrite_chunk_offsets(buf: &mut [u8], moov: &Atom, threshold: u64, delta: i64) -> Result<usize> {
    let mut rewritten = 0usize;
    rewrite_container(buf, moov, threshold, delta, &mut rewritten)?;
    log::trace!("chunk-offset rewrite: {} entries shifted by {}", rewritten, delta);
    Ok(rewritten)
}

fn rewrite_container(buf: &mut [u8], atom: &Atom, threshold: u64, delta: i64, rewritten: &mut usize) -> Result<()> {
    for child in &atom.children {
        match child.fourcc() {
            STCO => rewrite_stco(buf, child, threshold, delta, rewritten)?,
            CO64 => rewrite_co64(buf, child, threshold, delta, rewritten)?,
            f if f == TRAK || f == MDIA || f == MINF || f == STBL => {
                rewrite_container(buf, child, threshold, delta, rewritten)?
            }
            _ => {}
        }
    }
    Ok(())
}

fn rewrite_stco(buf: &mut [u8], stco: &Atom, threshold: u64, delta: i64, rewritten: &mut usize) -> Result<()> {
    let content_start = stco.content_pos() as usize;
    // content_start..+4 is the version/flags full-head word; entry count follows.
    let entry_count = u32::from_be_bytes(buf[content_start + 4..content_start + 8].try_into().unwrap());
    let table_start = content_start + 8;

    for i in 0..entry_count as usize {
        let at = table_start + i * 4;
        if at + 4 > buf.len() {
            return Err(Error::truncated("stco entry past end of buffer"));
        }
        let offset = u32::from_be_bytes(buf[at..at + 4].try_into().unwrap()) as u64;
        if offset >= threshold {
            let new_offset = apply_delta_u32(offset, delta)?;
            buf[at..at + 4].copy_from_slice(&new_offset.to_be_bytes());
            *rewritten += 1;
        }
    }
    Ok(())
}

fn rewrite_co64(buf: &mut [u8], co64: &Atom, threshold: u64, delta: i64, rewritten: &mut usize) -> Result<()> {
    let content_start = co64.content_pos() as usize;
    let entry_count = u32::from_be_bytes(buf[content_start + 4..content_start + 8].try_into().unwrap());
    let table_start = content_start + 8;

    for i in 0..entry_count as usize {
        let at = table_start + i * 8;
        if at + 8 > buf.len() {
            return Err(Error::truncated("co64 entry past end of buffer"));
        }
        let offset = u64::from_be_bytes(buf[at..at + 8].try_into().unwrap());
        if offset >= threshold {
            let new_offset = (offset as i64 + delta) as u64;
            buf[at..at + 8].copy_from_slice(&new_offset.to_be_bytes());
            *rewritten += 1;
        }
    }
    Ok(())
}

fn apply_delta_u32(offset: u64, delta: i64) -> Result<u32> {
    let new_offset = offset as i64 + delta;
    if new_offset < 0 || new_offset as u64 > u32::MAX as u64 {
        return Err(Error::offset_overflow(format!(
            "stco entry {} + {} overflows 32 bits; needs co64 upgrade",
            offset, delta
        )));
    }
    Ok(new_offset as u32)
}
