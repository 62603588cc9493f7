//! Inject, replace, or remove nested atoms at `moov/udta/stem` and
//! `moov/udta/meta/ilst/*`, creating missing intermediate containers as
//! needed, then propagating the resulting size delta up the ancestor
//! chain and through the chunk-offset tables.

use crate::atom::data::Data;
use crate::atom::head::{build_atom, write_head, Head, Size};
use crate::atom::ident::{DataIdent, DATA, FREEFORM, HDLR, ILST, MEAN, META, MOOV, NAME, STEM, TRAK, UDTA};
use crate::atom::tree::{self, Atom};
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::rewrite::rewrite_chunk_offsets;

/// Serialize just the header bytes for a box of `content_len` body bytes.
fn head_bytes(fourcc: crate::atom::ident::Fourcc, content_len: u64) -> Vec<u8> {
    let head = Head { size: Size::from_content_len(content_len), fourcc };
    let mut out = Vec::new();
    write_head(&mut out, &head).expect("writing to a Vec never fails");
    out
}

/// `hdlr` body required inside a freshly created `meta` atom: version/flags
/// + component type + subtype `mdir` + manufacturer `appl` + flags + flags
/// mask + an empty (Pascal-style) component name.
fn meta_hdlr_bytes() -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + 20 + 1);
    body.extend_from_slice(&[0u8; 4]); // version + flags
    body.extend_from_slice(&[0u8; 4]); // component type
    body.extend_from_slice(b"mdir"); // component subtype
    body.extend_from_slice(b"appl"); // component manufacturer
    body.extend_from_slice(&[0u8; 4]); // component flags
    body.extend_from_slice(&[0u8; 4]); // component flags mask
    body.push(0); // component name

    build_atom(HDLR, &body)
}

/// Encode a single `ilst` child (either a plain-fourcc item or a `----`
/// free-form item) for `ident` wrapping `data`, matching the wire layout
/// `examples/saecki-mp4ameta/src/atom/metaitem.rs` parses.
fn encode_meta_item(ident: &DataIdent, data: &Data) -> Vec<u8> {
    let mut data_bytes = Vec::new();
    data.write(&mut data_bytes).expect("writing to a Vec never fails");

    match ident {
        DataIdent::Fourcc(fourcc) => build_atom(*fourcc, &data_bytes),
        DataIdent::Freeform { mean, name } => {
            let mut mean_body = Vec::with_capacity(4 + mean.len());
            mean_body.extend_from_slice(&[0u8; 4]);
            mean_body.extend_from_slice(mean.as_bytes());
            let mean_bytes = build_atom(MEAN, &mean_body);

            let mut name_body = Vec::with_capacity(4 + name.len());
            name_body.extend_from_slice(&[0u8; 4]);
            name_body.extend_from_slice(name.as_bytes());
            let name_bytes = build_atom(NAME, &name_body);

            let mut content = Vec::with_capacity(mean_bytes.len() + name_bytes.len() + data_bytes.len());
            content.extend_from_slice(&mean_bytes);
            content.extend_from_slice(&name_bytes);
            content.extend_from_slice(&data_bytes);
            build_atom(FREEFORM, &content)
        }
    }
}

fn read_freeform_mean_name(bytes: &[u8], freeform: &Atom) -> Result<Option<(String, String)>> {
    let mean_child = freeform.find(MEAN);
    let name_child = freeform.find(NAME);
    match (mean_child, name_child) {
        (Some(mean), Some(name)) => {
            let mean_str = String::from_utf8(bytes[mean.content_pos() as usize + 4..mean.end() as usize].to_vec())?;
            let name_str = String::from_utf8(bytes[name.content_pos() as usize + 4..name.end() as usize].to_vec())?;
            Ok(Some((mean_str, name_str)))
        }
        _ => Ok(None),
    }
}

fn item_ident(bytes: &[u8], item: &Atom) -> Result<DataIdent> {
    if item.fourcc() == FREEFORM {
        match read_freeform_mean_name(bytes, item)? {
            Some((mean, name)) => Ok(DataIdent::Freeform { mean, name }),
            None => Err(Error::invalid_container("free-form atom missing mean/name children")),
        }
    } else {
        Ok(DataIdent::Fourcc(item.fourcc()))
    }
}

fn find_item<'a>(bytes: &[u8], ilst: &'a Atom, ident: &DataIdent) -> Result<Option<&'a Atom>> {
    for child in &ilst.children {
        if &item_ident(bytes, child)? == ident {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

/// Splice `new_bytes` in place of `buf[splice_start..splice_end]`, rewrite
/// every enclosing container's size field by the resulting delta (outermost
/// last so earlier writes don't shift later offsets), and correct every
/// `stco`/`co64` entry that pointed past the original `moov` end.
fn splice_and_propagate(
    buf: &[u8],
    splice_start: u64,
    splice_end: u64,
    new_bytes: &[u8],
    ancestors: &[&Atom],
    moov: &Atom,
) -> Result<Vec<u8>> {
    let delta = new_bytes.len() as i64 - (splice_end - splice_start) as i64;
    let moov_end = moov.end();

    let mut out = Vec::with_capacity((buf.len() as i64 + delta).max(0) as usize);
    out.extend_from_slice(&buf[..splice_start as usize]);
    out.extend_from_slice(new_bytes);
    out.extend_from_slice(&buf[splice_end as usize..]);

    for ancestor in ancestors {
        let new_len = (ancestor.len() as i64 + delta) as u64;
        patch_size_field(&mut out, ancestor, new_len);
    }

    if delta != 0 {
        let cfg = ParseConfig::default();
        let new_moov_head = tree::parse(&out, moov.pos(), moov.pos() + (moov.len() as i64 + delta) as u64)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid_container("moov atom missing after mutation"))?;
        let new_moov = tree::walk(&out, new_moov_head, &cfg, 0)?;
        rewrite_chunk_offsets(&mut out, &new_moov, moov_end, delta)?;
    }

    Ok(out)
}

fn patch_size_field(buf: &mut [u8], atom: &Atom, new_len: u64) {
    let pos = atom.pos() as usize;
    if atom.bounds.head.size.ext() {
        buf[pos + 8..pos + 16].copy_from_slice(&new_len.to_be_bytes());
    } else {
        buf[pos..pos + 4].copy_from_slice(&(new_len as u32).to_be_bytes());
    }
}

fn parse_moov(bytes: &[u8]) -> Result<Atom> {
    let cfg = ParseConfig::default();
    let top = tree::parse_tree(bytes, &cfg)?;
    tree::find_moov(&top).cloned().ok_or_else(|| Error::missing_box(MOOV))
}

/// Ensure `moov/udta/meta/ilst` exists and contains a child keyed by
/// `ident`, writing `data` into it: an existing match is replaced in
/// place, otherwise the item is appended at the end of `ilst`.
pub fn put_ilst_atom(bytes: &[u8], ident: &DataIdent, data: &Data) -> Result<Vec<u8>> {
    let moov = parse_moov(bytes)?;
    let item_bytes = encode_meta_item(ident, data);

    let udta = moov.find(UDTA);
    let meta = udta.and_then(|u| u.find(META));
    let ilst = meta.and_then(|m| m.find(ILST));

    if let Some(ilst) = ilst {
        if let Some(existing) = find_item(bytes, ilst, ident)? {
            log::debug!("replacing existing ilst item '{}'", ident);
            let ancestors = [ilst, meta.unwrap(), udta.unwrap(), &moov];
            return splice_and_propagate(bytes, existing.pos(), existing.end(), &item_bytes, &ancestors, &moov);
        }
        log::debug!("appending new ilst item '{}'", ident);
        let ancestors = [ilst, meta.unwrap(), udta.unwrap(), &moov];
        return splice_and_propagate(bytes, ilst.end(), ilst.end(), &item_bytes, &ancestors, &moov);
    }

    let mut ilst_content = item_bytes;
    let ilst_bytes = {
        let mut out = head_bytes(ILST, ilst_content.len() as u64);
        out.append(&mut ilst_content);
        out
    };

    if let Some(meta) = meta {
        log::debug!("creating ilst under existing meta");
        let ancestors = [meta, udta.unwrap(), &moov];
        return splice_and_propagate(bytes, meta.end(), meta.end(), &ilst_bytes, &ancestors, &moov);
    }

    let new_meta_bytes = {
        let mut content = vec![0u8; 4]; // meta version/flags
        content.extend_from_slice(&meta_hdlr_bytes());
        content.extend_from_slice(&ilst_bytes);
        let mut out = head_bytes(META, content.len() as u64);
        out.extend_from_slice(&content);
        out
    };

    if let Some(udta) = udta {
        log::debug!("creating meta under existing udta");
        let ancestors = [udta, &moov];
        return splice_and_propagate(bytes, udta.end(), udta.end(), &new_meta_bytes, &ancestors, &moov);
    }

    log::debug!("creating udta/meta/hdlr/ilst from scratch under moov");
    let new_udta_bytes = {
        let mut out = head_bytes(UDTA, new_meta_bytes.len() as u64);
        out.extend_from_slice(&new_meta_bytes);
        out
    };
    let ancestors = [&moov];
    splice_and_propagate(bytes, moov.end(), moov.end(), &new_udta_bytes, &ancestors, &moov)
}

/// Read the `data` payload of the `moov/udta/meta/ilst` child keyed by
/// `ident`, if present.
pub fn read_ilst_atom<'a>(bytes: &'a [u8], ident: &DataIdent) -> Result<Option<Data>> {
    let moov = parse_moov(bytes)?;
    let ilst = moov.find(UDTA).and_then(|u| u.find(META)).and_then(|m| m.find(ILST));
    let Some(ilst) = ilst else { return Ok(None) };
    let Some(item) = find_item(bytes, ilst, ident)? else { return Ok(None) };
    let data_child = item.find(DATA).ok_or_else(|| Error::missing_box(DATA))?;
    let content = &bytes[data_child.content_pos() as usize..data_child.end() as usize];
    let mut cursor = std::io::Cursor::new(content);
    Ok(Some(Data::parse(&mut cursor, data_child.bounds.head.content_len())?))
}

/// Ensure `moov/udta` exists and write a `stem` atom (plain atom, raw JSON
/// body) as its direct child, replacing any existing `stem`.
pub fn put_stem_atom(bytes: &[u8], json_bytes: &[u8]) -> Result<Vec<u8>> {
    let moov = parse_moov(bytes)?;
    let udta = moov.find(UDTA);

    let stem_bytes = {
        let mut out = head_bytes(STEM, json_bytes.len() as u64);
        out.extend_from_slice(json_bytes);
        out
    };

    if let Some(udta) = udta {
        if let Some(existing_stem) = udta.find(STEM) {
            log::debug!("replacing existing udta/stem atom");
            let ancestors = [udta, &moov];
            return splice_and_propagate(bytes, existing_stem.pos(), existing_stem.end(), &stem_bytes, &ancestors, &moov);
        }
        log::debug!("appending stem atom to existing udta");
        let ancestors = [udta, &moov];
        return splice_and_propagate(bytes, udta.end(), udta.end(), &stem_bytes, &ancestors, &moov);
    }

    log::debug!("creating udta/stem from scratch under moov");
    let new_udta_bytes = {
        let mut out = head_bytes(UDTA, stem_bytes.len() as u64);
        out.extend_from_slice(&stem_bytes);
        out
    };
    let ancestors = [&moov];
    splice_and_propagate(bytes, moov.end(), moov.end(), &new_udta_bytes, &ancestors, &moov)
}

pub fn read_stem_atom(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let moov = parse_moov(bytes)?;
    let Some(stem) = moov.find(UDTA).and_then(|u| u.find(STEM)) else { return Ok(None) };
    Ok(Some(bytes[stem.content_pos() as usize..stem.end() as usize].to_vec()))
}

/// Clear bit 0 (`track enabled`) of a track's `tkhd.flags`. Exposed but
/// not wired into any other operation.
pub fn disable_track(bytes: &[u8], track_index: usize) -> Result<Vec<u8>> {
    let moov = parse_moov(bytes)?;
    let trak = moov
        .find_all(TRAK)
        .nth(track_index)
        .ok_or_else(|| Error::track_not_found(track_index))?;
    let tkhd = trak.find(crate::atom::ident::TKHD).ok_or_else(|| Error::missing_box(crate::atom::ident::TKHD))?;

    // tkhd full-head flags are the 3 bytes right after the version byte.
    let flags_pos = tkhd.content_pos() as usize + 1;
    let mut out = bytes.to_vec();
    out[flags_pos + 2] &= !0x01;
    Ok(out)
}
