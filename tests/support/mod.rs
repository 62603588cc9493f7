//! Shared fixture builder for integration tests: a minimal, well-formed
//! multi-track stems-style MP4, built programmatically (no on-disk corpus
//! ships with this crate) through stemtag's public `atom` API.

use stemtag::atom::head::{build_atom, write_head, Head, Size};
use stemtag::atom::ident::{
    Fourcc, FTYP, HDLR, MDAT, MDHD, MDIA, MINF, MOOV, MVHD, STBL, STCO, STSC, STSD, STSZ, STTS, TKHD, TRAK,
};
use stemtag::atom::tree;
use stemtag::config::ParseConfig;

const TIMESCALE: u32 = 44100;
const SAMPLE_SIZE: u32 = 4;
const DELTA: u32 = 1024;

fn full_box(fourcc: Fourcc, version: u8, flags: [u8; 3], rest: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(4 + rest.len());
    content.push(version);
    content.extend_from_slice(&flags);
    content.extend_from_slice(rest);
    build_atom(fourcc, &content)
}

fn mdhd(duration: u64) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&TIMESCALE.to_be_bytes());
    rest.extend_from_slice(&(duration as u32).to_be_bytes());
    rest.extend_from_slice(&0x55c4u16.to_be_bytes());
    rest.extend_from_slice(&0u16.to_be_bytes());
    full_box(MDHD, 0, [0; 3], &rest)
}

fn hdlr_soun() -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(b"soun");
    rest.extend_from_slice(&[0u8; 12]);
    rest.push(0);
    full_box(HDLR, 0, [0; 3], &rest)
}

fn tkhd(track_id: u32, duration: u64) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&track_id.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&(duration as u32).to_be_bytes());
    rest.extend_from_slice(&[0u8; 8]);
    rest.extend_from_slice(&0u16.to_be_bytes());
    rest.extend_from_slice(&0u16.to_be_bytes());
    rest.extend_from_slice(&0x0100u16.to_be_bytes());
    rest.extend_from_slice(&0u16.to_be_bytes());
    let matrix: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];
    for m in matrix {
        rest.extend_from_slice(&m.to_be_bytes());
    }
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes());
    full_box(TKHD, 0, [0x00, 0x00, 0x07], &rest)
}

fn mvhd(duration: u64, next_track_id: u32) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes());
    rest.extend_from_slice(&TIMESCALE.to_be_bytes());
    rest.extend_from_slice(&(duration as u32).to_be_bytes());
    rest.extend_from_slice(&0x00010000u32.to_be_bytes());
    rest.extend_from_slice(&0x0100u16.to_be_bytes());
    rest.extend_from_slice(&0u16.to_be_bytes());
    rest.extend_from_slice(&[0u8; 8]);
    let matrix: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];
    for m in matrix {
        rest.extend_from_slice(&m.to_be_bytes());
    }
    rest.extend_from_slice(&[0u8; 24]);
    rest.extend_from_slice(&next_track_id.to_be_bytes());
    full_box(MVHD, 0, [0; 3], &rest)
}

fn stsd_placeholder() -> Vec<u8> {
    let entry = build_atom(Fourcc::new(*b"mp4a"), &[0u8; 16]);
    let mut rest = Vec::new();
    rest.extend_from_slice(&1u32.to_be_bytes());
    rest.extend_from_slice(&entry);
    full_box(STSD, 0, [0; 3], &rest)
}

fn stsc_single_chunk(samples_per_chunk: u32) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&1u32.to_be_bytes());
    rest.extend_from_slice(&1u32.to_be_bytes());
    rest.extend_from_slice(&samples_per_chunk.to_be_bytes());
    rest.extend_from_slice(&1u32.to_be_bytes());
    full_box(STSC, 0, [0; 3], &rest)
}

fn stsz_fixed(sample_size: u32, count: u32) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&sample_size.to_be_bytes());
    rest.extend_from_slice(&count.to_be_bytes());
    full_box(STSZ, 0, [0; 3], &rest)
}

fn stts_single(count: u32, delta: u32) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&1u32.to_be_bytes());
    rest.extend_from_slice(&count.to_be_bytes());
    rest.extend_from_slice(&delta.to_be_bytes());
    full_box(STTS, 0, [0; 3], &rest)
}

fn stco_placeholder() -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&1u32.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes());
    full_box(STCO, 0, [0; 3], &rest)
}

/// Find the byte offset, relative to the start of a fully built `trak`
/// atom's bytes, of its single `stco` offset entry, by re-parsing the bytes
/// just built rather than threading the offset through every builder call.
fn locate_stco_offset(trak_bytes: &[u8]) -> usize {
    let top = tree::parse(trak_bytes, 0, trak_bytes.len() as u64).unwrap();
    let trak = tree::walk(trak_bytes, top.into_iter().next().unwrap(), &ParseConfig::default(), 0).unwrap();
    let stco = trak.find(MDIA).unwrap().find(MINF).unwrap().find(STBL).unwrap().find(STCO).unwrap();
    (stco.content_pos() + 8) as usize
}

/// Build a minimal, well-formed multi-track stems-style MP4: `track_count`
/// tracks, each carrying `samples_per_track` fixed-size samples in its own
/// contiguous region of a single `mdat`.
pub fn minimal_stems_file(track_count: u32, samples_per_track: u32) -> Vec<u8> {
    let duration = samples_per_track as u64 * DELTA as u64;
    let per_track_bytes = samples_per_track as u64 * SAMPLE_SIZE as u64;

    let mut trak_bodies = Vec::new();

    for i in 0..track_count {
        let stbl_content = {
            let mut c = Vec::new();
            c.extend_from_slice(&stsd_placeholder());
            c.extend_from_slice(&stsc_single_chunk(samples_per_track));
            c.extend_from_slice(&stsz_fixed(SAMPLE_SIZE, samples_per_track));
            c.extend_from_slice(&stts_single(samples_per_track, DELTA));
            c.extend_from_slice(&stco_placeholder());
            c
        };
        let stbl = build_atom(STBL, &stbl_content);
        let minf = build_atom(MINF, &stbl);

        let mdia_content = {
            let mut c = Vec::new();
            c.extend_from_slice(&mdhd(duration));
            c.extend_from_slice(&hdlr_soun());
            c.extend_from_slice(&minf);
            c
        };
        let mdia = build_atom(MDIA, &mdia_content);

        let trak_content = {
            let mut c = Vec::new();
            c.extend_from_slice(&tkhd(i + 1, duration));
            c.extend_from_slice(&mdia);
            c
        };
        trak_bodies.push(build_atom(TRAK, &trak_content));
    }

    let mvhd_bytes = mvhd(duration, track_count + 1);

    let mut moov_content = Vec::new();
    moov_content.extend_from_slice(&mvhd_bytes);

    let mut trak_starts = Vec::new();
    for trak_bytes in &trak_bodies {
        trak_starts.push(moov_content.len());
        moov_content.extend_from_slice(trak_bytes);
    }

    let moov = build_atom(MOOV, &moov_content);

    let ftyp_content = {
        let mut c = Vec::new();
        c.extend_from_slice(b"M4A ");
        c.extend_from_slice(&0u32.to_be_bytes());
        c.extend_from_slice(b"M4A ");
        c.extend_from_slice(b"mp42");
        c.extend_from_slice(b"isom");
        c
    };
    let ftyp = build_atom(FTYP, &ftyp_content);

    let mut out = Vec::new();
    out.extend_from_slice(&ftyp);
    let moov_start = out.len();
    out.extend_from_slice(&moov);

    let mdat_content_start = out.len() as u64 + 8;
    let mut track_absolute_offsets = Vec::new();
    let mut running = mdat_content_start;
    for _ in 0..track_count {
        track_absolute_offsets.push(running);
        running += per_track_bytes;
    }

    for (i, trak_start) in trak_starts.iter().enumerate() {
        let stco_rel_offset = locate_stco_offset(&trak_bodies[i]);
        let absolute_pos = moov_start + trak_start + stco_rel_offset;
        let value = track_absolute_offsets[i];
        out[absolute_pos..absolute_pos + 4].copy_from_slice(&(value as u32).to_be_bytes());
    }

    let mdat_content_len: u64 = track_count as u64 * per_track_bytes;
    let mdat_head = {
        let head = Head { size: Size::from_content_len(mdat_content_len), fourcc: MDAT };
        let mut h = Vec::new();
        write_head(&mut h, &head).unwrap();
        h
    };
    out.extend_from_slice(&mdat_head);
    for i in 0..track_count {
        for s in 0..samples_per_track {
            let tag = (i as u8).wrapping_mul(31).wrapping_add(s as u8);
            out.extend_from_slice(&[tag; SAMPLE_SIZE as usize]);
        }
    }

    out
}
