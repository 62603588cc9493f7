//! Minimal well-formed MP4 byte buffers shared by unit tests across the
//! crate, in place of an on-disk fixture corpus: every test builds its
//! input bytes programmatically.

use crate::atom::head::build_atom;
use crate::atom::ident::{FTYP, HDLR, MDAT, MDHD, MDIA, MINF, MOOV, MVHD, STBL, STCO, STSC, STSD, STSZ, STTS, TKHD, TRAK};

const TIMESCALE: u32 = 44100;
const SAMPLE_SIZE: u32 = 4;
const DELTA: u32 = 1024;

fn full_box(fourcc: crate::atom::ident::Fourcc, version: u8, flags: [u8; 3], rest: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(4 + rest.len());
    content.push(version);
    content.extend_from_slice(&flags);
    content.extend_from_slice(rest);
    build_atom(fourcc, &content)
}

fn mdhd(duration: u64) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes()); // creation
    rest.extend_from_slice(&0u32.to_be_bytes()); // modification
    rest.extend_from_slice(&TIMESCALE.to_be_bytes());
    rest.extend_from_slice(&(duration as u32).to_be_bytes());
    rest.extend_from_slice(&0x55c4u16.to_be_bytes()); // language: und
    rest.extend_from_slice(&0u16.to_be_bytes()); // quality
    full_box(MDHD, 0, [0; 3], &rest)
}

fn hdlr_soun() -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes()); // predefined
    rest.extend_from_slice(b"soun");
    rest.extend_from_slice(&[0u8; 12]); // reserved
    rest.push(0); // empty component name
    full_box(HDLR, 0, [0; 3], &rest)
}

fn tkhd(track_id: u32, duration: u64) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes()); // creation
    rest.extend_from_slice(&0u32.to_be_bytes()); // modification
    rest.extend_from_slice(&track_id.to_be_bytes());
    rest.extend_from_slice(&0u32.to_be_bytes()); // reserved
    rest.extend_from_slice(&(duration as u32).to_be_bytes());
    rest.extend_from_slice(&[0u8; 8]); // reserved
    rest.extend_from_slice(&0u16.to_be_bytes()); // layer
    rest.extend_from_slice(&0u16.to_be_bytes()); // alternate_group
    rest.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    rest.extend_from_slice(&0u16.to_be_bytes()); // reserved
    // unity matrix
    let matrix: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];
    for m in matrix {
        rest.extend_from_slice(&m.to_be_bytes());
    }
    rest.extend_from_slice(&0u32.to_be_bytes()); // width (fixed-point, unused by this format)
    rest.extend_from_slice(&0u32.to_be_bytes()); // height
    full_box(TKHD, 0, [0x00, 0x00, 0x07], &rest) // enabled | in_movie | in_preview
}

fn mvhd(duration: u64, next_track_id: u32) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&0u32.to_be_bytes()); // creation
    rest.extend_from_slice(&0u32.to_be_bytes()); // modification
    rest.extend_from_slice(&TIMESCALE.to_be_bytes());
    rest.extend_from_slice(&(duration as u32).to_be_bytes());
    rest.extend_from_slice(&0x00010000u32.to_be_bytes()); // rate 1.0
    rest.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    rest.extend_from_slice(&0u16.to_be_bytes()); // reserved
    rest.extend_from_slice(&[0u8; 8]); // reserved
    let matrix: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];
    for m in matrix {
        rest.extend_from_slice(&m.to_be_bytes());
    }
    rest.extend_from_slice(&[0u8; 24]); // predefined
    rest.extend_from_slice(&next_track_id.to_be_bytes());
    full_box(MVHD, 0, [0; 3], &rest)
}

fn stsd_placeholder() -> Vec<u8> {
    let entry = build_atom(crate::atom::ident::Fourcc::new(*b"mp4a"), &[0u8; 16]);
    let mut rest = Vec::new();
    rest.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    rest.extend_from_slice(&entry);
    full_box(STSD, 0, [0; 3], &rest)
}

fn stsc_single_chunk(samples_per_chunk: u32) -> Vec<u8> {
    let mut rest = Vec::new();
    rest.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    rest.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
    rest.extend_from_slice(&samples_per_chunk.to_be_bytes());
    rest.extend_from_slice(&1u32.to_be_bytes()); // sample_description_index
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
    rest.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    rest.extend_from_slice(&0u32.to_be_bytes()); // offset, patched later
    full_box(STCO, 0, [0; 3], &rest)
}

/// Build a minimal, well-formed multi-track stems-style MP4: `track_count`
/// tracks, each carrying `samples_per_track` fixed-size samples in its own
/// contiguous region of a single `mdat`. Every track shares `TIMESCALE`/
/// `SAMPLE_SIZE`/`DELTA` for simplicity; callers that need per-track variety
/// build directly from the `atom` helpers instead.
pub(crate) fn minimal_stems_file(track_count: u32, samples_per_track: u32) -> Vec<u8> {
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

        let minf_content = stbl;
        let minf = build_atom(MINF, &minf_content);

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

    // Track each trak's start offset within moov_content so we can locate
    // the absolute position of its stco entry after the full file is laid out.
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
        let head = crate::atom::head::Head {
            size: crate::atom::head::Size::from_content_len(mdat_content_len),
            fourcc: MDAT,
        };
        let mut h = Vec::new();
        crate::atom::head::write_head(&mut h, &head).unwrap();
        h
    };
    out.extend_from_slice(&mdat_head);
    for i in 0..track_count {
        // fill each track's region with a byte pattern that uniquely identifies (track, sample)
        // so extraction tests can assert on content, not just length.
        for s in 0..samples_per_track {
            let tag = (i as u8).wrapping_mul(31).wrapping_add(s as u8);
            out.extend_from_slice(&[tag; SAMPLE_SIZE as usize]);
        }
    }

    out
}

/// Find the byte offset, relative to the start of a fully built `trak`
/// atom's bytes, of its single `stco` offset entry, by re-parsing the
/// bytes we just built rather than threading the offset through every
/// nested builder call.
fn locate_stco_offset(trak_bytes: &[u8]) -> usize {
    let top = crate::atom::tree::parse(trak_bytes, 0, trak_bytes.len() as u64).unwrap();
    let trak = crate::atom::tree::walk(trak_bytes, top.into_iter().next().unwrap(), &crate::config::ParseConfig::default(), 0).unwrap();
    let stco = trak
        .find(MDIA)
        .unwrap()
        .find(MINF)
        .unwrap()
        .find(STBL)
        .unwrap()
        .find(STCO)
        .unwrap();
    // content_pos (after header) + 4 (version/flags) + 4 (entry_count) = first entry.
    (stco.content_pos() + 8) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::tree::{find_mdat, find_moov, parse_tree_default};

    #[test]
    fn builds_parseable_multi_track_file() {
        let file = minimal_stems_file(3, 20);
        let top = parse_tree_default(&file).unwrap();
        let moov = find_moov(&top).unwrap();
        assert_eq!(moov.find_all(TRAK).count(), 3);
        assert!(find_mdat(&top).is_some());
    }

    #[test]
    fn each_track_decodes_to_its_own_sample_region() {
        let file = minimal_stems_file(2, 5);
        let top = parse_tree_default(&file).unwrap();
        let moov = find_moov(&top).unwrap();

        for trak in moov.find_all(TRAK) {
            let map = crate::sample::decode_sample_map(&file, trak).unwrap();
            assert_eq!(map.sample_count(), 5);
            let samples = map.iter_samples().unwrap();
            assert_eq!(samples.len(), 5);
        }
    }
}
