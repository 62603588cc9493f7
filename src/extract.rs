//! Pulls one track's elementary stream out of a stems container and
//! synthesizes a minimal, standalone, playable MP4 around it, reusing
//! the source's `stsd` verbatim so no re-encoding is ever needed.

use crate::atom::head::{build_atom, Head, Size};
use crate::atom::ident::{
    DINF, DREF, FTYP, HDLR, MDAT, MDHD, MINF, MOOV, MVHD, SMHD, STBL, STCO, STSC, STSD, STSZ, STTS, TKHD, TRAK, URL,
};
use crate::atom::tree::{self, find_ftyp, find_mdat, find_moov};
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::sample::{decode_sample_map, ChunkOffsets, SampleMap, SampleSizes};

/// Summary returned by `get_track_info` for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub index: usize,
    pub sample_count: u32,
    pub duration_sec_milli: u64, // duration_sec * 1000, rounded; see `duration_sec()`
    pub timescale: u32,
    pub error: Option<String>,
}

impl TrackInfo {
    pub fn duration_sec(&self) -> f64 {
        self.duration_sec_milli as f64 / 1000.0
    }
}

/// Below this sample count a track is assumed to be a non-audio/metadata
/// track and is skipped by `extract_all_tracks`.
const MIN_AUDIO_SAMPLE_COUNT: u32 = 100;

fn nth_trak(bytes: &[u8], track_index: usize) -> Result<tree::Atom> {
    let cfg = ParseConfig::default();
    let top = tree::parse_tree(bytes, &cfg)?;
    let moov = find_moov(&top).ok_or_else(|| Error::missing_box(MOOV))?;
    moov.find_all(TRAK).nth(track_index).cloned().ok_or_else(|| Error::track_not_found(track_index))
}

fn elementary_stream_bytes(bytes: &[u8], map: &SampleMap) -> Result<Vec<u8>> {
    let samples = map.iter_samples()?;
    let mut out = Vec::with_capacity(map.sample_sizes.total() as usize);
    for (offset, size) in samples {
        let start = offset as usize;
        let end = start + size as usize;
        if end > bytes.len() {
            return Err(Error::truncated("sample data extends past end of source buffer"));
        }
        out.extend_from_slice(&bytes[start..end]);
    }
    Ok(out)
}

fn build_ftyp() -> Vec<u8> {
    let mut content = Vec::with_capacity(16);
    content.extend_from_slice(b"M4A "); // major brand
    content.extend_from_slice(&0u32.to_be_bytes()); // minor version
    content.extend_from_slice(b"M4A "); // compatible brands
    content.extend_from_slice(b"mp42");
    content.extend_from_slice(b"isom");
    build_atom(FTYP, &content)
}

fn build_mvhd(timescale: u32, duration: u64) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]); // version + flags
    content.extend_from_slice(&0u32.to_be_bytes()); // creation
    content.extend_from_slice(&0u32.to_be_bytes()); // modification
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&(duration as u32).to_be_bytes());
    content.extend_from_slice(&0x00010000u32.to_be_bytes()); // rate 1.0
    content.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    content.extend_from_slice(&0u16.to_be_bytes()); // reserved
    content.extend_from_slice(&[0u8; 8]); // reserved
    let matrix: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];
    for m in matrix {
        content.extend_from_slice(&m.to_be_bytes());
    }
    content.extend_from_slice(&[0u8; 24]); // predefined
    content.extend_from_slice(&2u32.to_be_bytes()); // next_track_id
    build_atom(MVHD, &content)
}

fn build_tkhd(duration: u64) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0x00, 0x00, 0x00, 0x07]); // version 0, flags: enabled|in_movie|in_preview
    content.extend_from_slice(&0u32.to_be_bytes()); // creation
    content.extend_from_slice(&0u32.to_be_bytes()); // modification
    content.extend_from_slice(&1u32.to_be_bytes()); // track_id
    content.extend_from_slice(&0u32.to_be_bytes()); // reserved
    content.extend_from_slice(&(duration as u32).to_be_bytes());
    content.extend_from_slice(&[0u8; 8]); // reserved
    content.extend_from_slice(&0u16.to_be_bytes()); // layer
    content.extend_from_slice(&0u16.to_be_bytes()); // alternate_group
    content.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0 (audio track)
    content.extend_from_slice(&0u16.to_be_bytes()); // reserved
    let matrix: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];
    for m in matrix {
        content.extend_from_slice(&m.to_be_bytes());
    }
    content.extend_from_slice(&0u32.to_be_bytes()); // width
    content.extend_from_slice(&0u32.to_be_bytes()); // height
    build_atom(TKHD, &content)
}

fn build_mdhd(timescale: u32, duration: u64) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]); // version + flags
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&(duration as u32).to_be_bytes());
    content.extend_from_slice(&0x55c4u16.to_be_bytes()); // language: und
    content.extend_from_slice(&0u16.to_be_bytes()); // quality
    build_atom(MDHD, &content)
}

fn build_hdlr_soun() -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]); // version + flags
    content.extend_from_slice(&0u32.to_be_bytes()); // predefined
    content.extend_from_slice(b"soun");
    content.extend_from_slice(&[0u8; 12]); // reserved
    content.push(0); // empty component name
    build_atom(HDLR, &content)
}

fn build_smhd() -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]); // version + flags
    content.extend_from_slice(&0u16.to_be_bytes()); // balance
    content.extend_from_slice(&0u16.to_be_bytes()); // reserved
    build_atom(SMHD, &content)
}

fn build_self_contained_dinf() -> Vec<u8> {
    let url = build_atom(URL, &[0, 0, 0, 1]); // version 0, flags=1: media data is in this same file
    let mut dref_content = Vec::new();
    dref_content.extend_from_slice(&[0u8; 4]); // version + flags
    dref_content.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    dref_content.extend_from_slice(&url);
    let dref = build_atom(DREF, &dref_content);
    build_atom(DINF, &dref)
}

fn build_stts(map: &SampleMap) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]);
    content.extend_from_slice(&(map.stts.len() as u32).to_be_bytes());
    for entry in &map.stts {
        content.extend_from_slice(&entry.count.to_be_bytes());
        content.extend_from_slice(&entry.delta.to_be_bytes());
    }
    build_atom(STTS, &content)
}

fn build_stsc_single_chunk(total_samples: u32) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]);
    content.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    content.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
    content.extend_from_slice(&total_samples.to_be_bytes()); // samples_per_chunk
    content.extend_from_slice(&1u32.to_be_bytes()); // sample_description_index
    build_atom(STSC, &content)
}

fn build_stsz(sizes: &SampleSizes) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]);
    match sizes {
        SampleSizes::Fixed { size, count } => {
            content.extend_from_slice(&size.to_be_bytes());
            content.extend_from_slice(&count.to_be_bytes());
        }
        SampleSizes::Variable(v) => {
            content.extend_from_slice(&0u32.to_be_bytes());
            content.extend_from_slice(&(v.len() as u32).to_be_bytes());
            for s in v {
                content.extend_from_slice(&s.to_be_bytes());
            }
        }
    }
    build_atom(STSZ, &content)
}

/// Build a placeholder single-entry `stco`, returning the bytes plus the
/// byte offset (within those bytes) of the 4-byte offset field to patch
/// once the final chunk position is known.
fn build_stco_placeholder() -> (Vec<u8>, usize) {
    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]);
    content.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    content.extend_from_slice(&0u32.to_be_bytes()); // offset placeholder
    let bytes = build_atom(STCO, &content);
    let patch_at = bytes.len() - 4;
    (bytes, patch_at)
}

/// Synthesize a standalone MP4 containing exactly the elementary stream
/// described by `map`/`stream`. Reuses `map.stsd_raw` verbatim.
fn synthesize_mp4(map: &SampleMap, stream: &[u8]) -> Vec<u8> {
    let total_samples = map.sample_count();

    let stsd = build_atom(STSD, &map.stsd_raw);
    let stsc = build_stsc_single_chunk(total_samples);
    let stsz = build_stsz(&map.sample_sizes);
    let stts = build_stts(map);
    let (stco, stco_patch_rel) = build_stco_placeholder();

    let stbl_content = {
        let mut c = Vec::new();
        c.extend_from_slice(&stsd);
        c.extend_from_slice(&stsc);
        c.extend_from_slice(&stsz);
        c.extend_from_slice(&stts);
        c.extend_from_slice(&stco);
        c
    };
    let stco_rel_in_stbl = stbl_content.len() - stco.len() + stco_patch_rel;
    let stbl = build_atom(STBL, &stbl_content);

    let minf_content = {
        let mut c = Vec::new();
        c.extend_from_slice(&build_smhd());
        c.extend_from_slice(&build_self_contained_dinf());
        c.extend_from_slice(&stbl);
        c
    };
    let stco_rel_in_minf = minf_content.len() - stbl.len() + stco_rel_in_stbl;
    let minf = build_atom(MINF, &minf_content);

    let mdia_content = {
        let mut c = Vec::new();
        c.extend_from_slice(&build_mdhd(map.timescale, map.duration));
        c.extend_from_slice(&build_hdlr_soun());
        c.extend_from_slice(&minf);
        c
    };
    let stco_rel_in_mdia = mdia_content.len() - minf.len() + stco_rel_in_minf;
    let mdia = build_atom(crate::atom::ident::MDIA, &mdia_content);

    let trak_content = {
        let mut c = Vec::new();
        c.extend_from_slice(&build_tkhd(map.duration));
        c.extend_from_slice(&mdia);
        c
    };
    let stco_rel_in_trak = trak_content.len() - mdia.len() + stco_rel_in_mdia;
    let trak = build_atom(TRAK, &trak_content);

    let moov_content = {
        let mut c = Vec::new();
        c.extend_from_slice(&build_mvhd(map.timescale, map.duration));
        c.extend_from_slice(&trak);
        c
    };
    let stco_rel_in_moov = moov_content.len() - trak.len() + stco_rel_in_trak;
    let moov = build_atom(MOOV, &moov_content);

    let ftyp = build_ftyp();

    let mut out = Vec::with_capacity(ftyp.len() + moov.len() + 8 + stream.len());
    out.extend_from_slice(&ftyp);
    let moov_start = out.len();
    out.extend_from_slice(&moov);

    // Past ftyp + moov + the mdat header, sample data begins.
    let mdat_content_start = (out.len() + 8) as u32;
    let stco_abs = moov_start + stco_rel_in_moov;
    out[stco_abs..stco_abs + 4].copy_from_slice(&mdat_content_start.to_be_bytes());

    let mdat_head = {
        let head = Head { size: Size::from_content_len(stream.len() as u64), fourcc: MDAT };
        let mut h = Vec::new();
        crate::atom::head::write_head(&mut h, &head).expect("writing to a Vec never fails");
        h
    };
    out.extend_from_slice(&mdat_head);
    out.extend_from_slice(stream);

    out
}

/// Extract `track_index` (0-based) into a standalone, playable MP4.
pub fn extract_track(bytes: &[u8], track_index: usize) -> Result<Vec<u8>> {
    let trak = nth_trak(bytes, track_index)?;
    let map = decode_sample_map(bytes, &trak)?;
    let stream = elementary_stream_bytes(bytes, &map)?;
    Ok(synthesize_mp4(&map, &stream))
}

/// Extract every track whose sample map reports at least 100 samples,
/// skipping (and logging) the rest.
pub fn extract_all_tracks(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let cfg = ParseConfig::default();
    let top = tree::parse_tree(bytes, &cfg)?;
    let moov = find_moov(&top).ok_or_else(|| Error::missing_box(MOOV))?;

    let mut outputs = Vec::new();
    for (index, trak) in moov.find_all(TRAK).enumerate() {
        match decode_sample_map(bytes, trak) {
            Ok(map) if map.sample_count() >= MIN_AUDIO_SAMPLE_COUNT => {
                match elementary_stream_bytes(bytes, &map) {
                    Ok(stream) => outputs.push(synthesize_mp4(&map, &stream)),
                    Err(e) => log::warn!("skipping track {}: {}", index, e),
                }
            }
            Ok(map) => {
                log::warn!(
                    "skipping track {}: only {} samples (< {})",
                    index,
                    map.sample_count(),
                    MIN_AUDIO_SAMPLE_COUNT
                );
            }
            Err(e) => log::warn!("skipping track {}: {}", index, e),
        }
    }
    Ok(outputs)
}

/// Report `{index, sample_count, duration_sec, timescale}` for every track,
/// recording per-track decode failures in `error` instead of aborting.
pub fn get_track_info(bytes: &[u8]) -> Result<Vec<TrackInfo>> {
    let cfg = ParseConfig::default();
    let top = tree::parse_tree(bytes, &cfg)?;
    let moov = find_moov(&top).ok_or_else(|| Error::missing_box(MOOV))?;

    let mut infos = Vec::new();
    for (index, trak) in moov.find_all(TRAK).enumerate() {
        match decode_sample_map(bytes, trak) {
            Ok(map) => infos.push(TrackInfo {
                index,
                sample_count: map.sample_count(),
                duration_sec_milli: (map.duration_sec() * 1000.0).round() as u64,
                timescale: map.timescale,
                error: None,
            }),
            Err(e) => infos.push(TrackInfo {
                index,
                sample_count: 0,
                duration_sec_milli: 0,
                timescale: 0,
                error: Some(e.to_string()),
            }),
        }
    }
    Ok(infos)
}

/// Whether `bytes` walks as `ftyp` then (eventually) `moov`/`mdat`, the
/// minimal well-formedness check a playable MP4 must satisfy.
pub fn has_ftyp_then_moov_and_mdat(bytes: &[u8]) -> Result<bool> {
    let top = tree::parse_tree_default(bytes)?;
    Ok(find_ftyp(&top).map(|a| a.pos()).unwrap_or(u64::MAX) == 0
        && find_moov(&top).is_some()
        && find_mdat(&top).is_some())
}
