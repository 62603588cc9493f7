//! A library for parsing and surgically editing multi-track MP4/M4A
//! "stems" files: one mixdown track plus N stem tracks, iTunes-style
//! metadata, and free-form atoms carrying lyrics, vocal pitch curves and
//! onset timestamps.
//!
//! The crate is the container-level engine only: atom tree parsing,
//! single-track extraction into a standalone playable MP4, and metadata
//! mutation with chunk-offset maintenance. Encoding, decoding, lyric
//! rendering and CLI plumbing are out of scope.
//!
//! Every operation here is synchronous and buffer-pure: it takes a byte
//! slice and returns a new byte sequence. There is no file I/O in this
//! crate; callers that want to edit a file in place read it fully,
//! call a `write_*` function, and write the result back (ideally via a
//! temp-file-then-rename discipline).

pub mod atom;
pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod mutate;
pub mod rewrite;
pub mod sample;

#[cfg(test)]
mod test_fixture;

pub use atom::{Atom, AtomBounds, Data, DataIdent, Fourcc};
pub use config::ParseConfig;
pub use error::{Error, ErrorKind, Result};
pub use extract::{extract_all_tracks, extract_track, get_track_info, TrackInfo};
pub use sample::SampleMap;

/// Parse the full atom tree of `bytes`.
pub fn parse_tree(bytes: &[u8], cfg: &ParseConfig) -> Result<Vec<Atom>> {
    atom::tree::parse_tree(bytes, cfg)
}

/// `parse_tree` with [`ParseConfig::default`].
pub fn parse_tree_default(bytes: &[u8]) -> Result<Vec<Atom>> {
    atom::tree::parse_tree_default(bytes)
}

/// Write (inject or replace) an iTunes free-form (`----`) atom keyed by
/// `(mean, name)` under `moov/udta/meta/ilst`. `data_type` follows the
/// iTunes well-known data types: `1` for UTF-8 text, `0` for binary,
/// `21` for a big-endian integer.
pub fn write_freeform(bytes: &[u8], mean: &str, name: &str, data_type: u32, payload: &[u8]) -> Result<Vec<u8>> {
    let ident = DataIdent::freeform(mean, name);
    let data = decode_payload_by_type(data_type, payload)?;
    mutate::put_ilst_atom(bytes, &ident, &data)
}

/// Read a free-form (`----`) atom's raw payload bytes, if present.
pub fn read_freeform(bytes: &[u8], mean: &str, name: &str) -> Result<Option<Vec<u8>>> {
    let ident = DataIdent::freeform(mean, name);
    Ok(mutate::read_ilst_atom(bytes, &ident)?.map(|d| d.as_bytes().to_vec()))
}

fn decode_payload_by_type(data_type: u32, payload: &[u8]) -> Result<Data> {
    match data_type {
        atom::data::TYPE_UTF8 => Ok(Data::Utf8(String::from_utf8(payload.to_vec())?)),
        atom::data::TYPE_BE_SIGNED => Ok(Data::BeSigned(payload.to_vec())),
        atom::data::TYPE_RESERVED => Ok(Data::Reserved(payload.to_vec())),
        other => Ok(Data::Unknown { code: other, data: payload.to_vec() }),
    }
}

/// Write a plain iTunes text atom (`©nam`, `©ART`, `©alb`, ...).
pub fn write_itunes_text(bytes: &[u8], fourcc: [u8; 4], text: &str) -> Result<Vec<u8>> {
    let ident = DataIdent::fourcc(fourcc);
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_text(text))
}

/// Read a plain iTunes text atom's value.
pub fn read_itunes_text(bytes: &[u8], fourcc: [u8; 4]) -> Result<Option<String>> {
    let ident = DataIdent::fourcc(fourcc);
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_text(&data)?.to_owned())),
        None => Ok(None),
    }
}

/// Write `tmpo`: data-type `21`, big-endian u16.
pub fn write_tempo(bytes: &[u8], bpm: u16) -> Result<Vec<u8>> {
    let ident = DataIdent::fourcc(*b"tmpo");
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_tempo(bpm))
}

pub fn read_tempo(bytes: &[u8]) -> Result<Option<u16>> {
    let ident = DataIdent::fourcc(*b"tmpo");
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_tempo(&data)?)),
        None => Ok(None),
    }
}

/// Write `trkn`: data-type `0`, 8-byte `(0, track_no, track_of, 0)` payload.
pub fn write_track_number(bytes: &[u8], track_no: u16, track_of: u16) -> Result<Vec<u8>> {
    let ident = DataIdent::fourcc(*b"trkn");
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_track_number(track_no, track_of))
}

pub fn read_track_number(bytes: &[u8]) -> Result<Option<(u16, u16)>> {
    let ident = DataIdent::fourcc(*b"trkn");
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_track_number(&data)?)),
        None => Ok(None),
    }
}

/// Write the free-form `----:com.apple.iTunes:initialkey` musical key atom.
pub fn write_initial_key(bytes: &[u8], key: &str) -> Result<Vec<u8>> {
    let ident = DataIdent::freeform("com.apple.iTunes", "initialkey");
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_initial_key(key))
}

pub fn read_initial_key(bytes: &[u8]) -> Result<Option<String>> {
    let ident = DataIdent::freeform("com.apple.iTunes", "initialkey");
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_initial_key(&data)?.to_owned())),
        None => Ok(None),
    }
}

/// Write lyrics (`----:com.stems:kara`) as UTF-8 JSON.
pub fn write_lyrics(bytes: &[u8], lyrics: &codec::Lyrics) -> Result<Vec<u8>> {
    let ident = DataIdent::freeform("com.stems", "kara");
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_lyrics(lyrics)?)
}

pub fn read_lyrics(bytes: &[u8]) -> Result<Option<codec::Lyrics>> {
    let ident = DataIdent::freeform("com.stems", "kara");
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_lyrics(&data)?)),
        None => Ok(None),
    }
}

/// Write vocal pitch curve (`----:com.stems:vpch`).
pub fn write_vocal_pitch(bytes: &[u8], sample_rate_hz: u32, samples: &[codec::PitchSample]) -> Result<Vec<u8>> {
    let ident = DataIdent::freeform("com.stems", "vpch");
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_vocal_pitch(sample_rate_hz, samples))
}

pub fn read_vocal_pitch(bytes: &[u8]) -> Result<Option<(u32, Vec<codec::PitchSample>)>> {
    let ident = DataIdent::freeform("com.stems", "vpch");
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_vocal_pitch(&data)?)),
        None => Ok(None),
    }
}

/// Write onset timestamps (`----:com.stems:kons`).
pub fn write_onsets(bytes: &[u8], times_sec: &[f64]) -> Result<Vec<u8>> {
    let ident = DataIdent::freeform("com.stems", "kons");
    mutate::put_ilst_atom(bytes, &ident, &codec::encode_onsets(times_sec))
}

pub fn read_onsets_ms(bytes: &[u8]) -> Result<Option<Vec<u32>>> {
    let ident = DataIdent::freeform("com.stems", "kons");
    match mutate::read_ilst_atom(bytes, &ident)? {
        Some(data) => Ok(Some(codec::decode_onsets(&data)?)),
        None => Ok(None),
    }
}

/// Write the stem metadata JSON document at `moov/udta/stem`.
pub fn write_stem_json(bytes: &[u8], json: &[u8]) -> Result<Vec<u8>> {
    mutate::put_stem_atom(bytes, json)
}

pub fn read_stem_json(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    mutate::read_stem_atom(bytes)
}

/// Clear bit 0 of `tkhd.flags` for the given track, disabling it.
/// Not wired into any other operation; callers opt in explicitly.
pub fn disable_track(bytes: &[u8], track_index: usize) -> Result<Vec<u8>> {
    mutate::disable_track(bytes, track_index)
}
