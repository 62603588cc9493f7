//! Codec layer: encodes and decodes the per-atom payloads this format's
//! metadata atoms carry.

use serde::{Deserialize, Serialize};

use crate::atom::data::Data;
use crate::error::{Error, Result};

/// Build the `data` sub-atom payload for a plain iTunes text atom
/// (`©nam`, `©ART`, `©alb`, ...): UTF-8, data-type code `1`.
pub fn encode_text(text: &str) -> Data {
    Data::Utf8(text.to_owned())
}

pub fn decode_text(data: &Data) -> Result<&str> {
    data.as_utf8()
}

/// `tmpo`: data-type `21`, big-endian `u16` payload.
pub fn encode_tempo(bpm: u16) -> Data {
    Data::BeSigned(bpm.to_be_bytes().to_vec())
}

pub fn decode_tempo(data: &Data) -> Result<u16> {
    let v = data.as_be_signed_i64()?;
    if !(0..=u16::MAX as i64).contains(&v) {
        return Err(Error::malformed_payload(format!("tmpo value {} out of u16 range", v)));
    }
    Ok(v as u16)
}

/// `trkn`: data-type `0`, 8-byte payload `(reserved u16, track_no u16,
/// track_of u16, reserved u16)`.
pub fn encode_track_number(track_no: u16, track_of: u16) -> Data {
    let mut bytes = Vec::with_capacity(8);
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&track_no.to_be_bytes());
    bytes.extend_from_slice(&track_of.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    Data::Reserved(bytes)
}

pub fn decode_track_number(data: &Data) -> Result<(u16, u16)> {
    let bytes = data.as_bytes();
    if bytes.len() < 8 {
        return Err(Error::malformed_payload(format!("trkn payload too short: {} bytes", bytes.len())));
    }
    let track_no = u16::from_be_bytes([bytes[2], bytes[3]]);
    let track_of = u16::from_be_bytes([bytes[4], bytes[5]]);
    Ok((track_no, track_of))
}

/// Musical key (`----:com.apple.iTunes:initialkey`), data-type `1`: a
/// plain UTF-8 string such as `Am` or `C#m`.
pub fn encode_initial_key(key: &str) -> Data {
    Data::Utf8(key.to_owned())
}

pub fn decode_initial_key(data: &Data) -> Result<&str> {
    data.as_utf8()
}

const VOCAL_PITCH_VERSION: u8 = 1;
const ONSETS_VERSION: u8 = 1;

/// One vocal-pitch sample: MIDI note number plus a signed cents offset,
/// clipped to `[-50, 50]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchSample {
    pub midi_note: u8,
    pub cents: i8,
}

impl PitchSample {
    pub fn new(midi_note: u8, cents: i32) -> Self {
        Self { midi_note: midi_note.min(127), cents: cents.clamp(-50, 50) as i8 }
    }
}

/// Vocal pitch curve (`----:com.stems:vpch`), data-type `0`:
/// `version(u8=1) sample_rate_hz(u32) count(u32) [(midi_note u8, cents i8)]×count`.
pub fn encode_vocal_pitch(sample_rate_hz: u32, samples: &[PitchSample]) -> Data {
    let mut bytes = Vec::with_capacity(9 + samples.len() * 2);
    bytes.push(VOCAL_PITCH_VERSION);
    bytes.extend_from_slice(&sample_rate_hz.to_be_bytes());
    bytes.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    for s in samples {
        bytes.push(s.midi_note);
        bytes.push(s.cents as u8);
    }
    Data::Reserved(bytes)
}

pub fn decode_vocal_pitch(data: &Data) -> Result<(u32, Vec<PitchSample>)> {
    let bytes = data.as_bytes();
    if bytes.len() < 9 {
        return Err(Error::malformed_payload("vpch payload shorter than header"));
    }
    let version = bytes[0];
    if version != VOCAL_PITCH_VERSION {
        return Err(Error::malformed_payload(format!("vpch version {} != 1", version)));
    }
    let sample_rate_hz = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
    let count = u32::from_be_bytes(bytes[5..9].try_into().unwrap()) as usize;
    let expected_len = 9 + count * 2;
    if bytes.len() != expected_len {
        return Err(Error::malformed_payload(format!(
            "vpch declares {} samples but payload is {} bytes (expected {})",
            count,
            bytes.len(),
            expected_len
        )));
    }

    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let at = 9 + i * 2;
        samples.push(PitchSample { midi_note: bytes[at], cents: bytes[at + 1] as i8 });
    }
    Ok((sample_rate_hz, samples))
}

/// Onset timestamps (`----:com.stems:kons`), data-type `0`:
/// `version(u8=1) count(u32) [time_ms(u32)]×count`. Writers convert
/// seconds to milliseconds with rounding.
pub fn encode_onsets(times_sec: &[f64]) -> Data {
    let mut bytes = Vec::with_capacity(5 + times_sec.len() * 4);
    bytes.push(ONSETS_VERSION);
    bytes.extend_from_slice(&(times_sec.len() as u32).to_be_bytes());
    for &t in times_sec {
        let ms = (t * 1000.0).round().max(0.0) as u32;
        bytes.extend_from_slice(&ms.to_be_bytes());
    }
    Data::Reserved(bytes)
}

pub fn decode_onsets(data: &Data) -> Result<Vec<u32>> {
    let bytes = data.as_bytes();
    if bytes.len() < 5 {
        return Err(Error::malformed_payload("kons payload shorter than header"));
    }
    let version = bytes[0];
    if version != ONSETS_VERSION {
        return Err(Error::malformed_payload(format!("kons version {} != 1", version)));
    }
    let count = u32::from_be_bytes(bytes[1..5].try_into().unwrap()) as usize;
    let expected_len = 5 + count * 4;
    if bytes.len() != expected_len {
        return Err(Error::malformed_payload(format!(
            "kons declares {} onsets but payload is {} bytes (expected {})",
            count,
            bytes.len(),
            expected_len
        )));
    }

    let mut times_ms = Vec::with_capacity(count);
    for i in 0..count {
        let at = 5 + i * 4;
        times_ms.push(u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap()));
    }
    Ok(times_ms)
}

/// Lyrics JSON document (`----:com.stems:kara`), data-type `1`. Readers
/// must tolerate unknown fields; every struct here carries
/// `#[serde(default)]` on optional fields so a partial document round-trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lyrics {
    #[serde(default)]
    pub audio: LyricsAudio,
    #[serde(default)]
    pub timing: LyricsTiming,
    #[serde(default)]
    pub lines: Vec<LyricsLine>,
    #[serde(default)]
    pub singers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsAudio {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub encoder_delay_samples: Option<u32>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub presets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsTiming {
    #[serde(default)]
    pub offset_sec: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Option<Vec<LyricsWord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsWord {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

pub fn encode_lyrics(lyrics: &Lyrics) -> Result<Data> {
    let json = serde_json::to_string(lyrics)?;
    Ok(Data::Utf8(json))
}

pub fn decode_lyrics(data: &Data) -> Result<Lyrics> {
    let text = data.as_utf8()?;
    Ok(serde_json::from_str(text)?)
}

/// Stem metadata (`moov/udta/stem`): raw JSON, not a free-form atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemMetadata {
    pub version: u32,
    #[serde(default)]
    pub mastering_dsp: MasteringDsp,
    #[serde(default)]
    pub stems: Vec<StemEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasteringDsp {
    #[serde(default)]
    pub compressor: Option<CompressorSettings>,
    #[serde(default)]
    pub limiter: Option<LimiterSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressorSettings {
    #[serde(default)]
    pub threshold_db: f64,
    #[serde(default)]
    pub ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimiterSettings {
    #[serde(default)]
    pub ceiling_db: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemEntry {
    pub name: String,
    pub color: String,
}

pub fn encode_stem_metadata(meta: &StemMetadata) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(meta)?)
}

pub fn decode_stem_metadata(bytes: &[u8]) -> Result<StemMetadata> {
    Ok(serde_json::from_slice(bytes)?)
}
