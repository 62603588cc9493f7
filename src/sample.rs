//! Decodes a track's sample table into chunk offsets, per-sample sizes
//! and per-sample durations.

use std::io::Cursor;

use crate::atom::head::parse_full_head;
use crate::atom::ident::{self, Fourcc};
use crate::atom::tree::Atom;
use crate::atom::util::ReadUtil;
use crate::error::{Error, Result};

/// One `stsc` ("sample-to-chunk") entry. `first_chunk` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// One `stts` ("decode time-to-sample") entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttsEntry {
    pub count: u32,
    pub delta: u32,
}

/// Either all samples share one size (`stsz` with a non-zero `sample_size`
/// field) or each sample's size is listed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSizes {
    Fixed { size: u32, count: u32 },
    Variable(Vec<u32>),
}

impl SampleSizes {
    pub fn count(&self) -> u32 {
        match self {
            Self::Fixed { count, .. } => *count,
            Self::Variable(sizes) => sizes.len() as u32,
        }
    }

    pub fn size_of(&self, sample_index: usize) -> u32 {
        match self {
            Self::Fixed { size, .. } => *size,
            Self::Variable(sizes) => sizes[sample_index],
        }
    }

    pub fn total(&self) -> u64 {
        match self {
            Self::Fixed { size, count } => *size as u64 * *count as u64,
            Self::Variable(sizes) => sizes.iter().map(|&s| s as u64).sum(),
        }
    }
}

/// Either the 32-bit (`stco`) or 64-bit (`co64`) chunk offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOffsets {
    Stco(Vec<u32>),
    Co64(Vec<u64>),
}

impl ChunkOffsets {
    pub fn len(&self) -> usize {
        match self {
            Self::Stco(v) => v.len(),
            Self::Co64(v) => v.len(),
        }
    }

    pub fn get(&self, index: usize) -> u64 {
        match self {
            Self::Stco(v) => v[index] as u64,
            Self::Co64(v) => v[index],
        }
    }
}

/// A track's decoded sample table, sufficient to locate and extract every
/// sample of its elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleMap {
    pub chunk_offsets: ChunkOffsets,
    pub sample_sizes: SampleSizes,
    pub stsc: Vec<StscEntry>,
    pub stts: Vec<SttsEntry>,
    pub stts_was_present: bool,
    pub stsd_raw: Vec<u8>,
    pub timescale: u32,
    pub duration: u64,
}

fn child<'a>(atom: &'a Atom, fourcc: Fourcc) -> Option<&'a Atom> {
    atom.find(fourcc)
}

fn require<'a>(atom: &'a Atom, fourcc: Fourcc) -> Result<&'a Atom> {
    child(atom, fourcc).ok_or_else(|| Error::missing_box(fourcc))
}

fn body<'a>(bytes: &'a [u8], atom: &Atom) -> &'a [u8] {
    &bytes[atom.content_pos() as usize..atom.end() as usize]
}

fn parse_stsz(bytes: &[u8], atom: &Atom) -> Result<SampleSizes> {
    let mut cursor = Cursor::new(body(bytes, atom));
    let (_version, _flags) = parse_full_head(&mut cursor)?;
    let sample_size = cursor.read_be_u32()?;
    let sample_count = cursor.read_be_u32()?;

    if sample_size != 0 {
        return Ok(SampleSizes::Fixed { size: sample_size, count: sample_count });
    }

    let mut sizes = Vec::with_capacity(sample_count as usize);
    for _ in 0..sample_count {
        sizes.push(cursor.read_be_u32()?);
    }
    Ok(SampleSizes::Variable(sizes))
}

fn parse_stsc(bytes: &[u8], atom: &Atom) -> Result<Vec<StscEntry>> {
    let mut cursor = Cursor::new(body(bytes, atom));
    let (_version, _flags) = parse_full_head(&mut cursor)?;
    let entry_count = cursor.read_be_u32()?;

    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut prev_first_chunk = 0u32;
    for i in 0..entry_count {
        let first_chunk = cursor.read_be_u32()?;
        let samples_per_chunk = cursor.read_be_u32()?;
        let sample_description_index = cursor.read_be_u32()?;
        if i > 0 && first_chunk <= prev_first_chunk {
            return Err(Error::invalid_container("stsc first_chunk is not strictly increasing"));
        }
        prev_first_chunk = first_chunk;
        entries.push(StscEntry { first_chunk, samples_per_chunk, sample_description_index });
    }
    Ok(entries)
}

fn parse_chunk_offsets(bytes: &[u8], stbl: &Atom) -> Result<ChunkOffsets> {
    if let Some(stco) = child(stbl, ident::STCO) {
        let mut cursor = Cursor::new(body(bytes, stco));
        let (_version, _flags) = parse_full_head(&mut cursor)?;
        let entry_count = cursor.read_be_u32()?;
        let mut offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            offsets.push(cursor.read_be_u32()?);
        }
        return Ok(ChunkOffsets::Stco(offsets));
    }
    if let Some(co64) = child(stbl, ident::CO64) {
        let mut cursor = Cursor::new(body(bytes, co64));
        let (_version, _flags) = parse_full_head(&mut cursor)?;
        let entry_count = cursor.read_be_u32()?;
        let mut offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            offsets.push(cursor.read_be_u64()?);
        }
        return Ok(ChunkOffsets::Co64(offsets));
    }
    Err(Error::missing_box(ident::STCO))
}

fn parse_stts(bytes: &[u8], atom: &Atom) -> Result<Vec<SttsEntry>> {
    let mut cursor = Cursor::new(body(bytes, atom));
    let (_version, _flags) = parse_full_head(&mut cursor)?;
    let entry_count = cursor.read_be_u32()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let count = cursor.read_be_u32()?;
        let delta = cursor.read_be_u32()?;
        entries.push(SttsEntry { count, delta });
    }
    Ok(entries)
}

/// `mdhd` version 0/1: timescale + duration.
fn parse_mdhd(bytes: &[u8], atom: &Atom) -> Result<(u32, u64)> {
    let mut cursor = Cursor::new(body(bytes, atom));
    let (version, _flags) = parse_full_head(&mut cursor)?;
    match version {
        0 => {
            let _creation = cursor.read_be_u32()?;
            let _modification = cursor.read_be_u32()?;
            let timescale = cursor.read_be_u32()?;
            let duration = cursor.read_be_u32()? as u64;
            Ok((timescale, duration))
        }
        1 => {
            let _creation = cursor.read_be_u64()?;
            let _modification = cursor.read_be_u64()?;
            let timescale = cursor.read_be_u32()?;
            let duration = cursor.read_be_u64()?;
            Ok((timescale, duration))
        }
        v => Err(Error::invalid_container(format!("unknown mdhd version {}", v))),
    }
}

/// Decode a `trak` atom's sample table into a [`SampleMap`].
pub fn decode_sample_map(bytes: &[u8], trak: &Atom) -> Result<SampleMap> {
    let mdia = require(trak, ident::MDIA)?;
    let mdhd = require(mdia, ident::MDHD)?;
    let (timescale, duration) = parse_mdhd(bytes, mdhd)?;

    let minf = require(mdia, ident::MINF)?;
    let stbl = require(minf, ident::STBL)?;

    let stsd = require(stbl, ident::STSD)?;
    let stsd_raw = body(bytes, stsd).to_vec();

    let stsz = require(stbl, ident::STSZ)?;
    let sample_sizes = parse_stsz(bytes, stsz)?;

    let stsc_atom = require(stbl, ident::STSC)?;
    let stsc = parse_stsc(bytes, stsc_atom)?;

    let chunk_offsets = parse_chunk_offsets(bytes, stbl)?;
    if (stsc.last().map(|e| e.first_chunk as usize).unwrap_or(0)) > chunk_offsets.len() {
        return Err(Error::invalid_container("stsc references more chunks than stco/co64 provides"));
    }

    let (stts, stts_was_present) = match child(stbl, ident::STTS) {
        Some(atom) => (parse_stts(bytes, atom)?, true),
        None => (vec![SttsEntry { count: sample_sizes.count().max(1), delta: 1024 }], false),
    };

    Ok(SampleMap {
        chunk_offsets,
        sample_sizes,
        stsc,
        stts,
        stts_was_present,
        stsd_raw,
        timescale,
        duration,
    })
}

impl SampleMap {
    /// Samples-per-chunk for the (1-based) chunk `chunk_index`: the `stsc`
    /// entry with the largest `first_chunk <= chunk_index`.
    pub fn samples_per_chunk(&self, chunk_index: u32) -> Result<u32> {
        self.stsc
            .iter()
            .rev()
            .find(|e| e.first_chunk <= chunk_index)
            .map(|e| e.samples_per_chunk)
            .ok_or_else(|| Error::invalid_container(format!("no stsc entry covers chunk {}", chunk_index)))
    }

    pub fn duration_sec(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// Total sample count as declared by `stsz`.
    pub fn sample_count(&self) -> u32 {
        self.sample_sizes.count()
    }

    /// Gather every sample's `(offset, size)` in sample order by walking
    /// the chunk table: for chunk *c*, `samples_per_chunk(c)` samples
    /// starting at `chunk_offsets[c]`, advancing by each sample's size.
    pub fn iter_samples(&self) -> Result<Vec<(u64, u32)>> {
        let mut samples = Vec::with_capacity(self.sample_count() as usize);
        let mut sample_index = 0usize;

        for chunk_index in 0..self.chunk_offsets.len() {
            let chunk_number = (chunk_index + 1) as u32;
            let count = self.samples_per_chunk(chunk_number)?;
            let mut offset = self.chunk_offsets.get(chunk_index);

            for _ in 0..count {
                if sample_index as u32 >= self.sample_count() {
                    break;
                }
                let size = self.sample_sizes.size_of(sample_index);
                samples.push((offset, size));
                offset += size as u64;
                sample_index += 1;
            }
        }

        Ok(samples)
    }
}
