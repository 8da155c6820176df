// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Open Ephys "legacy" format: one `.continuous` file per channel.
//!
//! # File Structure
//!
//! - Header: 1024 bytes of text, `header.<key> = <value>;` statements
//! - Records (2070 bytes each):
//!   - timestamp: i64 LE
//!   - sample count: u16 LE (always 1024)
//!   - recording number: u16 LE
//!   - samples: 1024 × i16 **big-endian**
//!   - record marker: bytes 0..=9
//!
//! File names are `<processor>_<KIND><n>[_<recording>].continuous` where
//! KIND is `CH` (electrodes), `AUX` (headstage accelerometer) or `ADC`.
//! Channels of the same KIND form one stream.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use regex::Regex;
use tracing::debug;

use crate::core::FormatTag;
use crate::io::arena::MmapArena;
use crate::io::metadata::{Annotations, StreamDescriptor, StreamKind, Traces};
use crate::io::options::OpenOptions;
use crate::io::traits::{check_read_range, FormatBackend, SignalSource};
use crate::{EphysError, Result};

const FORMAT_NAME: &str = "Open Ephys legacy";

/// Size of the text header.
pub const HEADER_BYTES: usize = 1024;
/// Samples per record.
pub const RECORD_SAMPLES: usize = 1024;
/// Bytes per record.
pub const RECORD_BYTES: usize = 8 + 2 + 2 + RECORD_SAMPLES * 2 + 10;
/// Record marker closing every record.
pub const RECORD_MARKER: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];

/// Parsed `.continuous` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuousFileName {
    /// Processor id
    pub processor: String,
    /// Channel kind token (`CH`, `AUX`, `ADC`)
    pub kind: String,
    /// Channel number
    pub number: u32,
    /// Recording index (1 when no suffix is present)
    pub recording: u32,
}

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<proc>\d+)_(?P<kind>CH|AUX|ADC)(?P<num>\d+)(?:_(?P<rec>\d+))?\.continuous$")
            .expect("valid regex")
    })
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"header\.(?P<key>\w+)\s*=\s*'?(?P<value>[^;']*)'?\s*;").expect("valid regex")
    })
}

impl ContinuousFileName {
    /// Parse a file name.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = file_name_regex().captures(name)?;
        Some(Self {
            processor: caps["proc"].to_string(),
            kind: caps["kind"].to_string(),
            number: caps["num"].parse().ok()?,
            recording: match caps.name("rec") {
                Some(m) => m.as_str().parse().ok()?,
                None => 1,
            },
        })
    }

    /// Stream this channel belongs to.
    pub fn stream_name(&self) -> String {
        format!("Signals {}", self.kind)
    }

    /// Channel id exposed to callers.
    pub fn channel_id(&self) -> String {
        format!("{}{}", self.kind, self.number)
    }
}

/// Parse the key/value statements of a `.continuous` header.
pub fn parse_header(bytes: &[u8]) -> BTreeMap<String, String> {
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_BYTES)]);
    header_regex()
        .captures_iter(&text)
        .map(|c| (c["key"].to_string(), c["value"].trim().to_string()))
        .collect()
}

/// Normalise `date_created` (`15-Jun-2016 173405`) to `YYYY-MM-DD HH:MM:SS`.
pub fn parse_date_created(raw: &str) -> Option<String> {
    chrono::NaiveDateTime::parse_from_str(raw, "%d-%b-%Y %H%M%S")
        .ok()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[derive(Debug, Clone)]
struct ChannelFile {
    name: ContinuousFileName,
    path: PathBuf,
}

fn scan_files(dir: &Path) -> Result<Vec<ChannelFile>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| EphysError::backend(FORMAT_NAME, dir.display().to_string(), e.to_string()))?;
    let mut files: Vec<ChannelFile> = entries
        .flatten()
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            ContinuousFileName::parse(&file_name).map(|name| ChannelFile {
                name,
                path: entry.path(),
            })
        })
        .filter(|f| f.name.recording == 1)
        .collect();
    files.sort_by(|a, b| {
        (kind_rank(&a.name.kind), a.name.number, &a.name.processor).cmp(&(
            kind_rank(&b.name.kind),
            b.name.number,
            &b.name.processor,
        ))
    });
    Ok(files)
}

fn kind_rank(kind: &str) -> u8 {
    match kind {
        "CH" => 0,
        "AUX" => 1,
        _ => 2,
    }
}

fn read_header(path: &Path) -> Result<BTreeMap<String, String>> {
    let bytes = std::fs::read(path)
        .map_err(|e| EphysError::backend(FORMAT_NAME, path.display().to_string(), e.to_string()))?;
    if bytes.len() < HEADER_BYTES {
        return Err(EphysError::backend(
            FORMAT_NAME,
            path.display().to_string(),
            format!("file shorter than the {HEADER_BYTES}-byte header"),
        ));
    }
    Ok(parse_header(&bytes[..HEADER_BYTES]))
}

fn header_f64(header: &BTreeMap<String, String>, key: &str, path: &Path) -> Result<f64> {
    let raw = header.get(key).ok_or_else(|| {
        EphysError::backend(FORMAT_NAME, path.display().to_string(), format!("header lacks {key}"))
    })?;
    raw.parse().map_err(|_| {
        EphysError::backend(
            FORMAT_NAME,
            path.display().to_string(),
            format!("header {key} is not a number: '{raw}'"),
        )
    })
}

/// Open Ephys legacy backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenEphysLegacyBackend;

impl OpenEphysLegacyBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl FormatBackend for OpenEphysLegacyBackend {
    fn tag(&self) -> FormatTag {
        FormatTag::OpenEphysLegacy
    }

    fn list_streams(&self, dir: &Path, _options: &OpenOptions) -> Result<Vec<StreamDescriptor>> {
        let files = scan_files(dir)?;

        let mut streams: Vec<StreamDescriptor> = Vec::new();
        for file in files {
            let name = file.name.stream_name();
            match streams.iter_mut().find(|s| s.name == name) {
                Some(stream) => {
                    stream.channel_count += 1;
                    stream.files.push(file.path);
                }
                None => {
                    let header = read_header(&file.path)?;
                    let rate = header_f64(&header, "sampleRate", &file.path)?;
                    let kind = if file.name.kind == "CH" {
                        StreamKind::Probe
                    } else {
                        StreamKind::Auxiliary
                    };
                    streams.push(
                        StreamDescriptor::new(name)
                            .with_kind(kind)
                            .with_sample_rate(rate)
                            .with_channel_count(1)
                            .with_file(file.path),
                    );
                }
            }
        }

        debug!(directory = %dir.display(), streams = streams.len(), "listed Open Ephys legacy streams");
        Ok(streams)
    }

    fn bind(
        &self,
        _dir: &Path,
        stream: &StreamDescriptor,
        options: &OpenOptions,
    ) -> Result<Box<dyn SignalSource>> {
        Ok(Box::new(LegacySource::open(stream, options)?))
    }
}

/// Sample source over the `.continuous` files of one stream.
#[derive(Debug)]
pub struct LegacySource {
    stream: StreamDescriptor,
    arenas: Vec<MmapArena>,
    channel_ids: Vec<String>,
    gains: Vec<f64>,
    sample_rate: f64,
    num_samples: u64,
    annotations: Annotations,
}

impl LegacySource {
    /// Open every channel file of a listed stream.
    pub fn open(stream: &StreamDescriptor, options: &OpenOptions) -> Result<Self> {
        if stream.files.is_empty() {
            return Err(EphysError::backend(
                FORMAT_NAME,
                stream.name.clone(),
                "stream has no channel files",
            ));
        }

        let mut arenas = Vec::with_capacity(stream.files.len());
        let mut channel_ids = Vec::with_capacity(stream.files.len());
        let mut gains = Vec::with_capacity(stream.files.len());
        let mut sample_rate = None;
        let mut annotations = Annotations::new();
        let mut num_samples = u64::MAX;

        for path in &stream.files {
            let arena = MmapArena::open(path).map_err(|e| {
                EphysError::backend(FORMAT_NAME, path.display().to_string(), e.to_string())
            })?;
            if arena.len() < HEADER_BYTES {
                return Err(EphysError::backend(
                    FORMAT_NAME,
                    path.display().to_string(),
                    format!("file shorter than the {HEADER_BYTES}-byte header"),
                ));
            }
            let header = parse_header(arena.slice(0, HEADER_BYTES)?);

            let rate = header_f64(&header, "sampleRate", path)?;
            match sample_rate {
                None => sample_rate = Some(rate),
                Some(r) if r != rate => {
                    return Err(EphysError::backend(
                        FORMAT_NAME,
                        path.display().to_string(),
                        format!("sample rate {rate} differs from {r} in the same stream"),
                    ))
                }
                Some(_) => {}
            }
            gains.push(header.get("bitVolts").and_then(|v| v.parse().ok()).unwrap_or(1.0));

            let records = (arena.len() - HEADER_BYTES) / RECORD_BYTES;
            num_samples = num_samples.min((records * RECORD_SAMPLES) as u64);

            let id = path
                .file_name()
                .and_then(|n| ContinuousFileName::parse(&n.to_string_lossy()))
                .map(|n| n.channel_id())
                .unwrap_or_else(|| format!("CH{}", channel_ids.len() + 1));
            channel_ids.push(id);

            if annotations.is_empty() {
                annotations.insert("stream_name".into(), stream.name.clone());
                if let Some(start) = header.get("date_created").and_then(|d| parse_date_created(d)) {
                    annotations.insert("start_time".into(), start);
                }
                if options.all_annotations {
                    for (k, v) in &header {
                        annotations.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
            }
            arenas.push(arena);
        }

        Ok(Self {
            stream: stream.clone(),
            arenas,
            channel_ids,
            gains,
            sample_rate: sample_rate.unwrap_or(0.0),
            num_samples,
            annotations,
        })
    }

    /// Timestamp of the first record of the first channel.
    pub fn first_timestamp(&self) -> Option<i64> {
        let arena = self.arenas.first()?;
        let bytes = arena.slice(HEADER_BYTES, 8).ok()?;
        Some(LittleEndian::read_i64(bytes))
    }

    fn sample(&self, channel: usize, frame: u64) -> Result<i16> {
        let frame = frame as usize;
        let record = frame / RECORD_SAMPLES;
        let offset = HEADER_BYTES + record * RECORD_BYTES + 12 + (frame % RECORD_SAMPLES) * 2;
        Ok(BigEndian::read_i16(self.arenas[channel].slice(offset, 2)?))
    }
}

impl SignalSource for LegacySource {
    fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    fn channel_ids(&self) -> &[String] {
        &self.channel_ids
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn num_samples(&self) -> u64 {
        self.num_samples
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    fn read_traces(&self, start: u64, end: u64, channels: Option<&[usize]>) -> Result<Traces> {
        let selected =
            check_read_range(start, end, self.num_samples, self.arenas.len(), channels)?;
        let mut traces = Traces::new((end - start) as usize, selected.len());
        for frame in start..end {
            for &ch in &selected {
                traces.data.push(self.sample(ch, frame)?);
            }
        }
        Ok(traces)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Build the bytes of a `.continuous` file (fixtures and exports).
///
/// `samples` is padded with zeros to a whole number of records.
pub fn encode_continuous(sample_rate: f64, bit_volts: f64, samples: &[i16]) -> Vec<u8> {
    let text = format!(
        "header.format = 'Open Ephys Data Format';\nheader.version = 0.4;\nheader.header_bytes = 1024;\nheader.date_created = '15-Jun-2016 173405';\nheader.channelType = 'Continuous';\nheader.sampleRate = {sample_rate};\nheader.blockLength = 1024;\nheader.bufferSize = 1024;\nheader.bitVolts = {bit_volts};\n"
    );
    let mut out = text.into_bytes();
    out.resize(HEADER_BYTES, b' ');

    for (i, chunk) in samples.chunks(RECORD_SAMPLES).enumerate() {
        out.extend_from_slice(&((i * RECORD_SAMPLES) as i64).to_le_bytes());
        out.extend_from_slice(&(RECORD_SAMPLES as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        for s in 0..RECORD_SAMPLES {
            out.extend_from_slice(&chunk.get(s).copied().unwrap_or(0).to_be_bytes());
        }
        out.extend_from_slice(&RECORD_MARKER);
    }
    out
}
