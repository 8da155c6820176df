// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Open Ephys "binary" format.
//!
//! # Layout
//!
//! ```text
//! <root>/Record Node 101/experiment1/recording1/
//!     structure.oebin
//!     continuous/<stream folder>/continuous.dat
//!     events/<stream folder>/<line folder>/{sample_numbers,timestamps,states}.npy
//! ```
//!
//! `structure.oebin` is JSON describing every continuous and event stream.
//! The folder handed to the backend may be the recording folder itself or
//! any ancestor up to three levels above it. When several recordings are
//! found the first in path order is bound.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::core::FormatTag;
use crate::io::arena::MmapArena;
use crate::io::detection::OEBIN_FILE;
use crate::io::metadata::{Annotations, Event, EventChannel, StreamDescriptor, StreamKind, Traces};
use crate::io::npy::read_npy;
use crate::io::options::OpenOptions;
use crate::io::traits::{EventSource, FormatBackend, SignalSource};
use crate::{EphysError, Result};

const FORMAT_NAME: &str = "Open Ephys binary";

/// Maximum depth below the given folder searched for `structure.oebin`.
pub const OEBIN_SEARCH_DEPTH: usize = 3;

/// Name of the continuous data file in each stream folder.
pub const CONTINUOUS_FILE: &str = "continuous.dat";

/// Parsed `structure.oebin`.
#[derive(Debug, Clone, Deserialize)]
pub struct Structure {
    /// Acquisition software version
    #[serde(rename = "GUI version", default)]
    pub gui_version: Option<String>,
    /// Continuous streams
    #[serde(default)]
    pub continuous: Vec<ContinuousInfo>,
    /// Event streams
    #[serde(default)]
    pub events: Vec<EventInfo>,
}

/// One `continuous[]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ContinuousInfo {
    /// Folder under `continuous/`, usually with a trailing slash
    pub folder_name: String,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Channels stored per frame
    pub num_channels: usize,
    /// Per-channel description
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
    /// Remaining keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One channel of a continuous stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    /// Channel name (`CH1`, `ADC3`, ...)
    pub channel_name: String,
    /// Microvolts per bit
    #[serde(default = "unit_gain")]
    pub bit_volts: f64,
}

fn unit_gain() -> f64 {
    1.0
}

/// One `events[]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInfo {
    /// Folder under `events/`
    pub folder_name: String,
    /// Display name of the event line(s)
    #[serde(default)]
    pub channel_name: Option<String>,
    /// Sample rate used for sample numbers
    #[serde(default)]
    pub sample_rate: Option<f64>,
}

impl ContinuousInfo {
    /// Stream name: the folder without trailing separators.
    pub fn stream_name(&self) -> String {
        self.folder_name.trim_end_matches('/').to_string()
    }

    /// Auxiliary streams carry only ADC/AUX lines.
    pub fn kind(&self) -> StreamKind {
        let name = self.stream_name();
        let all_aux = !self.channels.is_empty()
            && self.channels.iter().all(|c| {
                c.channel_name.starts_with("ADC") || c.channel_name.starts_with("AUX")
            });
        if all_aux || name.contains("ADC") {
            StreamKind::Auxiliary
        } else {
            StreamKind::Probe
        }
    }

    fn scalar_annotations(&self, out: &mut Annotations) {
        for (key, value) in &self.extra {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            out.entry(key.clone()).or_insert(text);
        }
    }
}

impl EventInfo {
    /// Channel name: the folder without trailing separators.
    pub fn name(&self) -> String {
        self.folder_name.trim_end_matches('/').to_string()
    }

    /// Event stream: the first folder component.
    pub fn stream(&self) -> String {
        let name = self.name();
        name.split('/').next().unwrap_or_default().to_string()
    }
}

/// Read and parse a `structure.oebin` file.
pub fn read_structure(path: &Path) -> Result<Structure> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EphysError::backend(FORMAT_NAME, path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&text)
        .map_err(|e| EphysError::backend(FORMAT_NAME, path.display().to_string(), e.to_string()))
}

/// Find every `structure.oebin` at or below `dir`, sorted by path.
pub fn find_structure_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(dir, 0, &mut found);
    found.sort();
    found
}

fn walk(dir: &Path, depth: usize, found: &mut Vec<PathBuf>) {
    let candidate = dir.join(OEBIN_FILE);
    if candidate.is_file() {
        found.push(candidate);
    }
    if depth >= OEBIN_SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut subdirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    for sub in subdirs {
        walk(&sub, depth + 1, found);
    }
}

/// The structure file bound for `dir` and the number of recordings found.
fn locate(dir: &Path) -> Result<(PathBuf, usize)> {
    let files = find_structure_files(dir);
    match files.first() {
        Some(first) => Ok((first.clone(), files.len())),
        None => Err(EphysError::backend(
            FORMAT_NAME,
            dir.display().to_string(),
            format!("no {OEBIN_FILE} found within {OEBIN_SEARCH_DEPTH} levels"),
        )),
    }
}

fn recording_folder(oebin: &Path) -> &Path {
    oebin.parent().unwrap_or_else(|| Path::new("."))
}

/// Open Ephys binary backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenEphysBinaryBackend;

impl OpenEphysBinaryBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl FormatBackend for OpenEphysBinaryBackend {
    fn tag(&self) -> FormatTag {
        FormatTag::OpenEphysBinary
    }

    fn list_streams(&self, dir: &Path, _options: &OpenOptions) -> Result<Vec<StreamDescriptor>> {
        let (oebin, recordings) = locate(dir)?;
        let structure = read_structure(&oebin)?;
        let root = recording_folder(&oebin);

        let streams: Vec<StreamDescriptor> = structure
            .continuous
            .iter()
            .map(|info| {
                StreamDescriptor::new(info.stream_name())
                    .with_kind(info.kind())
                    .with_sample_rate(info.sample_rate)
                    .with_channel_count(info.num_channels)
                    .with_file(root.join("continuous").join(info.stream_name()).join(CONTINUOUS_FILE))
                    .with_metadata_file(&oebin)
            })
            .collect();

        debug!(
            directory = %dir.display(),
            structure = %oebin.display(),
            recordings,
            streams = streams.len(),
            "listed Open Ephys binary streams"
        );
        Ok(streams)
    }

    fn bind(
        &self,
        dir: &Path,
        stream: &StreamDescriptor,
        options: &OpenOptions,
    ) -> Result<Box<dyn SignalSource>> {
        Ok(Box::new(BinarySource::open(dir, stream, options)?))
    }

    fn bind_events(&self, dir: &Path, options: &OpenOptions) -> Result<Box<dyn EventSource>> {
        Ok(Box::new(BinaryEventSource::open(dir, options)?))
    }
}

/// Sample source over one `continuous.dat`.
#[derive(Debug)]
pub struct BinarySource {
    stream: StreamDescriptor,
    arena: MmapArena,
    total_channels: usize,
    channel_ids: Vec<String>,
    gains: Vec<f64>,
    sample_rate: f64,
    annotations: Annotations,
}

impl BinarySource {
    /// Bind a listed stream.
    pub fn open(dir: &Path, stream: &StreamDescriptor, options: &OpenOptions) -> Result<Self> {
        let (oebin, recordings) = match &stream.metadata_file {
            Some(path) => (path.clone(), find_structure_files(dir).len().max(1)),
            None => locate(dir)?,
        };
        let structure = read_structure(&oebin)?;
        let info = structure
            .continuous
            .iter()
            .find(|c| c.stream_name() == stream.name)
            .ok_or_else(|| {
                EphysError::backend(
                    FORMAT_NAME,
                    oebin.display().to_string(),
                    format!("stream '{}' not described", stream.name),
                )
            })?;

        let data_path = stream.files.first().cloned().unwrap_or_else(|| {
            recording_folder(&oebin)
                .join("continuous")
                .join(info.stream_name())
                .join(CONTINUOUS_FILE)
        });
        let arena = MmapArena::open(&data_path).map_err(|e| {
            EphysError::backend(FORMAT_NAME, data_path.display().to_string(), e.to_string())
        })?;

        let total_channels = info.num_channels;
        let (channel_ids, gains) = if info.channels.len() == total_channels {
            (
                info.channels.iter().map(|c| c.channel_name.clone()).collect(),
                info.channels.iter().map(|c| c.bit_volts).collect(),
            )
        } else {
            (
                (1..=total_channels).map(|i| format!("CH{i}")).collect(),
                vec![1.0; total_channels],
            )
        };

        let mut annotations = Annotations::new();
        annotations.insert("stream_name".into(), stream.name.clone());
        annotations.insert("recording_count".into(), recordings.to_string());
        if let Some(version) = &structure.gui_version {
            annotations.insert("gui_version".into(), version.clone());
        }
        if options.all_annotations {
            info.scalar_annotations(&mut annotations);
        }

        Ok(Self {
            stream: stream.clone(),
            arena,
            total_channels,
            channel_ids,
            gains,
            sample_rate: info.sample_rate,
            annotations,
        })
    }
}

impl SignalSource for BinarySource {
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
        self.arena.interleaved_frames(0, self.total_channels)
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    fn read_traces(&self, start: u64, end: u64, channels: Option<&[usize]>) -> Result<Traces> {
        self.arena
            .read_interleaved_i16(0, self.total_channels, start, end, channels)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Event source over the `events/` folder of one recording.
#[derive(Debug)]
pub struct BinaryEventSource {
    channels: Vec<EventChannel>,
    annotations: Annotations,
}

impl BinaryEventSource {
    /// Locate the recording and describe its event channels.
    pub fn open(dir: &Path, options: &OpenOptions) -> Result<Self> {
        let (oebin, recordings) = locate(dir)?;
        let structure = read_structure(&oebin)?;
        let events_root = recording_folder(&oebin).join("events");

        let channels: Vec<EventChannel> = structure
            .events
            .iter()
            .map(|info| EventChannel {
                name: info.name(),
                stream: info.stream(),
                sample_rate: info.sample_rate,
                folder: events_root.join(info.name()),
            })
            .collect();

        let mut annotations = Annotations::new();
        annotations.insert("recording_count".into(), recordings.to_string());
        if let Some(version) = &structure.gui_version {
            annotations.insert("gui_version".into(), version.clone());
        }
        if options.all_annotations {
            for info in &structure.events {
                if let Some(label) = &info.channel_name {
                    annotations.insert(format!("{}.channel_name", info.name()), label.clone());
                }
            }
        }

        debug!(structure = %oebin.display(), channels = channels.len(), "opened Open Ephys events");
        Ok(Self {
            channels,
            annotations,
        })
    }
}

impl EventSource for BinaryEventSource {
    fn channels(&self) -> &[EventChannel] {
        &self.channels
    }

    fn events(&self, channel: &str) -> Result<Vec<Event>> {
        let info = self
            .channels
            .iter()
            .find(|c| c.name == channel)
            .ok_or_else(|| {
                EphysError::backend(FORMAT_NAME, channel, "no such event channel")
            })?;
        read_event_folder(&info.folder, info.sample_rate)
    }

    fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// Read the `.npy` arrays of one event folder.
///
/// Newer recordings store `sample_numbers.npy` with `timestamps.npy` in
/// seconds; older ones store sample numbers in `timestamps.npy`. States come
/// from `states.npy` or `channel_states.npy` when present.
pub fn read_event_folder(folder: &Path, sample_rate: Option<f64>) -> Result<Vec<Event>> {
    let sample_numbers = folder.join("sample_numbers.npy");
    let timestamps = folder.join("timestamps.npy");

    let (samples, times): (Vec<i64>, Option<Vec<f64>>) = if sample_numbers.is_file() {
        let samples = read_npy(&sample_numbers)?.to_i64();
        let times = if timestamps.is_file() {
            Some(read_npy(&timestamps)?.to_f64())
        } else {
            None
        };
        (samples, times)
    } else if timestamps.is_file() {
        (read_npy(&timestamps)?.to_i64(), None)
    } else {
        return Err(EphysError::backend(
            FORMAT_NAME,
            folder.display().to_string(),
            "no sample_numbers.npy or timestamps.npy",
        ));
    };

    let states = ["states.npy", "channel_states.npy"]
        .iter()
        .map(|name| folder.join(name))
        .find(|p| p.is_file())
        .map(|p| read_npy(&p).map(|a| a.to_i64()))
        .transpose()?;

    for (what, len) in [
        ("timestamps", times.as_ref().map(Vec::len)),
        ("states", states.as_ref().map(Vec::len)),
    ] {
        if let Some(len) = len {
            if len != samples.len() {
                return Err(EphysError::backend(
                    FORMAT_NAME,
                    folder.display().to_string(),
                    format!("{what} hold {len} values for {} events", samples.len()),
                ));
            }
        }
    }

    Ok(samples
        .iter()
        .enumerate()
        .map(|(i, &sample)| Event {
            sample,
            time: match &times {
                Some(t) => Some(t[i]),
                None => sample_rate.filter(|r| *r > 0.0).map(|r| sample as f64 / r),
            },
            state: states.as_ref().map(|s| s[i]),
        })
        .collect())
}
