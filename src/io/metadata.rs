// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared metadata types for all recording formats.
//!
//! This module provides unified types for representing streams, sample
//! blocks and event markers regardless of the vendor format they come from.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Backend-native metadata attached to a stream or recording.
pub type Annotations = BTreeMap<String, String>;

/// Whether a stream carries electrode signals from a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Electrode signals from a physical probe
    Probe,
    /// Auxiliary analog/digital signals (NI-DAQ, ADC, accelerometer)
    Auxiliary,
}

/// Description of one logical stream exposed by a backend.
///
/// A stream is a group of channels sharing a sample rate and a data file
/// (e.g. one Neuropixels probe's action-potential band).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Vendor-defined stream name (e.g. "imec0.ap", "Signals CH")
    pub name: String,
    /// Probe or auxiliary stream
    pub kind: StreamKind,
    /// Sample rate in Hz, if the backend could read it
    pub sample_rate: Option<f64>,
    /// Number of channels exposed by the stream
    pub channel_count: usize,
    /// Data files backing the stream
    pub files: Vec<PathBuf>,
    /// Metadata file describing the stream (SpikeGLX `.meta`, Open Ephys `structure.oebin`)
    pub metadata_file: Option<PathBuf>,
    /// Trailing exposed channels with no electrode contact (SpikeGLX sync)
    pub sync_channels: usize,
}

impl StreamDescriptor {
    /// Create a new probe stream descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Probe,
            sample_rate: None,
            channel_count: 0,
            files: Vec::new(),
            metadata_file: None,
            sync_channels: 0,
        }
    }

    /// Set the stream kind.
    pub fn with_kind(mut self, kind: StreamKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Set the channel count.
    pub fn with_channel_count(mut self, count: usize) -> Self {
        self.channel_count = count;
        self
    }

    /// Add a data file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Set the metadata file.
    pub fn with_metadata_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_file = Some(path.into());
        self
    }

    /// Set the number of trailing sync channels.
    pub fn with_sync_channels(mut self, count: usize) -> Self {
        self.sync_channels = count;
        self
    }

    /// Number of channels that map to electrode contacts.
    pub fn electrode_channels(&self) -> usize {
        self.channel_count.saturating_sub(self.sync_channels)
    }

    /// Check if this stream comes from a probe.
    pub fn is_probe(&self) -> bool {
        self.kind == StreamKind::Probe
    }
}

/// A block of samples read from a stream.
///
/// Samples are stored row-major: `data[frame * num_channels + channel]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Traces {
    /// Number of frames (samples per channel)
    pub num_frames: usize,
    /// Number of channels in the block
    pub num_channels: usize,
    /// Raw integer samples
    pub data: Vec<i16>,
}

impl Traces {
    /// Create an empty block.
    pub fn new(num_frames: usize, num_channels: usize) -> Self {
        Self {
            num_frames,
            num_channels,
            data: Vec::with_capacity(num_frames * num_channels),
        }
    }

    /// Get one sample.
    pub fn get(&self, frame: usize, channel: usize) -> Option<i16> {
        if channel >= self.num_channels {
            return None;
        }
        self.data.get(frame * self.num_channels + channel).copied()
    }

    /// Collect a single channel's samples.
    pub fn channel(&self, channel: usize) -> Vec<i16> {
        if channel >= self.num_channels {
            return Vec::new();
        }
        self.data
            .iter()
            .skip(channel)
            .step_by(self.num_channels)
            .copied()
            .collect()
    }
}

/// Description of one event channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EventChannel {
    /// Channel name (e.g. "Rhythm_FPGA-100.0/TTL_1")
    pub name: String,
    /// Event stream the channel belongs to
    pub stream: String,
    /// Sample rate used to convert sample numbers to seconds
    pub sample_rate: Option<f64>,
    /// Directory holding the `.npy` files
    pub folder: PathBuf,
}

/// A single timestamped event marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Sample number or timestamp as stored by the acquisition system
    pub sample: i64,
    /// Time in seconds, if a sample rate is known
    pub time: Option<f64>,
    /// Signed line state (positive rising, negative falling), if stored
    pub state: Option<i64>,
}
