// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Recording and event handles.
//!
//! This module ties classification, stream resolution and backend binding
//! together into the caller-facing openers:
//! - [`read_openephys`] / [`read_spikeglx`] / [`open_recording`] return a [`Recording`]
//! - [`read_openephys_event`] / [`open_events`] return an [`EventRecording`]
//!
//! # Example
//!
//! ```rust,no_run
//! use ephysio::io::reader::read_spikeglx;
//! use ephysio::OpenOptions;
//!
//! let recording = read_spikeglx("/data/run1", Some("imec0.ap"), &OpenOptions::default())?;
//! let traces = recording.read_traces(0, 30_000, None)?;
//! println!("{} frames", traces.num_frames);
//!
//! // Reconstruct the same handle later
//! let json = recording.params().to_json()?;
//! let again = ephysio::OpenParams::from_json(&json)?.reopen()?;
//! assert_eq!(again.stream_name(), recording.stream_name());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod events;

pub use builder::RecordingBuilder;
pub use events::{open_events, read_openephys_event, EventRecording};

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::FormatTag;
use crate::io::detection::FormatFamily;
use crate::io::metadata::{Annotations, StreamDescriptor, Traces};
use crate::io::options::OpenOptions;
use crate::io::traits::SignalSource;
use crate::probe::{attach_with_unplaced, AttachedProbe, GroupMode, ProbeGeometry};
use crate::{EphysError, Result};

/// Everything needed to open an equivalent recording again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenParams {
    /// Recording folder
    pub folder_path: PathBuf,
    /// Name of the stream that was bound
    pub stream_id: Option<String>,
    /// Options the recording was opened with
    pub options: OpenOptions,
    /// Format the folder resolved to
    pub format: FormatTag,
}

impl OpenParams {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EphysError::io("<json>", e))
    }

    /// Parse from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EphysError::io("<json>", e))
    }

    /// Open the recording these parameters describe.
    ///
    /// The recorded format is used as an override, so the folder is not
    /// classified again.
    pub fn reopen(&self) -> Result<Recording> {
        let mut options = self.options.clone();
        options.format = Some(self.format);
        RecordingBuilder::new()
            .path(&self.folder_path)
            .family(FormatFamily::Any)
            .stream_opt(self.stream_id.as_deref())
            .options(options)
            .build()
    }
}

/// A bound recording: one stream of one folder.
///
/// Format and stream are fixed at open time. Probe geometry is either
/// attached by the opener or later through [`Recording::with_probe`],
/// at most once.
pub struct Recording {
    pub(crate) format: FormatTag,
    pub(crate) stream: StreamDescriptor,
    pub(crate) source: Box<dyn SignalSource>,
    pub(crate) probe: Option<AttachedProbe>,
    pub(crate) params: OpenParams,
}

impl Recording {
    /// Format of the recording.
    pub fn format(&self) -> FormatTag {
        self.format
    }

    /// The bound stream.
    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    /// Name of the bound stream.
    pub fn stream_name(&self) -> &str {
        &self.stream.name
    }

    /// The backend source.
    pub fn source(&self) -> &dyn SignalSource {
        self.source.as_ref()
    }

    /// Channel identifiers.
    pub fn channel_ids(&self) -> &[String] {
        self.source.channel_ids()
    }

    /// Number of exposed channels.
    pub fn num_channels(&self) -> usize {
        self.source.channel_ids().len()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.source.sample_rate()
    }

    /// Number of frames.
    pub fn num_samples(&self) -> u64 {
        self.source.num_samples()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.source.duration()
    }

    /// Microvolts per raw unit, one per channel.
    pub fn gains(&self) -> &[f64] {
        self.source.gains()
    }

    /// Backend-native annotations.
    pub fn annotations(&self) -> &Annotations {
        self.source.annotations()
    }

    /// Read frames `[start, end)`.
    pub fn read_traces(&self, start: u64, end: u64, channels: Option<&[usize]>) -> Result<Traces> {
        self.source.read_traces(start, end, channels)
    }

    /// Attached probe, if any.
    pub fn probe(&self) -> Option<&AttachedProbe> {
        self.probe.as_ref()
    }

    /// Check if geometry is attached.
    pub fn has_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// Channel groups from the attached probe (all 0 without one).
    pub fn channel_groups(&self) -> Vec<u32> {
        match &self.probe {
            Some(p) => p.channel_groups.clone(),
            None => vec![0; self.num_channels()],
        }
    }

    /// Reconstruction parameters.
    pub fn params(&self) -> &OpenParams {
        &self.params
    }

    /// Attach probe geometry.
    ///
    /// Consumes the recording and returns it with geometry attached. Trailing
    /// sync channels of the stream stay without a contact.
    ///
    /// # Errors
    ///
    /// - [`EphysError::ProbeAlreadyAttached`] if geometry is already present
    /// - [`EphysError::Geometry`] if the geometry does not fit the channels
    pub fn with_probe(mut self, geometry: ProbeGeometry, mode: GroupMode) -> Result<Self> {
        if self.probe.is_some() {
            return Err(EphysError::ProbeAlreadyAttached);
        }
        let probe =
            attach_with_unplaced(geometry, self.num_channels(), self.stream.sync_channels, mode)?;
        debug!(stream = %self.stream.name, contacts = probe.geometry.len(), "attached probe");
        self.probe = Some(probe);
        Ok(self)
    }
}

impl fmt::Debug for Recording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording")
            .field("format", &self.format)
            .field("stream", &self.stream.name)
            .field("channels", &self.num_channels())
            .field("sample_rate", &self.sample_rate())
            .field("num_samples", &self.num_samples())
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

/// Open a recording of any supported format.
pub fn open_recording<P: AsRef<Path>>(
    folder_path: P,
    stream_id: Option<&str>,
    options: &OpenOptions,
) -> Result<Recording> {
    builder::open_in_family(folder_path.as_ref(), FormatFamily::Any, stream_id, options)
}

/// Open an Open Ephys recording (legacy or binary).
///
/// The layout is detected from the folder: any `.continuous` entry means
/// legacy, anything else is read as binary.
pub fn read_openephys<P: AsRef<Path>>(
    folder_path: P,
    stream_id: Option<&str>,
    options: &OpenOptions,
) -> Result<Recording> {
    builder::open_in_family(folder_path.as_ref(), FormatFamily::OpenEphys, stream_id, options)
}

/// Open a SpikeGLX recording.
pub fn read_spikeglx<P: AsRef<Path>>(
    folder_path: P,
    stream_id: Option<&str>,
    options: &OpenOptions,
) -> Result<Recording> {
    builder::open_in_family(folder_path.as_ref(), FormatFamily::SpikeGlx, stream_id, options)
}
