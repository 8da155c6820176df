// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # ephysio
//!
//! Format resolution and stream binding for electrophysiology recordings.
//!
//! This library opens Open Ephys (legacy and binary) and SpikeGLX recording
//! folders as uniform recording and event handles:
//! - **Classification** of a folder into a format in [`io::detection`]
//! - **Stream resolution** among the streams a format exposes in [`io::catalog`]
//! - **Backends** for each format in [`io::formats`]
//! - **Probe geometry** lookup and attachment in [`probe`]
//! - **Curation** of spike sorting results in [`curation`]
//!
//! ## Example: Opening a SpikeGLX probe stream
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ephysio::{read_spikeglx, OpenOptions};
//!
//! let recording = read_spikeglx("/data/run1", Some("imec0.ap"), &OpenOptions::default())?;
//! println!("{} channels at {} Hz", recording.num_channels(), recording.sample_rate());
//! if let Some(probe) = recording.probe() {
//!     println!("{} contacts", probe.geometry.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Reading Open Ephys events
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ephysio::{read_openephys_event, OpenOptions};
//!
//! let events = read_openephys_event("/data/session", None, &OpenOptions::default())?;
//! for channel in events.channels() {
//!     println!("{}: {} events", channel.name, events.events(&channel.name)?.len());
//! }
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{EphysError, FormatTag, Result};

// I/O types (detection, catalog, backends, handles)
pub mod io;

// Re-export key I/O types
pub use io::detection::FormatFamily;
pub use io::metadata::{Event, EventChannel, StreamDescriptor, StreamKind, Traces};
pub use io::options::OpenOptions;
pub use io::reader::{
    open_events, open_recording, read_openephys, read_openephys_event, read_spikeglx,
    EventRecording, OpenParams, Recording, RecordingBuilder,
};
pub use io::traits::{EventSource, FormatBackend, SignalSource};

// Probe geometry
pub mod probe;

pub use probe::{AttachedProbe, Contact, GroupMode, ProbeGeometry, ProbeResolver};

// Curation
pub mod curation;

pub use curation::{CurationSorting, Sorting};
