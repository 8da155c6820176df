// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for electrophysiology recordings.
//!
//! This module provides format classification, stream resolution, the
//! per-format backends and the handles that bind them together.

pub mod arena;
pub mod catalog;
pub mod detection;
pub mod formats;
pub mod metadata;
pub mod npy;
pub mod options;

// Re-exports
pub use arena::MmapArena;
pub use catalog::{resolve_stream, StreamCatalog};
pub use detection::{classify, classify_dir, resolve_format, DirectoryListing, FormatFamily, FORMATS};
pub use metadata::{Annotations, Event, EventChannel, StreamDescriptor, StreamKind, Traces};
pub use options::OpenOptions;

// Traits for format backends
pub mod traits;
pub use traits::{EventSource, FormatBackend, SignalSource};

// Recording and event handles
pub mod reader;
pub use reader::{
    open_events, open_recording, read_openephys, read_openephys_event, read_spikeglx,
    EventRecording, OpenParams, Recording, RecordingBuilder,
};
