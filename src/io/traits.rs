// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core traits for format backends.
//!
//! This module defines the capability set every physical format provides:
//! listing streams, binding a sample source to one of them and, where the
//! format stores them, binding an event source. The binders only talk to
//! formats through these traits.

use std::any::Any;
use std::path::Path;

use crate::core::FormatTag;
use crate::io::options::OpenOptions;
use crate::{EphysError, Result};

use super::metadata::{Annotations, Event, EventChannel, StreamDescriptor, Traces};

/// Continuous sample access for one bound stream.
///
/// # Example
///
/// ```no_run
/// use ephysio::io::traits::SignalSource;
///
/// fn summarize(source: &dyn SignalSource) {
///     println!("{}: {} channels", source.stream().name, source.channel_ids().len());
///     println!("{:.1} s", source.duration());
/// }
/// ```
pub trait SignalSource: Send + Sync {
    /// The stream this source is bound to.
    fn stream(&self) -> &StreamDescriptor;

    /// Channel identifiers in storage order.
    fn channel_ids(&self) -> &[String];

    /// Sample rate in Hz.
    fn sample_rate(&self) -> f64;

    /// Number of frames (samples per channel).
    fn num_samples(&self) -> u64;

    /// Microvolts per raw unit, one per channel.
    fn gains(&self) -> &[f64];

    /// Backend-native annotations.
    fn annotations(&self) -> &Annotations;

    /// Read frames `[start, end)` for the given channel indices (all if `None`).
    ///
    /// # Errors
    ///
    /// Returns [`EphysError::OutOfRange`] for a bad frame range or channel index.
    fn read_traces(&self, start: u64, end: u64, channels: Option<&[usize]>) -> Result<Traces>;

    /// Duration in seconds.
    fn duration(&self) -> f64 {
        let rate = self.sample_rate();
        if rate > 0.0 {
            self.num_samples() as f64 / rate
        } else {
            0.0
        }
    }

    /// Downcast to `Any` for format-specific functionality.
    fn as_any(&self) -> &dyn Any;
}

/// Discrete event access.
pub trait EventSource: Send + Sync {
    /// All event channels.
    fn channels(&self) -> &[EventChannel];

    /// Events of one channel, in file order.
    fn events(&self, channel: &str) -> Result<Vec<Event>>;

    /// Backend-native annotations.
    fn annotations(&self) -> &Annotations;
}

/// Capability set of one physical recording format.
pub trait FormatBackend: Send + Sync {
    /// The format this backend reads.
    fn tag(&self) -> FormatTag;

    /// Enumerate the streams of a recording directory.
    fn list_streams(&self, dir: &Path, options: &OpenOptions) -> Result<Vec<StreamDescriptor>>;

    /// Bind a sample source to one stream.
    fn bind(
        &self,
        dir: &Path,
        stream: &StreamDescriptor,
        options: &OpenOptions,
    ) -> Result<Box<dyn SignalSource>>;

    /// Bind an event source. Formats without events keep the default.
    fn bind_events(&self, dir: &Path, _options: &OpenOptions) -> Result<Box<dyn EventSource>> {
        Err(EphysError::events_not_supported(
            dir.display().to_string(),
            self.tag().display_name(),
        ))
    }
}

/// Check a frame range and channel selection against a source's shape.
///
/// Returns the selected channel indices.
pub fn check_read_range(
    start: u64,
    end: u64,
    num_samples: u64,
    num_channels: usize,
    channels: Option<&[usize]>,
) -> Result<Vec<usize>> {
    if start > end {
        return Err(EphysError::out_of_range("start frame", start, end));
    }
    if end > num_samples {
        return Err(EphysError::out_of_range("end frame", end, num_samples));
    }
    match channels {
        None => Ok((0..num_channels).collect()),
        Some(list) => {
            if let Some(&bad) = list.iter().find(|&&c| c >= num_channels) {
                return Err(EphysError::out_of_range(
                    "channel index",
                    bad as u64,
                    num_channels as u64,
                ));
            }
            Ok(list.to_vec())
        }
    }
}
