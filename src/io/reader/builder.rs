// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder for opening recordings.
//!
//! The `RecordingBuilder` runs the whole binding pipeline:
//! classify the folder, list streams, resolve one, bind it, then attach
//! probe geometry when the format's table row allows it.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::io::catalog::StreamCatalog;
use crate::io::detection::{format_spec, resolve_format, FormatFamily, FormatSpec, GeometrySource};
use crate::io::formats::backend_for;
use crate::io::metadata::StreamDescriptor;
use crate::io::options::OpenOptions;
use crate::io::traits::FormatBackend;
use crate::probe::{
    attach_with_unplaced, resolver_for, AttachedProbe, GroupMode, ProbeGeometry, ProbeResolver,
};
use crate::{EphysError, Result};

use super::{OpenParams, Recording};

/// Builder for [`Recording`] handles.
///
/// # Example
///
/// ```rust,no_run
/// use ephysio::io::reader::RecordingBuilder;
/// use ephysio::FormatFamily;
///
/// let recording = RecordingBuilder::new()
///     .path("/data/run1")
///     .family(FormatFamily::SpikeGlx)
///     .stream("imec0.ap")
///     .build()?;
/// println!("{} channels", recording.num_channels());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RecordingBuilder {
    path: PathBuf,
    stream_id: Option<String>,
    family: FormatFamily,
    options: OpenOptions,
    backend: Option<Box<dyn FormatBackend>>,
    resolver: Option<Box<dyn ProbeResolver>>,
}

impl Default for RecordingBuilder {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            stream_id: None,
            family: FormatFamily::Any,
            options: OpenOptions::default(),
            backend: None,
            resolver: None,
        }
    }
}

impl RecordingBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the recording folder.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Select a stream by name.
    pub fn stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    /// Select a stream, or none.
    pub fn stream_opt(mut self, stream_id: Option<&str>) -> Self {
        self.stream_id = stream_id.map(str::to_string);
        self
    }

    /// Restrict classification to a vendor family.
    pub fn family(mut self, family: FormatFamily) -> Self {
        self.family = family;
        self
    }

    /// Set the open options.
    pub fn options(mut self, options: OpenOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom backend instead of the built-in one for the detected format.
    pub fn backend(mut self, backend: Box<dyn FormatBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use a custom geometry resolver.
    pub fn resolver(mut self, resolver: Box<dyn ProbeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Open the recording.
    ///
    /// # Errors
    ///
    /// - [`EphysError::Classification`] if the folder matches no format of the family
    /// - [`EphysError::StreamAmbiguity`] if the stream cannot be resolved
    /// - [`EphysError::Backend`] if the backend cannot list or bind
    ///
    /// Geometry failures never fail the open.
    pub fn build(self) -> Result<Recording> {
        let dir = self.path.as_path();
        if dir.as_os_str().is_empty() {
            return Err(EphysError::classification("", "recording folder is not set"));
        }

        let tag = resolve_format(dir, self.family, self.options.format)?;
        let spec = format_spec(tag);
        let backend = self.backend.unwrap_or_else(|| backend_for(tag));

        let streams = backend.list_streams(dir, &self.options)?;
        let catalog = StreamCatalog::new(dir, streams);
        let stream = catalog.resolve(self.stream_id.as_deref())?;

        let source = backend.bind(dir, &stream, &self.options)?;
        debug!(
            directory = %dir.display(),
            format = %tag,
            stream = %stream.name,
            channels = source.channel_ids().len(),
            "bound recording"
        );

        let probe = if self.options.attach_probe {
            let resolver = self.resolver.or_else(|| resolver_for(tag));
            resolver.and_then(|r| {
                probe_for_stream(dir, spec, &stream, r.as_ref(), source.channel_ids().len())
            })
        } else {
            None
        };

        let params = OpenParams {
            folder_path: dir.to_path_buf(),
            stream_id: Some(stream.name.clone()),
            options: self.options.clone(),
            format: tag,
        };

        Ok(Recording {
            format: tag,
            stream,
            source,
            probe,
            params,
        })
    }
}

/// Look up and attach geometry for a bound stream.
///
/// Every failure downgrades to `None`.
fn probe_for_stream(
    dir: &Path,
    spec: &FormatSpec,
    stream: &StreamDescriptor,
    resolver: &dyn ProbeResolver,
    channel_count: usize,
) -> Option<AttachedProbe> {
    if !(spec.geometry_eligible)(stream) {
        debug!(stream = %stream.name, "stream not eligible for probe geometry");
        return None;
    }

    let geometry = match spec.geometry_source {
        GeometrySource::None => return None,
        GeometrySource::MetadataFile => {
            let meta = stream.metadata_file.as_deref()?;
            match resolver.resolve_from_metadata_file(meta) {
                Ok(geometry) => geometry,
                Err(e) => {
                    warn!(stream = %stream.name, error = %e, "probe geometry unavailable");
                    return None;
                }
            }
        }
        GeometrySource::Directory => match resolver.resolve_for_stream(dir, &stream.name) {
            Some(geometry) => geometry,
            None => {
                debug!(directory = %dir.display(), "no probe geometry found");
                return None;
            }
        },
    };

    match attach_with_fallback(geometry, channel_count, stream.sync_channels, spec.groups_by_shank) {
        Ok(probe) => Some(probe),
        Err(e) => {
            warn!(stream = %stream.name, error = %e, "probe geometry not attached");
            None
        }
    }
}

/// Attach grouped by shank when supported; retry ungrouped only when the
/// grouping itself failed.
pub(crate) fn attach_with_fallback(
    geometry: ProbeGeometry,
    channel_count: usize,
    unplaced: usize,
    by_shank: bool,
) -> Result<AttachedProbe> {
    if !by_shank {
        return attach_with_unplaced(geometry, channel_count, unplaced, GroupMode::Ungrouped);
    }
    match attach_with_unplaced(geometry.clone(), channel_count, unplaced, GroupMode::ByShank) {
        Err(e) if e.is_grouping_failure() => {
            debug!(error = %e, "retrying probe attachment without shank groups");
            attach_with_unplaced(geometry, channel_count, unplaced, GroupMode::Ungrouped)
        }
        other => other,
    }
}

/// Open a recording with the built-in backends.
pub(crate) fn open_in_family(
    dir: &Path,
    family: FormatFamily,
    stream_id: Option<&str>,
    options: &OpenOptions,
) -> Result<Recording> {
    RecordingBuilder::new()
        .path(dir)
        .family(family)
        .stream_opt(stream_id)
        .options(options.clone())
        .build()
}
