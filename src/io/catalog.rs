// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stream selection.
//!
//! A backend may expose several streams (one per probe and band, plus
//! auxiliary acquisition boards). Resolution never guesses between them:
//! a single stream is taken as-is, several require an exact name.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::io::metadata::StreamDescriptor;
use crate::{EphysError, Result};

/// Pick one stream from the available ones.
///
/// Rules, in order:
/// 1. Exactly one stream: return it, whatever `requested` says.
/// 2. `requested` names exactly one stream: return it.
/// 3. Otherwise fail with [`EphysError::StreamAmbiguity`] listing every name.
///
/// Pure: no I/O, no side effects.
pub fn resolve_stream(
    available: &[StreamDescriptor],
    requested: Option<&str>,
) -> Result<StreamDescriptor> {
    if let [only] = available {
        return Ok(only.clone());
    }

    if let Some(name) = requested {
        let mut hits = available.iter().filter(|s| s.name == name);
        if let (Some(hit), None) = (hits.next(), hits.next()) {
            return Ok(hit.clone());
        }
    }

    Err(EphysError::stream_ambiguity(
        "",
        requested,
        available.iter().map(|s| s.name.clone()).collect(),
    ))
}

/// The streams one backend exposes for one directory.
#[derive(Debug, Clone)]
pub struct StreamCatalog {
    directory: PathBuf,
    streams: Vec<StreamDescriptor>,
}

impl StreamCatalog {
    /// Create a catalog.
    pub fn new<P: AsRef<Path>>(directory: P, streams: Vec<StreamDescriptor>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            streams,
        }
    }

    /// All streams in backend order.
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Stream names in backend order.
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if the backend exposed no stream.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Resolve a stream, reporting the catalog's directory on failure.
    pub fn resolve(&self, requested: Option<&str>) -> Result<StreamDescriptor> {
        let stream = resolve_stream(&self.streams, requested)
            .map_err(|e| e.in_directory(self.directory.display().to_string()))?;
        debug!(
            directory = %self.directory.display(),
            requested = requested.unwrap_or(""),
            stream = %stream.name,
            "resolved stream"
        );
        Ok(stream)
    }
}
