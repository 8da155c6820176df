// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Probe geometry.
//!
//! A [`ProbeGeometry`] lists one contact per recorded electrode channel with
//! its position on the probe. Geometry comes from a [`ProbeResolver`]:
//! - [`spikeglx::SpikeGlxProbeResolver`] reads the geometry tables of a `.meta` file
//! - [`openephys::OpenEphysProbeResolver`] reads Neuropixels electrode
//!   positions from `settings.xml`
//!
//! Attaching geometry to a recording checks that contacts and channels line
//! up one to one, and optionally groups channels by shank.

pub mod openephys;
pub mod spikeglx;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::FormatTag;
use crate::{EphysError, Result};

pub use openephys::OpenEphysProbeResolver;
pub use spikeglx::SpikeGlxProbeResolver;

/// One electrode contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Horizontal position in µm
    pub x: f64,
    /// Vertical position (depth along the shank) in µm
    pub y: f64,
    /// Shank index, if the source records one
    pub shank: Option<u32>,
}

impl Contact {
    /// Create a contact without shank information.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, shank: None }
    }

    /// Set the shank index.
    pub fn with_shank(mut self, shank: u32) -> Self {
        self.shank = Some(shank);
        self
    }
}

/// Contact positions of a probe, in channel order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeGeometry {
    /// Probe model or part number
    pub model: Option<String>,
    /// Contacts in channel order
    pub contacts: Vec<Contact>,
}

impl ProbeGeometry {
    /// Create a geometry from contacts.
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self {
            model: None,
            contacts,
        }
    }

    /// Set the probe model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Check if the geometry has no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Shank index of every contact, if all contacts carry one.
    pub fn shank_ids(&self) -> Option<Vec<u32>> {
        self.contacts.iter().map(|c| c.shank).collect()
    }

    /// Number of distinct shanks (1 without shank information).
    pub fn num_shanks(&self) -> usize {
        match self.shank_ids() {
            Some(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                ids.len().max(1)
            }
            None => 1,
        }
    }
}

/// How channels are grouped when geometry is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// One channel group per shank
    ByShank,
    /// All channels in group 0
    Ungrouped,
}

/// Geometry bound to a recording's channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedProbe {
    /// The geometry, one contact per channel
    pub geometry: ProbeGeometry,
    /// Grouping that was applied
    pub group_mode: GroupMode,
    /// Group of each channel, unplaced channels included
    pub channel_groups: Vec<u32>,
    /// Trailing channels without a contact
    #[serde(default)]
    pub unplaced_channels: usize,
}

/// Bind geometry to `channel_count` channels.
///
/// # Errors
///
/// - [`EphysError::Geometry`] without the grouping flag when the contact
///   count differs from the channel count
/// - [`EphysError::Geometry`] with the grouping flag when `ByShank` is
///   requested but some contact has no shank index
pub fn attach(
    geometry: ProbeGeometry,
    channel_count: usize,
    mode: GroupMode,
) -> Result<AttachedProbe> {
    attach_with_unplaced(geometry, channel_count, 0, mode)
}

/// Bind geometry to the leading channels, leaving `unplaced` trailing
/// channels (e.g. a sync channel) without a contact.
///
/// Contacts must match `channel_count - unplaced`. Unplaced channels get
/// their own group after the electrode groups.
pub fn attach_with_unplaced(
    geometry: ProbeGeometry,
    channel_count: usize,
    unplaced: usize,
    mode: GroupMode,
) -> Result<AttachedProbe> {
    let placed = channel_count.saturating_sub(unplaced);
    if geometry.len() != placed {
        return Err(EphysError::geometry(format!(
            "probe has {} contacts but the recording has {placed} electrode channels",
            geometry.len()
        )));
    }

    let mut channel_groups = match mode {
        GroupMode::ByShank => geometry.shank_ids().ok_or_else(|| {
            EphysError::grouping("probe contacts carry no shank index")
        })?,
        GroupMode::Ungrouped => vec![0; placed],
    };
    let extra_group = channel_groups.iter().max().map_or(0, |g| g + 1);
    channel_groups.resize(channel_count, extra_group);

    Ok(AttachedProbe {
        geometry,
        group_mode: mode,
        channel_groups,
        unplaced_channels: channel_count - placed,
    })
}

/// Source of probe geometry.
pub trait ProbeResolver: Send + Sync {
    /// Look for geometry in or below a recording folder.
    ///
    /// Returns `None` when nothing usable is found.
    fn resolve(&self, path: &Path) -> Option<ProbeGeometry>;

    /// Read geometry from one metadata file.
    fn resolve_from_metadata_file(&self, path: &Path) -> Result<ProbeGeometry>;

    /// Look for the geometry of one named stream in or below a folder.
    ///
    /// Resolvers whose source can describe several probes override this to
    /// pick the probe recorded by `stream`.
    fn resolve_for_stream(&self, path: &Path, _stream: &str) -> Option<ProbeGeometry> {
        self.resolve(path)
    }
}

/// Built-in resolver for a format, if the format carries geometry.
pub fn resolver_for(tag: FormatTag) -> Option<Box<dyn ProbeResolver>> {
    match tag {
        FormatTag::SpikeGlx => Some(Box::new(SpikeGlxProbeResolver::new())),
        FormatTag::OpenEphysBinary => Some(Box::new(OpenEphysProbeResolver::new())),
        FormatTag::OpenEphysLegacy => None,
    }
}
