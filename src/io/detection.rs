// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format detection from directory contents.
//!
//! Recording folders carry no magic number, so the format is chosen from
//! the names of the folder's immediate entries. Each supported format has
//! one row in [`FORMATS`]; rows are tried in table order and the first
//! predicate that matches any entry wins. Only names are inspected: no
//! recursion and no content reads.
//!
//! # Supported Formats
//!
//! - **Open Ephys legacy**: any `*.continuous` entry
//! - **SpikeGLX**: any `*.meta` entry, or a per-probe `<run>_g<N>_imec<N>`
//!   folder
//! - **Open Ephys binary**: `structure.oebin`, `Record Node*` or `experiment*`
//!   entries; also the fallback of the Open Ephys family
//!
//! # Example
//!
//! ```rust,no_run
//! use ephysio::io::detection::{classify_dir, FormatFamily};
//! use ephysio::FormatTag;
//!
//! let format = classify_dir("/data/session1", FormatFamily::OpenEphys)?;
//! assert_eq!(format, FormatTag::OpenEphysBinary);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::core::FormatTag;
use crate::io::metadata::StreamDescriptor;
use crate::{EphysError, Result};

/// Suffix of Open Ephys legacy per-channel files.
pub const LEGACY_SUFFIX: &str = ".continuous";

/// Suffix of SpikeGLX metadata files.
pub const SPIKEGLX_META_SUFFIX: &str = ".meta";

/// Name of the Open Ephys binary structure file.
pub const OEBIN_FILE: &str = "structure.oebin";

/// Vendor family a caller asks for.
///
/// The family restricts which rows of [`FORMATS`] are considered and
/// decides the fallback when none matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    /// Open Ephys legacy or binary
    OpenEphys,
    /// SpikeGLX only
    SpikeGlx,
    /// Every supported format
    Any,
}

impl FormatFamily {
    /// Check whether a format belongs to this family.
    pub fn includes(&self, tag: FormatTag) -> bool {
        match self {
            FormatFamily::OpenEphys => matches!(
                tag,
                FormatTag::OpenEphysLegacy | FormatTag::OpenEphysBinary
            ),
            FormatFamily::SpikeGlx => tag == FormatTag::SpikeGlx,
            FormatFamily::Any => true,
        }
    }

    /// Format used when no predicate matched.
    pub fn fallback(&self) -> Option<FormatTag> {
        match self {
            FormatFamily::OpenEphys | FormatFamily::Any => Some(FormatTag::OpenEphysBinary),
            FormatFamily::SpikeGlx => None,
        }
    }
}

/// Where probe geometry for a stream is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    /// The stream's own metadata file
    MetadataFile,
    /// The recording folder and its subfolders
    Directory,
    /// The format carries no geometry
    None,
}

/// One row of the format table.
#[derive(Debug)]
pub struct FormatSpec {
    /// Format this row describes
    pub tag: FormatTag,
    /// Entry-name predicate; the format matches if any entry satisfies it
    pub matches: fn(&str) -> bool,
    /// Whether discrete event markers can be read from this format
    pub supports_events: bool,
    /// Whether probe geometry should be looked up for a stream
    pub geometry_eligible: fn(&StreamDescriptor) -> bool,
    /// Where geometry is looked up for eligible streams
    pub geometry_source: GeometrySource,
    /// Whether channels can be grouped by shank when geometry is attached
    pub groups_by_shank: bool,
}

fn is_legacy_entry(name: &str) -> bool {
    name.ends_with(LEGACY_SUFFIX)
}

fn spikeglx_probe_folder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.+_g\d+_imec\d+$").expect("valid regex"))
}

fn is_spikeglx_entry(name: &str) -> bool {
    name.ends_with(SPIKEGLX_META_SUFFIX) || spikeglx_probe_folder_regex().is_match(name)
}

fn is_binary_entry(name: &str) -> bool {
    name == OEBIN_FILE || name.starts_with("Record Node") || name.starts_with("experiment")
}

fn never(_: &StreamDescriptor) -> bool {
    false
}

fn probe_stream(stream: &StreamDescriptor) -> bool {
    stream.is_probe()
}

fn spikeglx_probe_stream(stream: &StreamDescriptor) -> bool {
    stream.is_probe() && !stream.name.contains("nidq")
}

/// Supported formats in priority order.
pub static FORMATS: [FormatSpec; 3] = [
    FormatSpec {
        tag: FormatTag::OpenEphysLegacy,
        matches: is_legacy_entry,
        supports_events: false,
        geometry_eligible: never,
        geometry_source: GeometrySource::None,
        groups_by_shank: false,
    },
    FormatSpec {
        tag: FormatTag::SpikeGlx,
        matches: is_spikeglx_entry,
        supports_events: false,
        geometry_eligible: spikeglx_probe_stream,
        geometry_source: GeometrySource::MetadataFile,
        groups_by_shank: true,
    },
    FormatSpec {
        tag: FormatTag::OpenEphysBinary,
        matches: is_binary_entry,
        supports_events: true,
        geometry_eligible: probe_stream,
        geometry_source: GeometrySource::Directory,
        groups_by_shank: false,
    },
];

/// Look up the table row of a format.
pub fn format_spec(tag: FormatTag) -> &'static FormatSpec {
    match tag {
        FormatTag::OpenEphysLegacy => &FORMATS[0],
        FormatTag::SpikeGlx => &FORMATS[1],
        FormatTag::OpenEphysBinary => &FORMATS[2],
    }
}

/// Names of the immediate entries of a directory, sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    directory: PathBuf,
    entries: Vec<String>,
}

impl DirectoryListing {
    /// List a directory's immediate entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn read<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let read_dir =
            std::fs::read_dir(dir).map_err(|e| EphysError::io(dir.display().to_string(), e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| EphysError::io(dir.display().to_string(), e))?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(Self::from_entries(dir, entries))
    }

    /// Build a listing from known entry names.
    pub fn from_entries<P, I, S>(dir: P, entries: I) -> Self
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        entries.sort();
        Self {
            directory: dir.as_ref().to_path_buf(),
            entries,
        }
    }

    /// Directory that was listed.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Entry names.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Check if any entry satisfies a predicate.
    pub fn any(&self, predicate: fn(&str) -> bool) -> bool {
        self.entries.iter().any(|e| predicate(e))
    }
}

/// Classify a listing within a format family.
///
/// # Errors
///
/// Returns [`EphysError::Classification`] when no predicate matched and the
/// family has no fallback.
pub fn classify(listing: &DirectoryListing, family: FormatFamily) -> Result<FormatTag> {
    let matched = FORMATS
        .iter()
        .filter(|spec| family.includes(spec.tag))
        .find(|spec| listing.any(spec.matches))
        .map(|spec| spec.tag);

    let directory = listing.directory().display().to_string();
    match matched.or_else(|| family.fallback()) {
        Some(tag) => {
            debug!(directory = %directory, format = %tag, fallback = matched.is_none(), "classified recording folder");
            Ok(tag)
        }
        None => Err(EphysError::classification(
            directory,
            format!("no entry matches a supported {family:?} format"),
        )),
    }
}

/// List a directory and classify it.
pub fn classify_dir<P: AsRef<Path>>(dir: P, family: FormatFamily) -> Result<FormatTag> {
    let listing = DirectoryListing::read(dir)?;
    classify(&listing, family)
}

/// Resolve the format of a directory, honouring an explicit override.
///
/// The override bypasses sniffing but must still belong to the family.
pub fn resolve_format<P: AsRef<Path>>(
    dir: P,
    family: FormatFamily,
    override_tag: Option<FormatTag>,
) -> Result<FormatTag> {
    let dir = dir.as_ref();
    match override_tag {
        Some(tag) if family.includes(tag) => Ok(tag),
        Some(tag) => Err(EphysError::classification(
            dir.display().to_string(),
            format!("format override '{tag}' is not a {family:?} format"),
        )),
        None => classify_dir(dir, family),
    }
}
