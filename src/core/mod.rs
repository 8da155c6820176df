// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout ephysio.
//!
//! - [`EphysError`] - Error handling for every stage of opening a recording
//! - [`FormatTag`] - Physical recording format identifier

pub mod error;

pub use error::{EphysError, Result};

use serde::{Deserialize, Serialize};

/// Physical recording format identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatTag {
    /// Open Ephys "legacy" format: one `.continuous` file per channel
    #[serde(rename = "openephys-legacy")]
    OpenEphysLegacy,
    /// Open Ephys "binary" format: one `continuous.dat` per stream
    #[serde(rename = "openephys-binary")]
    OpenEphysBinary,
    /// SpikeGLX `.meta` / `.bin` pairs, one pair per stream
    #[serde(rename = "spikeglx")]
    SpikeGlx,
}

/// Error returned when parsing a `FormatTag` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFormatTagError {
    _private: (),
}

impl std::fmt::Display for ParseFormatTagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid format name, expected 'openephys-legacy', 'openephys-binary', or 'spikeglx'"
        )
    }
}

impl std::error::Error for ParseFormatTagError {}

impl std::str::FromStr for FormatTag {
    type Err = ParseFormatTagError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "openephys-legacy" | "legacy" => Ok(FormatTag::OpenEphysLegacy),
            "openephys-binary" | "binary" => Ok(FormatTag::OpenEphysBinary),
            "spikeglx" => Ok(FormatTag::SpikeGlx),
            _ => Err(ParseFormatTagError { _private: () }),
        }
    }
}

impl FormatTag {
    /// Short machine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::OpenEphysLegacy => "openephys-legacy",
            FormatTag::OpenEphysBinary => "openephys-binary",
            FormatTag::SpikeGlx => "spikeglx",
        }
    }

    /// Human readable name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            FormatTag::OpenEphysLegacy => "Open Ephys legacy",
            FormatTag::OpenEphysBinary => "Open Ephys binary",
            FormatTag::SpikeGlx => "SpikeGLX",
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tag_from_str() {
        assert_eq!("spikeglx".parse::<FormatTag>().unwrap(), FormatTag::SpikeGlx);
        assert_eq!(
            "OpenEphys_Legacy".parse::<FormatTag>().unwrap(),
            FormatTag::OpenEphysLegacy
        );
        assert_eq!(
            "binary".parse::<FormatTag>().unwrap(),
            FormatTag::OpenEphysBinary
        );
        assert!("nwb".parse::<FormatTag>().is_err());
    }

    #[test]
    fn test_format_tag_round_trips_through_as_str() {
        for tag in [
            FormatTag::OpenEphysLegacy,
            FormatTag::OpenEphysBinary,
            FormatTag::SpikeGlx,
        ] {
            assert_eq!(tag.as_str().parse::<FormatTag>().unwrap(), tag);
        }
    }
}
