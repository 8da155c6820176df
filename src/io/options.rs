// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Options shared by every recording and event opener.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::FormatTag;
use crate::{EphysError, Result};

/// Options for opening a recording or event handle.
///
/// These options are shared across all format backends; a backend ignores
/// the ones that do not apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Load every backend-native annotation instead of the minimal set
    pub all_annotations: bool,

    /// Keep the trailing sync channel in SpikeGLX imec streams
    pub load_sync_channel: bool,

    /// Skip directory sniffing and use this format
    pub format: Option<FormatTag>,

    /// Try to attach probe geometry after binding
    pub attach_probe: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            all_annotations: false,
            load_sync_channel: false,
            format: None,
            attach_probe: true,
        }
    }
}

impl OpenOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all annotations.
    pub fn with_all_annotations(mut self, all: bool) -> Self {
        self.all_annotations = all;
        self
    }

    /// Keep or drop the sync channel.
    pub fn with_sync_channel(mut self, load: bool) -> Self {
        self.load_sync_channel = load;
        self
    }

    /// Force a format.
    pub fn with_format(mut self, format: FormatTag) -> Self {
        self.format = Some(format);
        self
    }

    /// Enable or disable probe attachment.
    pub fn with_probe(mut self, attach: bool) -> Self {
        self.attach_probe = attach;
        self
    }

    /// Load options from a TOML file.
    ///
    /// Missing keys take their default value.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| EphysError::io(path.display().to_string(), e))?;
        toml::from_str(&text).map_err(|e| EphysError::io(path.display().to_string(), e))
    }

    /// Parse options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EphysError::io("<toml>", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = OpenOptions::default();
        assert!(!opts.all_annotations);
        assert!(!opts.load_sync_channel);
        assert!(opts.format.is_none());
        assert!(opts.attach_probe);
    }

    #[test]
    fn test_from_toml_partial() {
        let opts = OpenOptions::from_toml_str("all_annotations = true\nformat = \"spikeglx\"\n")
            .unwrap();
        assert!(opts.all_annotations);
        assert_eq!(opts.format, Some(FormatTag::SpikeGlx));
        assert!(opts.attach_probe);
    }

    #[test]
    fn test_from_toml_rejects_bad_format() {
        assert!(OpenOptions::from_toml_str("format = \"nwb\"").is_err());
    }
}
