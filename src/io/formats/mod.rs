// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format backend implementations.
//!
//! - [`openephys`]: Open Ephys legacy and binary layouts
//! - [`spikeglx`]: SpikeGLX `.meta` / `.bin` pairs

pub mod openephys;
pub mod spikeglx;

use crate::core::FormatTag;
use crate::io::traits::FormatBackend;

pub use openephys::{OpenEphysBinaryBackend, OpenEphysLegacyBackend};
pub use spikeglx::SpikeGlxBackend;

/// Built-in backend for a format.
pub fn backend_for(tag: FormatTag) -> Box<dyn FormatBackend> {
    match tag {
        FormatTag::OpenEphysLegacy => Box::new(OpenEphysLegacyBackend::new()),
        FormatTag::OpenEphysBinary => Box::new(OpenEphysBinaryBackend::new()),
        FormatTag::SpikeGlx => Box::new(SpikeGlxBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_tags_match() {
        for tag in [
            FormatTag::OpenEphysLegacy,
            FormatTag::OpenEphysBinary,
            FormatTag::SpikeGlx,
        ] {
            assert_eq!(backend_for(tag).tag(), tag);
        }
    }
}
