// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Open Ephys format support.
//!
//! Two on-disk layouts exist:
//! - [`legacy`]: one `.continuous` file per channel (GUI before 0.4.4)
//! - [`binary`]: one `continuous.dat` per stream described by `structure.oebin`
//!
//! Only the binary layout stores events in a readable form.

pub mod binary;
pub mod legacy;

pub use binary::{BinaryEventSource, BinarySource, OpenEphysBinaryBackend};
pub use legacy::{LegacySource, OpenEphysLegacyBackend};
