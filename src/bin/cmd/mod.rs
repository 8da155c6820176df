// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod events;
mod inspect;
mod probe;

pub use events::EventsCmd;
pub use inspect::InspectCmd;
pub use probe::ProbeCmd;
