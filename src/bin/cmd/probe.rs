// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Probe command - show the geometry attached to a stream.

use std::path::PathBuf;

use clap::Args;

use crate::common::{open_options, Result};
use crate::GlobalArgs;
use ephysio::open_recording;

/// Show probe geometry.
#[derive(Args, Clone, Debug)]
pub struct ProbeCmd {
    /// Recording folder
    #[arg(value_name = "DIR")]
    input: PathBuf,

    /// Stream to bind
    #[arg(short, long)]
    stream: Option<String>,

    /// Print one line per contact
    #[arg(long)]
    contacts: bool,
}

impl ProbeCmd {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let options = open_options(global)?;
        let recording = open_recording(&self.input, self.stream.as_deref(), &options)?;

        let Some(probe) = recording.probe() else {
            println!("No probe geometry attached to {}", recording.stream_name());
            return Ok(());
        };

        println!("=== Probe of {} ===", recording.stream_name());
        println!(
            "Model: {}",
            probe.geometry.model.as_deref().unwrap_or("unknown")
        );
        println!("Contacts: {}", probe.geometry.len());
        println!("Shanks: {}", probe.geometry.num_shanks());
        println!("Grouping: {:?}", probe.group_mode);

        if self.contacts {
            println!();
            for ((id, contact), group) in recording
                .channel_ids()
                .iter()
                .zip(&probe.geometry.contacts)
                .zip(&probe.channel_groups)
            {
                println!("  {id} | x={} y={} | group {group}", contact.x, contact.y);
            }
        }

        Ok(())
    }
}
