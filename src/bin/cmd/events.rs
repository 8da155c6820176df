// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Events command - list Open Ephys event channels.

use std::path::PathBuf;

use clap::Args;

use crate::common::{open_options, Result};
use crate::GlobalArgs;
use ephysio::read_openephys_event;

/// List event channels.
#[derive(Args, Clone, Debug)]
pub struct EventsCmd {
    /// Open Ephys recording folder
    #[arg(value_name = "DIR")]
    input: PathBuf,

    /// Restrict to one event stream
    #[arg(short, long)]
    stream: Option<String>,

    /// Print every event instead of a count
    #[arg(long)]
    all: bool,
}

impl EventsCmd {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let options = open_options(global)?;
        let events = read_openephys_event(&self.input, self.stream.as_deref(), &options)?;

        println!("=== Events in {} ===", self.input.display());
        println!("Streams: {}", events.stream_names().join(", "));
        println!();

        for channel in events.channels() {
            let markers = events.events(&channel.name)?;
            println!("{}: {} events", channel.name, markers.len());
            if self.all {
                for event in &markers {
                    let time = event
                        .time
                        .map(|t| format!("{t:.6}s"))
                        .unwrap_or_else(|| "-".to_string());
                    let state = event
                        .state
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("  {} | {} | {}", event.sample, time, state);
                }
            }
        }

        Ok(())
    }
}
