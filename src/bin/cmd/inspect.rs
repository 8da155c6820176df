// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show streams, stream information, reconstruction params.

use std::path::PathBuf;

use clap::Subcommand;

use crate::common::{format_duration, format_rate, open_options, Result};
use crate::GlobalArgs;
use ephysio::io::detection::{resolve_format, FormatFamily};
use ephysio::io::formats::backend_for;
use ephysio::open_recording;

/// Inspect a recording folder.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// List every stream of the folder
    Streams {
        /// Recording folder
        #[arg(value_name = "DIR")]
        input: PathBuf,
    },

    /// Show information about one stream
    Info {
        /// Recording folder
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Stream to bind (required when the folder has several)
        #[arg(short, long)]
        stream: Option<String>,
    },

    /// Print the parameters that reopen the same recording, as JSON
    Params {
        /// Recording folder
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Stream to bind
        #[arg(short, long)]
        stream: Option<String>,
    },
}

impl InspectCmd {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        match self {
            InspectCmd::Streams { input } => cmd_streams(input, global),
            InspectCmd::Info { input, stream } => cmd_info(input, stream, global),
            InspectCmd::Params { input, stream } => cmd_params(input, stream, global),
        }
    }
}

/// Cmd: List streams
fn cmd_streams(input: PathBuf, global: &GlobalArgs) -> Result<()> {
    let options = open_options(global)?;
    let format = resolve_format(&input, FormatFamily::Any, options.format)?;
    let streams = backend_for(format).list_streams(&input, &options)?;

    println!("=== {} ===", input.display());
    println!("Format: {}", format.display_name());
    println!("Streams: {}", streams.len());
    println!();
    for stream in &streams {
        println!(
            "  {} | {:?} | {} channels | {}",
            stream.name,
            stream.kind,
            stream.channel_count,
            format_rate(stream.sample_rate)
        );
    }

    Ok(())
}

/// Cmd: Show stream info
fn cmd_info(input: PathBuf, stream: Option<String>, global: &GlobalArgs) -> Result<()> {
    let options = open_options(global)?;
    let recording = open_recording(&input, stream.as_deref(), &options)?;

    println!("=== {} ===", input.display());
    println!("Format: {}", recording.format().display_name());
    println!("Stream: {}", recording.stream_name());
    println!("Channels: {}", recording.num_channels());
    println!("Sample rate: {}", format_rate(Some(recording.sample_rate())));
    println!("Samples: {}", recording.num_samples());
    println!("Duration: {}", format_duration(recording.duration()));
    match recording.probe() {
        Some(probe) => {
            println!(
                "Probe: {} contacts, {} shank(s), {:?}",
                probe.geometry.len(),
                probe.geometry.num_shanks(),
                probe.group_mode
            );
            if probe.unplaced_channels > 0 {
                println!("Unplaced channels: {}", probe.unplaced_channels);
            }
        }
        None => println!("Probe: none"),
    }

    if !recording.annotations().is_empty() {
        println!();
        println!("Annotations:");
        for (key, value) in recording.annotations() {
            println!("  {key}: {value}");
        }
    }

    Ok(())
}

/// Cmd: Print reconstruction params
fn cmd_params(input: PathBuf, stream: Option<String>, global: &GlobalArgs) -> Result<()> {
    let options = open_options(global)?;
    let recording = open_recording(&input, stream.as_deref(), &options)?;
    println!("{}", recording.params().to_json()?);
    Ok(())
}
