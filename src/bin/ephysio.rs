// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # ephysio CLI
//!
//! Command-line tool for inspecting electrophysiology recording folders.
//!
//! ## Usage
//!
//! ```sh
//! # List the streams of a folder
//! ephysio inspect streams /data/run1
//!
//! # Show one stream
//! ephysio inspect info /data/run1 --stream imec0.ap
//!
//! # Print reconstruction parameters as JSON
//! ephysio inspect params /data/run1 --stream imec0.ap
//!
//! # List Open Ephys event channels
//! ephysio events /data/session
//!
//! # Show attached probe geometry
//! ephysio probe /data/run1 --stream imec0.ap
//! ```

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use cmd::{EventsCmd, InspectCmd, ProbeCmd};
use common::Result;
use ephysio::FormatTag;

/// ephysio - electrophysiology recording toolkit
///
/// Open Ephys and SpikeGLX folders are recognised automatically.
#[derive(Parser, Clone)]
#[command(name = "ephysio")]
#[command(about = "Inspect Open Ephys and SpikeGLX recording folders", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Load open options from a TOML file
    #[arg(long, global = true, value_name = "FILE.toml")]
    pub options: Option<PathBuf>,

    /// Skip detection and read the folder as this format
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<FormatTag>,

    /// Keep the SpikeGLX sync channel
    #[arg(long, global = true)]
    pub sync_channel: bool,

    /// Load every backend annotation
    #[arg(long, global = true)]
    pub all_annotations: bool,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Inspect a recording folder (streams, info, params)
    #[command(subcommand)]
    Inspect(InspectCmd),

    /// List event channels of an Open Ephys folder
    Events(EventsCmd),

    /// Show the probe geometry attached to a stream
    Probe(ProbeCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(cmd) => cmd.run(&cli.global),
        Commands::Events(cmd) => cmd.run(&cli.global),
        Commands::Probe(cmd) => cmd.run(&cli.global),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
