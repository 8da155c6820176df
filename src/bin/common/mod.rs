// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use anyhow::Context as _;
use ephysio::OpenOptions;

use crate::GlobalArgs;

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Build open options from the TOML file (if any) and the command-line flags.
///
/// Flags only ever switch a setting on, so a flag and a file never conflict.
pub fn open_options(global: &GlobalArgs) -> Result<OpenOptions> {
    let mut options = match &global.options {
        Some(path) => OpenOptions::from_toml_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => OpenOptions::default(),
    };

    if let Some(format) = global.format {
        options.format = Some(format);
    }
    if global.sync_channel {
        options.load_sync_channel = true;
    }
    if global.all_annotations {
        options.all_annotations = true;
    }
    Ok(options)
}

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "unknown".to_string();
    }
    let whole = secs as u64;
    if whole >= 3600 {
        format!("{}h {}m", whole / 3600, (whole % 3600) / 60)
    } else if whole >= 60 {
        format!("{}m {}s", whole / 60, whole % 60)
    } else if whole > 0 {
        format!("{secs:.3}s")
    } else {
        format!("{}ms", (secs * 1000.0).round() as u64)
    }
}

/// Format a sample rate.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) if r >= 1000.0 => format!("{:.1} kHz", r / 1000.0),
        Some(r) => format!("{r} Hz"),
        None => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.25), "250ms");
        assert_eq!(format_duration(1.5), "1.500s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m");
        assert_eq!(format_duration(f64::NAN), "unknown");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(Some(30000.0)), "30.0 kHz");
        assert_eq!(format_rate(Some(500.0)), "500 Hz");
        assert_eq!(format_rate(None), "?");
    }

    #[test]
    fn test_flags_override_defaults() {
        let global = GlobalArgs {
            sync_channel: true,
            format: Some(ephysio::FormatTag::SpikeGlx),
            ..Default::default()
        };
        let options = open_options(&global).unwrap();
        assert!(options.load_sync_channel);
        assert!(!options.all_annotations);
        assert_eq!(options.format, Some(ephysio::FormatTag::SpikeGlx));
    }
}
