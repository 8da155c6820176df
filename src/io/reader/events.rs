// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Event handles.
//!
//! Events are only readable from formats whose table row sets
//! `supports_events`. Any other format is rejected right after
//! classification, before a backend is built.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::core::FormatTag;
use crate::io::catalog::StreamCatalog;
use crate::io::detection::{format_spec, resolve_format, FormatFamily};
use crate::io::formats::backend_for;
use crate::io::metadata::{Annotations, Event, EventChannel, StreamDescriptor};
use crate::io::options::OpenOptions;
use crate::io::traits::EventSource;
use crate::{EphysError, Result};

/// Discrete event markers of one recording.
pub struct EventRecording {
    format: FormatTag,
    source: Box<dyn EventSource>,
    stream: Option<String>,
}

impl EventRecording {
    /// Format of the recording.
    pub fn format(&self) -> FormatTag {
        self.format
    }

    /// Distinct event stream names, in channel order.
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for channel in self.source.channels() {
            if !names.contains(&channel.stream) {
                names.push(channel.stream.clone());
            }
        }
        names
    }

    /// Restrict the handle to one event stream.
    ///
    /// Resolution follows the same rules as for continuous streams: a single
    /// stream is taken as-is, otherwise `requested` must name one exactly.
    pub fn select_stream(mut self, requested: Option<&str>) -> Result<Self> {
        let streams = self
            .stream_names()
            .into_iter()
            .map(StreamDescriptor::new)
            .collect();
        let stream = StreamCatalog::new("", streams).resolve(requested)?;
        self.stream = Some(stream.name);
        Ok(self)
    }

    /// Selected event stream, if one was selected.
    pub fn selected_stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    /// Event channels, restricted to the selected stream.
    pub fn channels(&self) -> Vec<&EventChannel> {
        self.source
            .channels()
            .iter()
            .filter(|c| self.stream.as_ref().map_or(true, |s| &c.stream == s))
            .collect()
    }

    /// Events of one channel.
    pub fn events(&self, channel: &str) -> Result<Vec<Event>> {
        if !self.channels().iter().any(|c| c.name == channel) {
            return Err(EphysError::stream_ambiguity(
                "",
                Some(channel),
                self.channels().iter().map(|c| c.name.clone()).collect(),
            ));
        }
        self.source.events(channel)
    }

    /// Backend-native annotations.
    pub fn annotations(&self) -> &Annotations {
        self.source.annotations()
    }
}

impl fmt::Debug for EventRecording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecording")
            .field("format", &self.format)
            .field("channels", &self.source.channels().len())
            .field("stream", &self.stream)
            .finish()
    }
}

/// Open the events of an Open Ephys folder.
///
/// # Errors
///
/// - [`EphysError::EventsNotSupported`] if the folder holds a format without
///   readable events (e.g. legacy `.continuous` files); no backend is built
/// - [`EphysError::Backend`] if the event files cannot be read
pub fn open_events<P: AsRef<Path>>(folder_path: P, options: &OpenOptions) -> Result<EventRecording> {
    let dir = folder_path.as_ref();
    let tag = resolve_format(dir, FormatFamily::OpenEphys, options.format)?;

    if !format_spec(tag).supports_events {
        return Err(EphysError::events_not_supported(
            dir.display().to_string(),
            tag.display_name(),
        ));
    }

    let source = backend_for(tag).bind_events(dir, options)?;
    debug!(directory = %dir.display(), format = %tag, channels = source.channels().len(), "opened events");
    Ok(EventRecording {
        format: tag,
        source,
        stream: None,
    })
}

/// Open the events of an Open Ephys folder, optionally restricted to one stream.
pub fn read_openephys_event<P: AsRef<Path>>(
    folder_path: P,
    stream_id: Option<&str>,
    options: &OpenOptions,
) -> Result<EventRecording> {
    let events = open_events(folder_path, options)?;
    match stream_id {
        Some(_) => events.select_stream(stream_id),
        None => Ok(events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FixedEvents {
        channels: Vec<EventChannel>,
        annotations: Annotations,
    }

    impl EventSource for FixedEvents {
        fn channels(&self) -> &[EventChannel] {
            &self.channels
        }

        fn events(&self, _channel: &str) -> Result<Vec<Event>> {
            Ok(vec![Event {
                sample: 1,
                time: None,
                state: Some(1),
            }])
        }

        fn annotations(&self) -> &Annotations {
            &self.annotations
        }
    }

    fn channel(name: &str, stream: &str) -> EventChannel {
        EventChannel {
            name: name.into(),
            stream: stream.into(),
            sample_rate: None,
            folder: PathBuf::new(),
        }
    }

    fn handle() -> EventRecording {
        EventRecording {
            format: FormatTag::OpenEphysBinary,
            source: Box::new(FixedEvents {
                channels: vec![
                    channel("ProbeA/TTL", "ProbeA"),
                    channel("NI-DAQ/TTL", "NI-DAQ"),
                    channel("ProbeA/MSG", "ProbeA"),
                ],
                annotations: Annotations::new(),
            }),
            stream: None,
        }
    }

    #[test]
    fn test_stream_names_and_selection() {
        let events = handle();
        assert_eq!(events.stream_names(), vec!["ProbeA", "NI-DAQ"]);
        assert_eq!(events.channels().len(), 3);

        let err = handle().select_stream(None).unwrap_err();
        assert!(matches!(err, EphysError::StreamAmbiguity { .. }));

        let probe_a = handle().select_stream(Some("ProbeA")).unwrap();
        assert_eq!(probe_a.selected_stream(), Some("ProbeA"));
        assert_eq!(probe_a.channels().len(), 2);
        assert!(probe_a.events("ProbeA/TTL").is_ok());
        assert!(probe_a.events("NI-DAQ/TTL").is_err());
    }

    #[test]
    fn test_legacy_folder_rejected_before_backend() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("ephysio_test_events_legacy_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        // an empty file: a legacy backend would fail to parse it
        std::fs::write(dir.join("106_CH1.continuous"), b"").unwrap();

        let err = open_events(&dir, &OpenOptions::default()).unwrap_err();
        assert!(matches!(err, EphysError::EventsNotSupported { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
