// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for ephysio.
//!
//! Provides error types for recording resolution:
//! - Format classification
//! - Stream selection
//! - Backend construction (propagated from the format readers)
//! - Probe geometry attachment
//! - Curation bookkeeping

use std::fmt;

/// Errors that can occur while opening or using a recording.
#[derive(Debug, Clone)]
pub enum EphysError {
    /// No known format matched the directory
    Classification {
        /// Directory that was inspected
        directory: String,
        /// Why classification failed
        reason: String,
    },

    /// The directory matched a format that cannot provide events
    EventsNotSupported {
        /// Directory that was inspected
        directory: String,
        /// Name of the detected format
        format: String,
    },

    /// Several streams exist and the selector did not pick exactly one
    StreamAmbiguity {
        /// Directory that was inspected
        directory: String,
        /// Selector given by the caller, if any
        requested: Option<String>,
        /// Every stream name the backend reported
        available: Vec<String>,
    },

    /// The format backend failed to parse or bind
    Backend {
        /// Name of the format whose backend failed
        format: String,
        /// File or directory being read
        path: String,
        /// Error message
        message: String,
    },

    /// Probe geometry could not be attached
    Geometry {
        /// Why attachment failed
        reason: String,
        /// Whether the failure is specific to shank grouping
        grouping: bool,
    },

    /// Probe geometry was already attached to the recording
    ProbeAlreadyAttached,

    /// A sample or channel range lies outside the recording
    OutOfRange {
        /// What was out of range
        what: String,
        /// Requested index or bound
        requested: u64,
        /// Exclusive upper limit
        limit: u64,
    },

    /// Unit id not present in the sorting
    UnknownUnit {
        /// The missing unit id
        unit_id: i64,
    },

    /// Invalid curation request
    Curation {
        /// Error message
        message: String,
    },

    /// I/O error outside any backend
    Io {
        /// Path involved
        path: String,
        /// Error message
        message: String,
    },
}

impl EphysError {
    /// Create a classification error.
    pub fn classification(directory: impl Into<String>, reason: impl Into<String>) -> Self {
        EphysError::Classification {
            directory: directory.into(),
            reason: reason.into(),
        }
    }

    /// Create an "events not supported" error.
    pub fn events_not_supported(directory: impl Into<String>, format: impl Into<String>) -> Self {
        EphysError::EventsNotSupported {
            directory: directory.into(),
            format: format.into(),
        }
    }

    /// Create a stream ambiguity error.
    pub fn stream_ambiguity(
        directory: impl Into<String>,
        requested: Option<&str>,
        available: Vec<String>,
    ) -> Self {
        EphysError::StreamAmbiguity {
            directory: directory.into(),
            requested: requested.map(str::to_string),
            available,
        }
    }

    /// Create a backend error.
    pub fn backend(
        format: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EphysError::Backend {
            format: format.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a geometry error that shank grouping caused.
    pub fn grouping(reason: impl Into<String>) -> Self {
        EphysError::Geometry {
            reason: reason.into(),
            grouping: true,
        }
    }

    /// Create a geometry error unrelated to grouping.
    pub fn geometry(reason: impl Into<String>) -> Self {
        EphysError::Geometry {
            reason: reason.into(),
            grouping: false,
        }
    }

    /// Create an out of range error.
    pub fn out_of_range(what: impl Into<String>, requested: u64, limit: u64) -> Self {
        EphysError::OutOfRange {
            what: what.into(),
            requested,
            limit,
        }
    }

    /// Create a curation error.
    pub fn curation(message: impl Into<String>) -> Self {
        EphysError::Curation {
            message: message.into(),
        }
    }

    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, err: impl fmt::Display) -> Self {
        EphysError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Attach the directory to a stream ambiguity error raised without one.
    pub fn in_directory(self, dir: impl Into<String>) -> Self {
        match self {
            EphysError::StreamAmbiguity {
                requested,
                available,
                ..
            } => EphysError::StreamAmbiguity {
                directory: dir.into(),
                requested,
                available,
            },
            other => other,
        }
    }

    /// True for failures of shank-grouped attachment that an ungrouped retry may fix.
    pub fn is_grouping_failure(&self) -> bool {
        matches!(self, EphysError::Geometry { grouping: true, .. })
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            EphysError::Classification { directory, reason } => {
                vec![("directory", directory.clone()), ("reason", reason.clone())]
            }
            EphysError::EventsNotSupported { directory, format } => {
                vec![("directory", directory.clone()), ("format", format.clone())]
            }
            EphysError::StreamAmbiguity {
                directory,
                requested,
                available,
            } => vec![
                ("directory", directory.clone()),
                ("requested", requested.clone().unwrap_or_default()),
                ("available", available.join(",")),
            ],
            EphysError::Backend {
                format,
                path,
                message,
            } => vec![
                ("format", format.clone()),
                ("path", path.clone()),
                ("message", message.clone()),
            ],
            EphysError::Geometry { reason, grouping } => {
                vec![("reason", reason.clone()), ("grouping", grouping.to_string())]
            }
            EphysError::ProbeAlreadyAttached => vec![],
            EphysError::OutOfRange {
                what,
                requested,
                limit,
            } => vec![
                ("what", what.clone()),
                ("requested", requested.to_string()),
                ("limit", limit.to_string()),
            ],
            EphysError::UnknownUnit { unit_id } => vec![("unit", unit_id.to_string())],
            EphysError::Curation { message } => vec![("message", message.clone())],
            EphysError::Io { path, message } => {
                vec![("path", path.clone()), ("message", message.clone())]
            }
        }
    }
}

impl fmt::Display for EphysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EphysError::Classification { directory, reason } => {
                write!(f, "Cannot classify '{directory}': {reason}")
            }
            EphysError::EventsNotSupported { directory, format } => write!(
                f,
                "Events not supported for the {format} format found in '{directory}'"
            ),
            EphysError::StreamAmbiguity {
                directory,
                requested,
                available,
            } => {
                let location = if directory.is_empty() {
                    String::new()
                } else {
                    format!(" in '{directory}'")
                };
                if available.is_empty() {
                    return write!(f, "No streams found{location}");
                }
                match requested {
                    Some(r) => write!(f, "Stream '{r}' not found{location}")?,
                    None => write!(f, "Several streams found{location}")?,
                }
                write!(
                    f,
                    ", specify one with stream_id; available streams: {}",
                    available.join(", ")
                )
            }
            EphysError::Backend {
                format,
                path,
                message,
            } => write!(f, "{format} reader failed on '{path}': {message}"),
            EphysError::Geometry { reason, grouping } => {
                if *grouping {
                    write!(f, "Cannot group probe by shank: {reason}")
                } else {
                    write!(f, "Cannot attach probe geometry: {reason}")
                }
            }
            EphysError::ProbeAlreadyAttached => {
                write!(f, "Probe geometry is already attached to this recording")
            }
            EphysError::OutOfRange {
                what,
                requested,
                limit,
            } => write!(f, "{what} {requested} out of range (limit {limit})"),
            EphysError::UnknownUnit { unit_id } => write!(f, "Unknown unit id: {unit_id}"),
            EphysError::Curation { message } => write!(f, "Curation error: {message}"),
            EphysError::Io { path, message } => write!(f, "I/O error on '{path}': {message}"),
        }
    }
}

impl std::error::Error for EphysError {}

impl From<std::io::Error> for EphysError {
    fn from(err: std::io::Error) -> Self {
        EphysError::Io {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

/// Result type for ephysio operations.
pub type Result<T> = std::result::Result<T, EphysError>;
