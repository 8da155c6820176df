// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! SpikeGLX format support.
//!
//! A SpikeGLX run writes one `.meta` / `.bin` pair per stream and
//! gate/trigger: `<run>_g<gate>_t<trigger>.<stream>.{meta,bin}`, where the
//! stream is `imec<N>.ap`, `imec<N>.lf` or `nidq`. Recent versions put
//! each probe in its own `<run>_g<gate>_imec<N>` folder, so the backend
//! scans the folder and its immediate subfolders.
//!
//! The `.bin` file holds interleaved little-endian i16 frames of
//! `nSavedChans` channels. Imec streams end with a sync channel that is
//! hidden unless `load_sync_channel` is set.

pub mod meta;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::FormatTag;
use crate::io::arena::MmapArena;
use crate::io::metadata::{Annotations, StreamDescriptor, StreamKind, Traces};
use crate::io::options::OpenOptions;
use crate::io::traits::{FormatBackend, SignalSource};
use crate::{EphysError, Result};

pub use meta::{stream_kind, GlxFileName, GlxStreamKind, SpikeGlxMeta};

const FORMAT_NAME: &str = "SpikeGLX";

/// Keys copied into the minimal annotation set.
const MINIMAL_KEYS: &[&str] = &["imDatPrb_type", "imDatPrb_sn", "imDatPrb_pn", "appVersion"];

/// One `.meta` / `.bin` pair found on disk.
#[derive(Debug, Clone)]
struct GlxFile {
    name: GlxFileName,
    meta: PathBuf,
    bin: PathBuf,
}

fn scan_files(dir: &Path) -> Result<Vec<GlxFile>> {
    let mut folders = vec![dir.to_path_buf()];
    let read_dir = std::fs::read_dir(dir)
        .map_err(|e| EphysError::backend(FORMAT_NAME, dir.display().to_string(), e.to_string()))?;
    for entry in read_dir.flatten() {
        if entry.path().is_dir() {
            folders.push(entry.path());
        }
    }

    let mut files = Vec::new();
    for folder in folders {
        let Ok(entries) = std::fs::read_dir(&folder) else {
            continue;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(name) = GlxFileName::parse(&file_name) else {
                continue;
            };
            let meta = entry.path();
            let bin = meta.with_extension("bin");
            if !bin.exists() {
                debug!(meta = %meta.display(), "skipping .meta without .bin");
                continue;
            }
            files.push(GlxFile { name, meta, bin });
        }
    }

    files.sort_by(|a, b| {
        (&a.name.stream, a.name.gate, a.name.trigger).cmp(&(&b.name.stream, b.name.gate, b.name.trigger))
    });
    Ok(files)
}

/// SpikeGLX backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpikeGlxBackend;

impl SpikeGlxBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl FormatBackend for SpikeGlxBackend {
    fn tag(&self) -> FormatTag {
        FormatTag::SpikeGlx
    }

    fn list_streams(&self, dir: &Path, options: &OpenOptions) -> Result<Vec<StreamDescriptor>> {
        let files = scan_files(dir)?;

        // group segments (gates/triggers) of the same stream, keep first-seen order
        let mut order: Vec<String> = Vec::new();
        let mut grouped: BTreeMap<String, Vec<GlxFile>> = BTreeMap::new();
        for file in files {
            if !grouped.contains_key(&file.name.stream) {
                order.push(file.name.stream.clone());
            }
            grouped.entry(file.name.stream.clone()).or_default().push(file);
        }

        let mut streams = Vec::with_capacity(order.len());
        for name in order {
            let segments = &grouped[&name];
            let first = &segments[0];
            let meta = SpikeGlxMeta::read(&first.meta)?;
            let kind = first.name.kind();

            let mut channels = meta.saved_channels()?;
            let sync = meta.sync_channels().min(channels);
            let exposed_sync = if options.load_sync_channel {
                sync
            } else {
                channels -= sync;
                0
            };

            let stream_kind = match kind {
                GlxStreamKind::ImecAp | GlxStreamKind::ImecLf => StreamKind::Probe,
                GlxStreamKind::Nidq | GlxStreamKind::Other => StreamKind::Auxiliary,
            };

            let mut desc = StreamDescriptor::new(&name)
                .with_kind(stream_kind)
                .with_sample_rate(meta.sample_rate()?)
                .with_channel_count(channels)
                .with_sync_channels(exposed_sync)
                .with_metadata_file(&first.meta);
            for seg in segments {
                desc = desc.with_file(&seg.bin);
            }
            streams.push(desc);
        }

        debug!(directory = %dir.display(), streams = streams.len(), "listed SpikeGLX streams");
        Ok(streams)
    }

    fn bind(
        &self,
        _dir: &Path,
        stream: &StreamDescriptor,
        options: &OpenOptions,
    ) -> Result<Box<dyn SignalSource>> {
        Ok(Box::new(SpikeGlxSource::open(stream, options)?))
    }
}

/// Sample source over one SpikeGLX stream (first segment).
#[derive(Debug)]
pub struct SpikeGlxSource {
    stream: StreamDescriptor,
    meta: SpikeGlxMeta,
    arena: MmapArena,
    saved_channels: usize,
    channel_ids: Vec<String>,
    gains: Vec<f64>,
    sample_rate: f64,
    annotations: Annotations,
}

impl SpikeGlxSource {
    /// Open the source for a listed stream.
    pub fn open(stream: &StreamDescriptor, options: &OpenOptions) -> Result<Self> {
        let meta_path = stream.metadata_file.as_ref().ok_or_else(|| {
            EphysError::backend(FORMAT_NAME, stream.name.clone(), "stream has no .meta file")
        })?;
        let bin_path = stream.files.first().ok_or_else(|| {
            EphysError::backend(FORMAT_NAME, stream.name.clone(), "stream has no .bin file")
        })?;

        let meta = SpikeGlxMeta::read(meta_path)?;
        let kind = stream_kind(&stream.name);
        let saved_channels = meta.saved_channels()?;
        let mut channel_ids = meta.channel_names(kind)?;
        let mut gains = meta.gains(kind)?;
        if !options.load_sync_channel {
            let keep = saved_channels - meta.sync_channels().min(saved_channels);
            channel_ids.truncate(keep);
            gains.truncate(keep);
        }

        let arena = MmapArena::open(bin_path).map_err(|e| {
            EphysError::backend(FORMAT_NAME, bin_path.display().to_string(), e.to_string())
        })?;

        let mut annotations = Annotations::new();
        annotations.insert("stream_name".into(), stream.name.clone());
        annotations.insert("segment_count".into(), stream.files.len().to_string());
        if let Some(start) = meta.start_time() {
            annotations.insert("start_time".into(), start);
        }
        for key in MINIMAL_KEYS {
            if let Some(v) = meta.get(key) {
                annotations.insert((*key).to_string(), v.to_string());
            }
        }
        if options.all_annotations {
            for (k, v) in meta.values() {
                annotations.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        Ok(Self {
            stream: stream.clone(),
            sample_rate: meta.sample_rate()?,
            meta,
            arena,
            saved_channels,
            channel_ids,
            gains,
            annotations,
        })
    }

    /// Parsed metadata of the bound stream.
    pub fn meta(&self) -> &SpikeGlxMeta {
        &self.meta
    }
}

impl SignalSource for SpikeGlxSource {
    fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    fn channel_ids(&self) -> &[String] {
        &self.channel_ids
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn num_samples(&self) -> u64 {
        self.arena.interleaved_frames(0, self.saved_channels)
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    fn read_traces(&self, start: u64, end: u64, channels: Option<&[usize]>) -> Result<Traces> {
        // exposed channels are a prefix of the saved ones
        let all: Vec<usize>;
        let selected = match channels {
            Some(list) => {
                if let Some(&bad) = list.iter().find(|&&c| c >= self.channel_ids.len()) {
                    return Err(EphysError::out_of_range(
                        "channel index",
                        bad as u64,
                        self.channel_ids.len() as u64,
                    ));
                }
                list
            }
            None => {
                all = (0..self.channel_ids.len()).collect();
                &all
            }
        };
        self.arena
            .read_interleaved_i16(0, self.saved_channels, start, end, Some(selected))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
