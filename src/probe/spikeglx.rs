// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Probe geometry from SpikeGLX `.meta` files.
//!
//! Two tables may describe contact positions:
//! - `~snsGeomMap=(part,shanks,spacing,width)(shank:x:z:used)...` with x and
//!   z in µm (SpikeGLX 20230202 and later)
//! - `~snsShankMap=(shanks,cols,rows)(shank:col:row:used)...` with grid
//!   indices, converted with NP1.0 pitches
//!
//! Sync channels have no entry in either table.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::io::formats::spikeglx::{GlxFileName, GlxStreamKind, SpikeGlxMeta};
use crate::{EphysError, Result};

use super::{Contact, ProbeGeometry, ProbeResolver};

/// Horizontal pitch between columns of `~snsShankMap`, µm.
pub const COLUMN_PITCH_UM: f64 = 32.0;
/// Vertical pitch between rows of `~snsShankMap`, µm.
pub const ROW_PITCH_UM: f64 = 20.0;

fn table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]*)\)").expect("valid regex"))
}

/// Split a `~` table into its header and entries.
pub fn parse_table(value: &str) -> Option<(String, Vec<String>)> {
    let mut groups = table_regex()
        .captures_iter(value)
        .map(|c| c[1].to_string());
    let header = groups.next()?;
    Some((header, groups.collect()))
}

fn entry_fields(entry: &str) -> Option<Vec<f64>> {
    entry.split(':').map(|f| f.trim().parse().ok()).collect()
}

/// Build geometry from parsed metadata.
pub fn geometry_from_meta(meta: &SpikeGlxMeta) -> Result<ProbeGeometry> {
    let path = meta.path().display().to_string();

    let (contacts, header_model) = if let Some(raw) = meta.get("~snsGeomMap") {
        let (header, entries) = parse_table(raw)
            .ok_or_else(|| EphysError::geometry(format!("{path}: empty ~snsGeomMap")))?;
        let contacts = entries
            .iter()
            .map(|e| match entry_fields(e).as_deref() {
                Some([shank, x, z, ..]) => Ok(Contact::new(*x, *z).with_shank(*shank as u32)),
                _ => Err(EphysError::geometry(format!("{path}: bad ~snsGeomMap entry '{e}'"))),
            })
            .collect::<Result<Vec<_>>>()?;
        let model = header.split(',').next().map(str::to_string);
        (contacts, model)
    } else if let Some(raw) = meta.get("~snsShankMap") {
        let (_, entries) = parse_table(raw)
            .ok_or_else(|| EphysError::geometry(format!("{path}: empty ~snsShankMap")))?;
        let contacts = entries
            .iter()
            .map(|e| match entry_fields(e).as_deref() {
                Some([shank, col, row, ..]) => Ok(Contact::new(
                    col * COLUMN_PITCH_UM,
                    row * ROW_PITCH_UM,
                )
                .with_shank(*shank as u32)),
                _ => Err(EphysError::geometry(format!("{path}: bad ~snsShankMap entry '{e}'"))),
            })
            .collect::<Result<Vec<_>>>()?;
        (contacts, None)
    } else {
        return Err(EphysError::geometry(format!(
            "{path}: no ~snsGeomMap or ~snsShankMap"
        )));
    };

    let model = meta
        .get("imDatPrb_pn")
        .or_else(|| meta.get("imDatPrb_type"))
        .map(str::to_string)
        .or(header_model.filter(|m| !m.is_empty()));

    let mut geometry = ProbeGeometry::new(contacts);
    geometry.model = model;
    Ok(geometry)
}

/// Resolver over SpikeGLX `.meta` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpikeGlxProbeResolver;

impl SpikeGlxProbeResolver {
    /// Create the resolver.
    pub fn new() -> Self {
        Self
    }
}

fn first_probe_meta(dir: &Path) -> Option<PathBuf> {
    let mut folders = vec![dir.to_path_buf()];
    if let Ok(entries) = std::fs::read_dir(dir) {
        folders.extend(entries.flatten().map(|e| e.path()).filter(|p| p.is_dir()));
    }

    let mut candidates: Vec<PathBuf> = folders
        .iter()
        .filter_map(|f| std::fs::read_dir(f).ok())
        .flat_map(|entries| entries.flatten().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| GlxFileName::parse(&n.to_string_lossy()))
                .is_some_and(|n| matches!(n.kind(), GlxStreamKind::ImecAp | GlxStreamKind::ImecLf))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

impl ProbeResolver for SpikeGlxProbeResolver {
    fn resolve(&self, path: &Path) -> Option<ProbeGeometry> {
        let meta_path = if path.is_dir() {
            first_probe_meta(path)?
        } else {
            path.to_path_buf()
        };
        match self.resolve_from_metadata_file(&meta_path) {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                debug!(meta = %meta_path.display(), error = %e, "no SpikeGLX geometry");
                None
            }
        }
    }

    fn resolve_from_metadata_file(&self, path: &Path) -> Result<ProbeGeometry> {
        let meta = SpikeGlxMeta::read(path)
            .map_err(|e| EphysError::geometry(e.to_string()))?;
        geometry_from_meta(&meta)
    }
}
