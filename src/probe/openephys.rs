// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Probe geometry from Open Ephys `settings.xml`.
//!
//! The Neuropixels plugin writes one `NP_PROBE` element per probe:
//!
//! ```xml
//! <NP_PROBE probe_part_number="PRB_1_4_0480_1" ...>
//!   <ELECTRODE_XPOS CH0="27" CH1="59" .../>
//!   <ELECTRODE_YPOS CH0="0" CH1="0" .../>
//!   <ELECTRODE_SHANK CH0="0" CH1="0" .../>
//! </NP_PROBE>
//! ```
//!
//! Each probe is named by its `custom_probe_name` attribute, or by its
//! position (`ProbeA`, `ProbeB`, ...) as the GUI names the probe streams.
//! With several probes the stream name picks one; without a match no
//! geometry is returned. Other acquisition boards write no positions and
//! resolve to no geometry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::{EphysError, Result};

use super::{Contact, ProbeGeometry, ProbeResolver};

/// Settings file written by the acquisition GUI.
pub const SETTINGS_FILE: &str = "settings.xml";

/// Maximum depth below the recording folder searched for settings.
pub const SETTINGS_SEARCH_DEPTH: usize = 3;

struct XmlPatterns {
    probe: Regex,
    channel_attr: Regex,
    part_number: Regex,
    probe_name: Regex,
}

fn patterns() -> &'static XmlPatterns {
    static RE: OnceLock<XmlPatterns> = OnceLock::new();
    RE.get_or_init(|| XmlPatterns {
        probe: Regex::new(r"(?s)<NP_PROBE\b(?P<attrs>[^>]*)>(?P<body>.*?)</NP_PROBE>")
            .expect("valid regex"),
        channel_attr: Regex::new(r#"CH(?P<ch>\d+)\s*=\s*"(?P<value>[^"]*)""#).expect("valid regex"),
        part_number: Regex::new(r#"probe_part_number\s*=\s*"(?P<pn>[^"]*)""#).expect("valid regex"),
        probe_name: Regex::new(r#"custom_probe_name\s*=\s*"(?P<name>[^"]*)""#).expect("valid regex"),
    })
}

fn element_values(body: &str, element: &str) -> Option<BTreeMap<u32, String>> {
    let start = body.find(&format!("<{element}"))?;
    let rest = &body[start..];
    let end = rest.find('>')?;
    let values = patterns()
        .channel_attr
        .captures_iter(&rest[..end])
        .filter_map(|c| Some((c["ch"].parse().ok()?, c["value"].to_string())))
        .collect();
    Some(values)
}

fn parse_positions(
    values: &BTreeMap<u32, String>,
    element: &str,
) -> Result<BTreeMap<u32, f64>> {
    values
        .iter()
        .map(|(ch, v)| {
            v.trim()
                .parse::<f64>()
                .map(|x| (*ch, x))
                .map_err(|_| EphysError::geometry(format!("{element} CH{ch} is not a number: '{v}'")))
        })
        .collect()
}

/// One `NP_PROBE` element and the name its streams carry.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedProbe {
    /// `custom_probe_name`, or `Probe<letter>` by element order
    pub name: String,
    /// Contact positions
    pub geometry: ProbeGeometry,
}

fn default_probe_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => format!("Probe{}", char::from(b'A' + i)),
        _ => format!("Probe{index}"),
    }
}

/// Read every probe of a `settings.xml` text, in element order.
pub fn probes_from_settings(xml: &str) -> Result<Vec<NamedProbe>> {
    let probes = patterns()
        .probe
        .captures_iter(xml)
        .enumerate()
        .map(|(index, caps)| {
            let name = patterns()
                .probe_name
                .captures(&caps["attrs"])
                .map(|c| c["name"].trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| default_probe_name(index));
            let geometry = probe_geometry(&caps["attrs"], &caps["body"])?;
            Ok(NamedProbe { name, geometry })
        })
        .collect::<Result<Vec<_>>>()?;

    if probes.is_empty() {
        return Err(EphysError::geometry("no NP_PROBE element in settings"));
    }
    Ok(probes)
}

/// Build geometry from `settings.xml` text holding a single probe.
pub fn geometry_from_settings(xml: &str) -> Result<ProbeGeometry> {
    geometry_for_stream(xml, None)
}

/// Build the geometry of the probe recorded by `stream`.
///
/// A single probe is returned as-is. With several probes the last
/// `.`-separated part of the stream name must equal a probe name.
pub fn geometry_for_stream(xml: &str, stream: Option<&str>) -> Result<ProbeGeometry> {
    let mut probes = probes_from_settings(xml)?;
    if probes.len() == 1 {
        return Ok(probes.remove(0).geometry);
    }

    let names: Vec<String> = probes.iter().map(|p| p.name.clone()).collect();
    let Some(stream) = stream else {
        return Err(EphysError::geometry(format!(
            "settings describe {} probes ({}), a stream name is needed to pick one",
            probes.len(),
            names.join(", ")
        )));
    };
    let suffix = stream.rsplit('.').next().unwrap_or(stream);
    probes
        .into_iter()
        .find(|p| p.name == suffix)
        .map(|p| p.geometry)
        .ok_or_else(|| {
            EphysError::geometry(format!(
                "no probe in settings matches stream '{stream}' (probes: {})",
                names.join(", ")
            ))
        })
}

fn probe_geometry(attrs: &str, body: &str) -> Result<ProbeGeometry> {
    let xs = element_values(body, "ELECTRODE_XPOS")
        .ok_or_else(|| EphysError::geometry("NP_PROBE has no ELECTRODE_XPOS"))?;
    let ys = element_values(body, "ELECTRODE_YPOS")
        .ok_or_else(|| EphysError::geometry("NP_PROBE has no ELECTRODE_YPOS"))?;
    let xs = parse_positions(&xs, "ELECTRODE_XPOS")?;
    let ys = parse_positions(&ys, "ELECTRODE_YPOS")?;
    let shanks = match element_values(body, "ELECTRODE_SHANK") {
        Some(values) => Some(parse_positions(&values, "ELECTRODE_SHANK")?),
        None => None,
    };

    if xs.len() != ys.len() || xs.keys().ne(ys.keys()) {
        return Err(EphysError::geometry(
            "ELECTRODE_XPOS and ELECTRODE_YPOS list different channels",
        ));
    }

    let contacts = xs
        .iter()
        .map(|(ch, x)| {
            let contact = Contact::new(*x, ys[ch]);
            match shanks.as_ref().and_then(|s| s.get(ch)) {
                Some(shank) => contact.with_shank(*shank as u32),
                None => contact,
            }
        })
        .collect();

    let mut geometry = ProbeGeometry::new(contacts);
    geometry.model = patterns()
        .part_number
        .captures(attrs)
        .map(|c| c["pn"].to_string());
    Ok(geometry)
}

/// Find the first `settings.xml` at or below `dir`.
pub fn find_settings(dir: &Path) -> Option<PathBuf> {
    fn walk(dir: &Path, depth: usize) -> Option<PathBuf> {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if depth >= SETTINGS_SEARCH_DEPTH {
            return None;
        }
        let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();
        subdirs.iter().find_map(|sub| walk(sub, depth + 1))
    }
    walk(dir, 0)
}

/// Resolver over Open Ephys settings files.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenEphysProbeResolver;

impl OpenEphysProbeResolver {
    /// Create the resolver.
    pub fn new() -> Self {
        Self
    }
}

impl OpenEphysProbeResolver {
    fn load(&self, path: &Path, stream: Option<&str>) -> Option<ProbeGeometry> {
        let settings = if path.is_dir() {
            find_settings(path)?
        } else {
            path.to_path_buf()
        };
        let geometry = std::fs::read_to_string(&settings)
            .map_err(|e| EphysError::geometry(format!("{}: {e}", settings.display())))
            .and_then(|xml| geometry_for_stream(&xml, stream));
        match geometry {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                debug!(settings = %settings.display(), error = %e, "no Open Ephys geometry");
                None
            }
        }
    }
}

impl ProbeResolver for OpenEphysProbeResolver {
    fn resolve(&self, path: &Path) -> Option<ProbeGeometry> {
        self.load(path, None)
    }

    fn resolve_from_metadata_file(&self, path: &Path) -> Result<ProbeGeometry> {
        let xml = std::fs::read_to_string(path)
            .map_err(|e| EphysError::geometry(format!("{}: {e}", path.display())))?;
        geometry_from_settings(&xml)
    }

    fn resolve_for_stream(&self, path: &Path, stream: &str) -> Option<ProbeGeometry> {
        self.load(path, Some(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SETTINGS>
  <SIGNALCHAIN>
    <PROCESSOR name="Sources/Neuropix-PXI" nodeId="100">
      <EDITOR>
        <NP_PROBE slot="2" port="1" probe_serial_number="18194814141" probe_part_number="PRB_1_4_0480_1">
          <CHANNELS CH0="0:0" CH1="0:0" CH2="0:0"/>
          <ELECTRODE_XPOS CH0="27" CH1="59" CH2="11"/>
          <ELECTRODE_YPOS CH0="0" CH1="0" CH2="20"/>
        </NP_PROBE>
      </EDITOR>
    </PROCESSOR>
  </SIGNALCHAIN>
</SETTINGS>
"#;

    #[test]
    fn test_geometry_from_settings() {
        let geometry = geometry_from_settings(SETTINGS).unwrap();
        assert_eq!(geometry.len(), 3);
        assert_eq!(geometry.model.as_deref(), Some("PRB_1_4_0480_1"));
        assert_eq!(geometry.contacts[2], Contact::new(11.0, 20.0));
        assert!(geometry.shank_ids().is_none());
    }

    #[test]
    fn test_channels_sorted_numerically() {
        let xml = r#"<NP_PROBE><ELECTRODE_XPOS CH10="1" CH2="2"/><ELECTRODE_YPOS CH2="20" CH10="10"/><ELECTRODE_SHANK CH2="0" CH10="1"/></NP_PROBE>"#;
        let geometry = geometry_from_settings(xml).unwrap();
        assert_eq!(geometry.contacts[0], Contact::new(2.0, 20.0).with_shank(0));
        assert_eq!(geometry.contacts[1], Contact::new(1.0, 10.0).with_shank(1));
    }

    #[test]
    fn test_no_probe() {
        assert!(geometry_from_settings("<SETTINGS><PROCESSOR/></SETTINGS>").is_err());
        let xml = r#"<NP_PROBE><ELECTRODE_XPOS CH0="1"/><ELECTRODE_YPOS CH1="1"/></NP_PROBE>"#;
        assert!(geometry_from_settings(xml).is_err());
    }

    const TWO_PROBES: &str = r#"<SETTINGS>
<NP_PROBE probe_part_number="PRB_A"><ELECTRODE_XPOS CH0="1" CH1="2"/><ELECTRODE_YPOS CH0="0" CH1="0"/></NP_PROBE>
<NP_PROBE probe_part_number="PRB_B"><ELECTRODE_XPOS CH0="900" CH1="901"/><ELECTRODE_YPOS CH0="0" CH1="0"/></NP_PROBE>
</SETTINGS>"#;

    #[test]
    fn test_probes_named_by_order() {
        let probes = probes_from_settings(TWO_PROBES).unwrap();
        let names: Vec<&str> = probes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ProbeA", "ProbeB"]);

        let xml = TWO_PROBES.replacen(
            r#"probe_part_number="PRB_B""#,
            r#"probe_part_number="PRB_B" custom_probe_name="Deep""#,
            1,
        );
        let probes = probes_from_settings(&xml).unwrap();
        assert_eq!(probes[1].name, "Deep");
        assert_eq!(default_probe_name(30), "Probe30");
    }

    #[test]
    fn test_stream_picks_its_probe() {
        let geometry = geometry_for_stream(TWO_PROBES, Some("Neuropix-PXI-100.ProbeB")).unwrap();
        assert_eq!(geometry.model.as_deref(), Some("PRB_B"));
        assert_eq!(geometry.contacts[0].x, 900.0);

        let geometry = geometry_for_stream(TWO_PROBES, Some("Neuropix-PXI-100.ProbeA")).unwrap();
        assert_eq!(geometry.model.as_deref(), Some("PRB_A"));

        assert!(geometry_for_stream(TWO_PROBES, Some("Neuropix-PXI-100.ProbeC")).is_err());
        assert!(geometry_for_stream(TWO_PROBES, None).is_err());
        assert!(geometry_from_settings(TWO_PROBES).is_err());

        // a lone probe serves any stream
        let geometry = geometry_for_stream(SETTINGS, Some("Neuropix-PXI-100.ProbeB")).unwrap();
        assert_eq!(geometry.len(), 3);
    }

    #[test]
    fn test_resolve_searches_below() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("ephysio_test_oe_probe_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let node = dir.join("Record Node 101");
        std::fs::create_dir_all(&node).unwrap();

        let resolver = OpenEphysProbeResolver::new();
        assert!(resolver.resolve(&dir).is_none());

        std::fs::write(node.join(SETTINGS_FILE), SETTINGS).unwrap();
        assert_eq!(find_settings(&dir), Some(node.join(SETTINGS_FILE)));
        assert_eq!(resolver.resolve(&dir).map(|g| g.len()), Some(3));

        std::fs::write(node.join(SETTINGS_FILE), TWO_PROBES).unwrap();
        assert!(resolver.resolve(&dir).is_none());
        let geometry = resolver.resolve_for_stream(&dir, "Neuropix-PXI-100.ProbeB");
        assert_eq!(geometry.and_then(|g| g.model), Some("PRB_B".to_string()));
        assert!(resolver.resolve_for_stream(&dir, "Neuropix-PXI-100.ProbeC").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
