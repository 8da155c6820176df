// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.
//!
//! Fixture folders are synthesized under the system temp directory and
//! removed when the [`TempDir`] guard drops.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ephysio::io::formats::openephys::legacy::encode_continuous;
use ephysio::io::npy::{encode_npy_f64, encode_npy_i64};

// ============================================================================
// Temporary folders
// ============================================================================

/// A fresh folder removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    /// Create `ephysio_<name>_<pid>` under the temp directory.
    pub fn new(name: &str) -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("ephysio_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.path.join(rel)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ============================================================================
// Open Ephys legacy
// ============================================================================

/// Write `<name>.continuous` files with `samples` each.
pub fn write_legacy(dir: &Path, names: &[&str], samples: &[i16]) {
    for name in names {
        fs::write(
            dir.join(format!("{name}.continuous")),
            encode_continuous(30000.0, 0.195, samples),
        )
        .unwrap();
    }
}

// ============================================================================
// SpikeGLX
// ============================================================================

/// `.meta` text for an imec AP stream with `n_ap` channels plus one sync
/// channel and a single-shank `~snsShankMap` of `map_entries` entries.
pub fn imec_ap_meta(n_ap: usize, map_entries: usize) -> String {
    let mut meta = format!(
        "imSampRate=30000\nnSavedChans={}\nsnsApLfSy={n_ap},0,1\nimDatPrb_type=0\nfileCreateTime=2020-06-03T13:47:57\n",
        n_ap + 1
    );
    meta.push_str("~snsShankMap=(1,2,480)");
    for i in 0..map_entries {
        meta.push_str(&format!("(0:{}:{}:1)", i % 2, i / 2));
    }
    meta.push('\n');
    meta
}

/// `.meta` text for an imec LF stream.
pub fn imec_lf_meta(n_lf: usize) -> String {
    let mut meta = format!(
        "imSampRate=2500\nnSavedChans={}\nsnsApLfSy=0,{n_lf},1\n~snsShankMap=(1,2,480)",
        n_lf + 1
    );
    for i in 0..n_lf {
        meta.push_str(&format!("(0:{}:{}:1)", i % 2, i / 2));
    }
    meta.push('\n');
    meta
}

/// `.meta` text for a NI-DAQ stream.
pub fn nidq_meta(channels: usize) -> String {
    format!("niSampRate=25000\nnSavedChans={channels}\nsnsMnMaXaDw=0,0,{channels},0\n")
}

/// Write a `.meta`/`.bin` pair; sample `(f, c)` holds `f * 10 + c`.
pub fn write_glx_stream(dir: &Path, stem: &str, meta: &str, frames: usize, channels: usize) {
    fs::write(dir.join(format!("{stem}.meta")), meta).unwrap();
    let mut bin = Vec::with_capacity(frames * channels * 2);
    for f in 0..frames {
        for c in 0..channels {
            bin.extend_from_slice(&((f * 10 + c) as i16).to_le_bytes());
        }
    }
    fs::write(dir.join(format!("{stem}.bin")), bin).unwrap();
}

/// A SpikeGLX folder with `imec0.ap`, `imec0.lf` and `nidq` streams.
pub fn write_spikeglx_run(dir: &Path) {
    write_glx_stream(dir, "run_g0_t0.imec0.ap", &imec_ap_meta(4, 4), 10, 5);
    write_glx_stream(dir, "run_g0_t0.imec0.lf", &imec_lf_meta(4), 2, 5);
    write_glx_stream(dir, "run_g0_t0.nidq", &nidq_meta(2), 8, 2);
}

// ============================================================================
// Open Ephys binary
// ============================================================================

/// Layout of a synthetic binary recording.
pub const RECORDING_REL: &str = "Record Node 101/experiment1/recording1";

const OEBIN: &str = r#"{
    "GUI version": "0.6.4",
    "continuous": [
        {
            "folder_name": "Neuropix-PXI-100.ProbeA/",
            "sample_rate": 30000.0,
            "source_processor_name": "Neuropix-PXI",
            "num_channels": 3,
            "channels": [
                {"channel_name": "CH1", "bit_volts": 0.195},
                {"channel_name": "CH2", "bit_volts": 0.195},
                {"channel_name": "CH3", "bit_volts": 0.195}
            ]
        },
        {
            "folder_name": "NI-DAQmx-102.PXIe-6341/",
            "sample_rate": 30000.0,
            "num_channels": 2,
            "channels": [
                {"channel_name": "ADC1", "bit_volts": 0.00015},
                {"channel_name": "ADC2", "bit_volts": 0.00015}
            ]
        }
    ],
    "events": [
        {"folder_name": "Neuropix-PXI-100.ProbeA/TTL/", "channel_name": "TTL", "sample_rate": 30000.0},
        {"folder_name": "NI-DAQmx-102.PXIe-6341/TTL/", "channel_name": "TTL", "sample_rate": 30000.0}
    ],
    "spikes": []
}"#;

/// `settings.xml` with a three-contact Neuropixels probe.
pub const SETTINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SETTINGS>
  <SIGNALCHAIN>
    <PROCESSOR name="Sources/Neuropix-PXI" nodeId="100">
      <EDITOR>
        <NP_PROBE slot="2" port="1" probe_part_number="PRB_1_4_0480_1">
          <ELECTRODE_XPOS CH0="27" CH1="59" CH2="11"/>
          <ELECTRODE_YPOS CH0="0" CH1="0" CH2="20"/>
        </NP_PROBE>
      </EDITOR>
    </PROCESSOR>
  </SIGNALCHAIN>
</SETTINGS>
"#;

/// Write a binary recording with two continuous streams and their events.
///
/// Returns the recording folder (the one holding `structure.oebin`).
pub fn write_binary(root: &Path, with_settings: bool) -> PathBuf {
    let rec = root.join(RECORDING_REL);
    fs::create_dir_all(&rec).unwrap();
    fs::write(rec.join("structure.oebin"), OEBIN).unwrap();

    for (folder, channels) in [("Neuropix-PXI-100.ProbeA", 3usize), ("NI-DAQmx-102.PXIe-6341", 2)] {
        let cont = rec.join("continuous").join(folder);
        fs::create_dir_all(&cont).unwrap();
        let mut data = Vec::new();
        for f in 0..6 {
            for c in 0..channels {
                data.extend_from_slice(&((f * 10 + c) as i16).to_le_bytes());
            }
        }
        fs::write(cont.join("continuous.dat"), data).unwrap();

        let ttl = rec.join("events").join(folder).join("TTL");
        fs::create_dir_all(&ttl).unwrap();
        fs::write(ttl.join("sample_numbers.npy"), encode_npy_i64(&[30, 60, 90])).unwrap();
        fs::write(ttl.join("timestamps.npy"), encode_npy_f64(&[0.001, 0.002, 0.003])).unwrap();
        fs::write(ttl.join("states.npy"), encode_npy_i64(&[1, -1, 1])).unwrap();
    }

    if with_settings {
        fs::write(root.join("Record Node 101").join("settings.xml"), SETTINGS_XML).unwrap();
    }
    rec
}

/// `settings.xml` with two three-contact probes, `PRB_A` then `PRB_B`.
pub const TWO_PROBE_SETTINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SETTINGS>
  <SIGNALCHAIN>
    <PROCESSOR name="Sources/Neuropix-PXI" nodeId="100">
      <EDITOR>
        <NP_PROBE slot="2" port="1" probe_part_number="PRB_A">
          <ELECTRODE_XPOS CH0="1" CH1="2" CH2="3"/>
          <ELECTRODE_YPOS CH0="0" CH1="0" CH2="20"/>
        </NP_PROBE>
        <NP_PROBE slot="2" port="2" probe_part_number="PRB_B">
          <ELECTRODE_XPOS CH0="900" CH1="901" CH2="902"/>
          <ELECTRODE_YPOS CH0="0" CH1="0" CH2="20"/>
        </NP_PROBE>
      </EDITOR>
    </PROCESSOR>
  </SIGNALCHAIN>
</SETTINGS>
"#;

/// Write a binary recording with one three-channel stream per name and
/// `settings` beside the record node.
///
/// Returns the recording folder.
pub fn write_binary_streams(root: &Path, streams: &[&str], settings: &str) -> PathBuf {
    let rec = root.join(RECORDING_REL);
    fs::create_dir_all(&rec).unwrap();

    let continuous: Vec<String> = streams
        .iter()
        .map(|name| {
            format!(
                r#"{{"folder_name": "{name}/", "sample_rate": 30000.0, "num_channels": 3,
                "channels": [{{"channel_name": "CH1"}}, {{"channel_name": "CH2"}}, {{"channel_name": "CH3"}}]}}"#
            )
        })
        .collect();
    let oebin = format!(
        r#"{{"GUI version": "0.6.4", "continuous": [{}], "events": [], "spikes": []}}"#,
        continuous.join(",")
    );
    fs::write(rec.join("structure.oebin"), oebin).unwrap();

    for name in streams {
        let cont = rec.join("continuous").join(name);
        fs::create_dir_all(&cont).unwrap();
        let data: Vec<u8> = (0..6 * 3).flat_map(|v: i16| v.to_le_bytes()).collect();
        fs::write(cont.join("continuous.dat"), data).unwrap();
    }

    fs::write(root.join("Record Node 101").join("settings.xml"), settings).unwrap();
    rec
}
