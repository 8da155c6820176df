// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! SpikeGLX `.meta` file parsing.
//!
//! A `.meta` file is plain text, one `key=value` pair per line. Keys that
//! start with `~` hold tables written as `(header)(entry)(entry)...`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::{EphysError, Result};

const FORMAT_NAME: &str = "SpikeGLX";

/// Default NP1.0 action-potential gain.
const DEFAULT_AP_GAIN: f64 = 500.0;
/// Default NP1.0 LFP gain.
const DEFAULT_LF_GAIN: f64 = 250.0;

/// Kind of SpikeGLX stream, from the file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlxStreamKind {
    /// Imec probe action-potential band
    ImecAp,
    /// Imec probe LFP band
    ImecLf,
    /// NI-DAQ auxiliary board
    Nidq,
    /// OneBox or other auxiliary device
    Other,
}

/// Parts of a SpikeGLX file name: `<run>_g<gate>_t<trigger>.<stream>.meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlxFileName {
    /// Run name chosen by the operator
    pub run: String,
    /// Gate index
    pub gate: u32,
    /// Trigger index (`cat` concatenated files use `u32::MAX`)
    pub trigger: u32,
    /// Stream name, e.g. "imec0.ap" or "nidq"
    pub stream: String,
}

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<run>.+)_g(?P<gate>\d+)_t(?P<trig>\d+|cat)\.(?P<stream>.+)\.meta$")
            .expect("valid regex")
    })
}

impl GlxFileName {
    /// Parse a `.meta` file name.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = file_name_regex().captures(name)?;
        let trigger = match &caps["trig"] {
            "cat" => u32::MAX,
            t => t.parse().ok()?,
        };
        Some(Self {
            run: caps["run"].to_string(),
            gate: caps["gate"].parse().ok()?,
            trigger,
            stream: caps["stream"].to_string(),
        })
    }

    /// Stream kind from the stream name.
    pub fn kind(&self) -> GlxStreamKind {
        stream_kind(&self.stream)
    }
}

/// Stream kind from a stream name.
pub fn stream_kind(stream: &str) -> GlxStreamKind {
    if stream == "nidq" {
        GlxStreamKind::Nidq
    } else if stream.starts_with("imec") && stream.ends_with(".ap") {
        GlxStreamKind::ImecAp
    } else if stream.starts_with("imec") && stream.ends_with(".lf") {
        GlxStreamKind::ImecLf
    } else {
        GlxStreamKind::Other
    }
}

/// Parsed `.meta` file.
#[derive(Debug, Clone)]
pub struct SpikeGlxMeta {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SpikeGlxMeta {
    /// Read and parse a `.meta` file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EphysError::backend(FORMAT_NAME, path.display().to_string(), e.to_string())
        })?;
        Ok(Self::parse(path, &text))
    }

    /// Parse `.meta` text.
    pub fn parse<P: AsRef<Path>>(path: P, text: &str) -> Self {
        let values = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self {
            path: path.as_ref().to_path_buf(),
            values,
        }
    }

    /// Path of the `.meta` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// All key/value pairs.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    fn error(&self, message: impl Into<String>) -> EphysError {
        EphysError::backend(FORMAT_NAME, self.path.display().to_string(), message)
    }

    fn required_f64(&self, key: &str) -> Result<f64> {
        let raw = self
            .get(key)
            .ok_or_else(|| self.error(format!("missing {key}")))?;
        raw.parse()
            .map_err(|_| self.error(format!("{key} is not a number: '{raw}'")))
    }

    fn counts(&self, key: &str) -> Vec<usize> {
        self.get(key)
            .map(|v| v.split(',').filter_map(|n| n.trim().parse().ok()).collect())
            .unwrap_or_default()
    }

    /// Sample rate in Hz (`imSampRate` or `niSampRate`).
    pub fn sample_rate(&self) -> Result<f64> {
        if self.get("imSampRate").is_some() {
            self.required_f64("imSampRate")
        } else {
            self.required_f64("niSampRate")
        }
    }

    /// Number of channels stored per frame in the `.bin` file.
    pub fn saved_channels(&self) -> Result<usize> {
        let n = self.required_f64("nSavedChans")?;
        if n < 1.0 || n.fract() != 0.0 {
            return Err(self.error(format!("invalid nSavedChans {n}")));
        }
        Ok(n as usize)
    }

    /// Per-type channel counts: `(ap, lf, sync)` for imec streams.
    pub fn imec_counts(&self) -> Option<(usize, usize, usize)> {
        match self.counts("snsApLfSy").as_slice() {
            [ap, lf, sy] => Some((*ap, *lf, *sy)),
            _ => None,
        }
    }

    /// Per-type channel counts: `(mn, ma, xa, dw)` for NI-DAQ streams.
    pub fn nidq_counts(&self) -> Option<(usize, usize, usize, usize)> {
        match self.counts("snsMnMaXaDw").as_slice() {
            [mn, ma, xa, dw] => Some((*mn, *ma, *xa, *dw)),
            _ => None,
        }
    }

    /// Number of trailing sync channels in an imec stream.
    pub fn sync_channels(&self) -> usize {
        self.imec_counts().map(|(_, _, sy)| sy).unwrap_or(0)
    }

    /// Channel names in storage order.
    pub fn channel_names(&self, kind: GlxStreamKind) -> Result<Vec<String>> {
        let saved = self.saved_channels()?;
        let names: Vec<String> = match kind {
            GlxStreamKind::ImecAp | GlxStreamKind::ImecLf => match self.imec_counts() {
                Some((ap, lf, sy)) => (0..ap)
                    .map(|i| format!("AP{i}"))
                    .chain((0..lf).map(|i| format!("LF{i}")))
                    .chain((0..sy).map(|i| format!("SY{i}")))
                    .collect(),
                None => (0..saved).map(|i| format!("CH{i}")).collect(),
            },
            GlxStreamKind::Nidq => match self.nidq_counts() {
                Some((mn, ma, xa, dw)) => (0..mn)
                    .map(|i| format!("MN{i}"))
                    .chain((0..ma).map(|i| format!("MA{i}")))
                    .chain((0..xa).map(|i| format!("XA{i}")))
                    .chain((0..dw).map(|i| format!("XD{i}")))
                    .collect(),
                None => (0..saved).map(|i| format!("CH{i}")).collect(),
            },
            GlxStreamKind::Other => (0..saved).map(|i| format!("CH{i}")).collect(),
        };

        if names.len() != saved {
            return Err(self.error(format!(
                "channel counts describe {} channels but nSavedChans is {saved}",
                names.len()
            )));
        }
        Ok(names)
    }

    /// Microvolts per raw unit for each saved channel.
    pub fn gains(&self, kind: GlxStreamKind) -> Result<Vec<f64>> {
        let saved = self.saved_channels()?;
        let gains = match kind {
            GlxStreamKind::ImecAp | GlxStreamKind::ImecLf => {
                let range = self
                    .get("imAiRangeMax")
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.6);
                let max_int = self
                    .get("imMaxInt")
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(512.0);
                let band_gain = if kind == GlxStreamKind::ImecAp {
                    DEFAULT_AP_GAIN
                } else {
                    DEFAULT_LF_GAIN
                };
                let sync = self.sync_channels();
                (0..saved)
                    .map(|i| {
                        if i + sync >= saved {
                            1.0
                        } else {
                            range / max_int / band_gain * 1e6
                        }
                    })
                    .collect()
            }
            GlxStreamKind::Nidq => {
                let range = self
                    .get("niAiRangeMax")
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(5.0);
                let gain = self
                    .get("niMNGain")
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(1.0);
                vec![range / 32768.0 / gain * 1e6; saved]
            }
            GlxStreamKind::Other => vec![1.0; saved],
        };
        Ok(gains)
    }

    /// Recording start time, normalised to `YYYY-MM-DD HH:MM:SS`.
    pub fn start_time(&self) -> Option<String> {
        let raw = self.get("fileCreateTime")?;
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AP_META: &str = "\
imSampRate=30000
nSavedChans=385
snsApLfSy=384,0,1
imAiRangeMax=0.6
imMaxInt=512
fileCreateTime=2020-06-03T13:47:57
imDatPrb_sn=18194814141
~snsShankMap=(1,2,480)(0:0:0:1)(0:1:0:1)
";

    #[test]
    fn test_file_name_parse() {
        let f = GlxFileName::parse("Noise4Sam_g0_t0.imec0.ap.meta").unwrap();
        assert_eq!(f.run, "Noise4Sam");
        assert_eq!(f.gate, 0);
        assert_eq!(f.trigger, 0);
        assert_eq!(f.stream, "imec0.ap");
        assert_eq!(f.kind(), GlxStreamKind::ImecAp);

        let n = GlxFileName::parse("my_run_g1_t12.nidq.meta").unwrap();
        assert_eq!(n.run, "my_run");
        assert_eq!(n.gate, 1);
        assert_eq!(n.trigger, 12);
        assert_eq!(n.kind(), GlxStreamKind::Nidq);

        let cat = GlxFileName::parse("run_g0_tcat.imec1.lf.meta").unwrap();
        assert_eq!(cat.trigger, u32::MAX);
        assert_eq!(cat.kind(), GlxStreamKind::ImecLf);

        assert!(GlxFileName::parse("notes.meta").is_none());
        assert!(GlxFileName::parse("run_g0_t0.imec0.ap.bin").is_none());
    }

    #[test]
    fn test_meta_values() {
        let meta = SpikeGlxMeta::parse("/d/x.meta", AP_META);
        assert_eq!(meta.sample_rate().unwrap(), 30000.0);
        assert_eq!(meta.saved_channels().unwrap(), 385);
        assert_eq!(meta.imec_counts(), Some((384, 0, 1)));
        assert_eq!(meta.sync_channels(), 1);
        assert_eq!(meta.get("~snsShankMap"), Some("(1,2,480)(0:0:0:1)(0:1:0:1)"));
        assert_eq!(meta.start_time().as_deref(), Some("2020-06-03 13:47:57"));
    }

    #[test]
    fn test_channel_names_and_gains() {
        let meta = SpikeGlxMeta::parse("/d/x.meta", AP_META);
        let names = meta.channel_names(GlxStreamKind::ImecAp).unwrap();
        assert_eq!(names.len(), 385);
        assert_eq!(names[0], "AP0");
        assert_eq!(names[384], "SY0");

        let gains = meta.gains(GlxStreamKind::ImecAp).unwrap();
        assert!((gains[0] - 2.34375).abs() < 1e-9);
        assert_eq!(gains[384], 1.0);
    }

    #[test]
    fn test_nidq_names() {
        let meta = SpikeGlxMeta::parse(
            "/d/n.meta",
            "niSampRate=25000\nnSavedChans=9\nsnsMnMaXaDw=0,0,8,1\n",
        );
        let names = meta.channel_names(GlxStreamKind::Nidq).unwrap();
        assert_eq!(names.first().map(String::as_str), Some("XA0"));
        assert_eq!(names.last().map(String::as_str), Some("XD0"));
        assert_eq!(meta.sample_rate().unwrap(), 25000.0);
        assert_eq!(meta.sync_channels(), 0);
    }

    #[test]
    fn test_inconsistent_counts() {
        let meta = SpikeGlxMeta::parse("/d/x.meta", "imSampRate=30000\nnSavedChans=10\nsnsApLfSy=384,0,1\n");
        let err = meta.channel_names(GlxStreamKind::ImecAp).unwrap_err();
        assert!(matches!(err, EphysError::Backend { .. }));
    }

    #[test]
    fn test_missing_rate() {
        let meta = SpikeGlxMeta::parse("/d/x.meta", "nSavedChans=4\n");
        let err = meta.sample_rate().unwrap_err();
        assert!(err.to_string().contains("niSampRate"));
    }
}
