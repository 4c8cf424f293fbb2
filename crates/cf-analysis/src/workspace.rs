//! Export of channels as a pyhf JSON workspace.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelSample, SampleRole};

/// Default parameter of interest.
pub const DEFAULT_POI: &str = "mu";

const UP: &str = "_UP";
const DOWN: &str = "_DOWN";

/// pyhf workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// Channels
    pub channels: Vec<WsChannel>,
    /// Observations
    pub observations: Vec<Observation>,
    /// Measurements
    pub measurements: Vec<Measurement>,
    /// Schema version
    #[serde(default)]
    pub version: Option<String>,
}

/// Channel (region)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsChannel {
    /// Channel name
    pub name: String,
    /// Samples in this channel
    pub samples: Vec<WsSample>,
}

/// Sample (process)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsSample {
    /// Sample name
    pub name: String,
    /// Expected event counts per bin
    pub data: Vec<f64>,
    /// Modifiers (systematics)
    pub modifiers: Vec<Modifier>,
}

/// Modifier (systematic uncertainty)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Modifier {
    /// Free-floating normalization (signal strength).
    #[serde(rename = "normfactor")]
    NormFactor {
        /// Modifier name.
        name: String,
        /// Always null.
        #[serde(default)]
        data: Option<serde_json::Value>,
    },

    /// Up/down shape templates.
    #[serde(rename = "histosys")]
    HistoSys {
        /// Modifier name.
        name: String,
        /// Up/down templates.
        data: HistoSysData,
    },

    /// Per-bin MC statistical uncertainty.
    #[serde(rename = "staterror")]
    StatError {
        /// Modifier name.
        name: String,
        /// Per-bin uncertainties.
        data: Vec<f64>,
    },
}

/// histosys data (up/down histograms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoSysData {
    /// Up template.
    pub hi_data: Vec<f64>,
    /// Down template.
    pub lo_data: Vec<f64>,
}

/// Observation (data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Channel name this observation belongs to
    pub name: String,
    /// Observed event counts per bin
    pub data: Vec<f64>,
}

/// Measurement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Measurement name
    pub name: String,
    /// Configuration
    pub config: MeasurementConfig,
}

/// Measurement config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Parameter of interest
    pub poi: String,
    /// Parameter configurations
    #[serde(default)]
    pub parameters: Vec<serde_json::Value>,
}

impl Workspace {
    /// Workspace with one measurement on `poi`.
    ///
    /// Signal samples carry a normfactor on `poi`, every model sample a
    /// staterror, and `NAME_UP`/`NAME_DOWN` variation pairs become a histosys
    /// named `NAME`. Blinded channels observe the summed backgrounds (Asimov).
    pub fn from_channels(channels: &[Channel], poi: &str) -> Self {
        let mut ws_channels = Vec::with_capacity(channels.len());
        let mut observations = Vec::with_capacity(channels.len());
        for ch in channels {
            let samples = ch.samples.iter().map(|s| export_sample(&ch.name, s, poi)).collect();
            let data = match &ch.data {
                Some(d) => d.nominal.bin_content.clone(),
                None => asimov(ch),
            };
            ws_channels.push(WsChannel { name: ch.name.clone(), samples });
            observations.push(Observation { name: ch.name.clone(), data });
        }
        Workspace {
            channels: ws_channels,
            observations,
            measurements: vec![Measurement {
                name: "measurement".to_string(),
                config: MeasurementConfig { poi: poi.to_string(), parameters: Vec::new() },
            }],
            version: Some("1.0.0".to_string()),
        }
    }
}

fn asimov(channel: &Channel) -> Vec<f64> {
    let n = channel.samples.first().map_or(0, |s| s.nominal.n_bins());
    let mut total = vec![0.0; n];
    for s in channel.samples.iter().filter(|s| s.role == SampleRole::Background) {
        for (t, c) in total.iter_mut().zip(&s.nominal.bin_content) {
            *t += c;
        }
    }
    total
}

fn export_sample(channel: &str, sample: &ChannelSample, poi: &str) -> WsSample {
    let mut modifiers = Vec::new();
    if sample.role == SampleRole::Signal {
        modifiers.push(Modifier::NormFactor { name: poi.to_string(), data: None });
    }

    let nominal = &sample.nominal.bin_content;
    let names: BTreeSet<&str> = sample
        .variations
        .keys()
        .filter_map(|k| k.strip_suffix(UP).or_else(|| k.strip_suffix(DOWN)))
        .collect();
    for name in names {
        let up = sample.variations.get(&format!("{name}{UP}")).map(|h| h.bin_content.clone());
        let down = sample.variations.get(&format!("{name}{DOWN}")).map(|h| h.bin_content.clone());
        let (hi_data, lo_data) = match (up, down) {
            (Some(hi), Some(lo)) => (hi, lo),
            (Some(one), None) | (None, Some(one)) => {
                log::warn!("'{}' {name}: one-sided variation, symmetrizing", sample.name);
                let mirror = nominal.iter().zip(&one).map(|(n, v)| (2.0 * n - v).max(0.0)).collect();
                if sample.variations.contains_key(&format!("{name}{UP}")) {
                    (one, mirror)
                } else {
                    (mirror, one)
                }
            }
            (None, None) => continue,
        };
        modifiers.push(Modifier::HistoSys { name: name.to_string(), data: HistoSysData { hi_data, lo_data } });
    }

    modifiers.push(Modifier::StatError { name: format!("staterror_{channel}"), data: sample.nominal.errors() });
    WsSample { name: sample.name.clone(), data: nominal.clone(), modifiers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::make_channel;
    use cf_select::Histogram;
    use std::collections::BTreeMap;

    fn hist(name: &str, content: &[f64]) -> Histogram {
        let mut h = Histogram::uniform(name, content.len(), 0.0, 1.0).unwrap();
        for (i, &c) in content.iter().enumerate() {
            h.bin_content[i] = c;
            h.sumw2[i] = c;
        }
        h
    }

    fn sample(name: &str, role: SampleRole, content: &[f64]) -> ChannelSample {
        ChannelSample { name: name.into(), role, nominal: hist(name, content), variations: BTreeMap::new() }
    }

    #[test]
    fn exports_signal_normfactor_and_histosys() {
        let mut ztt = sample("Ztautau", SampleRole::Background, &[4.0, 9.0]);
        ztt.variations.insert("TES_UP".into(), hist("up", &[5.0, 10.0]));
        ztt.variations.insert("TES_DOWN".into(), hist("down", &[3.0, 8.0]));
        ztt.variations.insert("JES_UP".into(), hist("jes", &[6.0, 9.0]));
        let sig = sample("VBFH", SampleRole::Signal, &[0.0, 1.0]);
        let data = sample("Data", SampleRole::Data, &[5.0, 11.0]);
        let ch = make_channel("vbf_125", vec![ztt, sig], Some(data));

        let ws = Workspace::from_channels(&[ch], DEFAULT_POI);
        assert_eq!(ws.observations[0].data, vec![5.0, 11.0]);
        let ztt = &ws.channels[0].samples[0];
        assert_eq!(ztt.modifiers.len(), 3);
        assert_eq!(
            ztt.modifiers[0],
            Modifier::HistoSys {
                name: "JES".into(),
                data: HistoSysData { hi_data: vec![6.0, 9.0], lo_data: vec![2.0, 9.0] }
            }
        );
        assert!(matches!(&ztt.modifiers[2], Modifier::StatError { data, .. } if data == &vec![2.0, 3.0]));
        let sig = &ws.channels[0].samples[1];
        assert!(matches!(&sig.modifiers[0], Modifier::NormFactor { name, .. } if name == DEFAULT_POI));
    }

    #[test]
    fn blinded_channel_observes_asimov() {
        let ch = make_channel(
            "vbf",
            vec![
                sample("Ztautau", SampleRole::Background, &[1.0, 2.0]),
                sample("QCD", SampleRole::Background, &[0.5, 0.5]),
            ],
            None,
        );
        let ws = Workspace::from_channels(&[ch], DEFAULT_POI);
        assert_eq!(ws.observations[0].data, vec![1.5, 2.5]);
        let json = serde_json::to_value(&ws).unwrap();
        assert_eq!(json["channels"][0]["samples"][0]["modifiers"][0]["type"], "staterror");
        assert_eq!(json["measurements"][0]["config"]["poi"], DEFAULT_POI);
    }

    #[test]
    fn blinded_asimov_excludes_signal() {
        let ch = make_channel(
            "vbf_125",
            vec![
                sample("Ztautau", SampleRole::Background, &[2.0]),
                sample("VBFH", SampleRole::Signal, &[1.0]),
            ],
            None,
        );
        let ws = Workspace::from_channels(&[ch], DEFAULT_POI);
        assert_eq!(ws.observations[0].data, vec![2.0]);
        assert_eq!(ws.channels[0].samples[1].data, vec![1.0]);
    }
}
