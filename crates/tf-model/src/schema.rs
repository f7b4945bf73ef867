//! Serializable model document handed to the external fitter.
//!
//! The document is declarative: channels hold observations, masks, and
//! samples; samples are either fixed templates, per-bin parametric
//! yields, or transfer-factor products of another channel's sample.

use serde::{Deserialize, Serialize};

/// Top-level model document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDoc {
    /// Model name, also used as the output directory stem.
    pub name: String,
    /// Fit channels, one per (pt bin, region).
    pub channels: Vec<ChannelDoc>,
}

impl ModelDoc {
    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> Option<&ChannelDoc> {
        self.channels.iter().find(|c| c.name == name)
    }

    fn channel_mut(&mut self, name: &str) -> Option<&mut ChannelDoc> {
        self.channels.iter_mut().find(|c| c.name == name)
    }

    /// Append a sample to a named channel.
    pub fn add_sample(&mut self, channel: &str, sample: SampleDoc) -> Option<()> {
        self.channel_mut(channel).map(|c| c.samples.push(sample))
    }
}

/// One fit channel: observed counts, fit mask, and its samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDoc {
    pub name: String,
    /// Observed (or pseudo-observed) counts per mass bin.
    pub observation: Vec<f64>,
    /// Mass bin edges.
    pub edges: Vec<f64>,
    /// Bins participating in the fit. Same length as `observation`.
    pub mask: Vec<bool>,
    pub samples: Vec<SampleDoc>,
}

/// Role of a sample in the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Signal,
    Background,
}

/// One process within a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDoc {
    /// Fully qualified name, `{channel}_{process}`.
    pub name: String,
    pub sample_type: SampleType,
    pub source: SampleSource,
    /// Multiplicative nuisance effects on this sample.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<ParamEffect>,
}

/// Where a sample's per-bin expectation comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleSource {
    /// Fixed shape from a histogram template.
    Template { values: Vec<f64> },
    /// Per-bin free yields: `initial[j] * width[j]^theta_j` with one
    /// parameter per mass bin.
    Parameteric {
        initial: Vec<f64>,
        /// Exponential step size per bin, `1 + sigmascale / max(1, sqrt(initial))`.
        widths: Vec<f64>,
        param_names: Vec<String>,
    },
    /// Product of another sample's expectation and a per-bin surface that
    /// is linear in the surface parameters:
    /// `tf[j] = sum_k coefficients[j][k] * theta_k`.
    TransferFactor {
        coefficients: Vec<Vec<f64>>,
        param_names: Vec<String>,
        dependent_on: String,
    },
}

/// A nuisance parameter acting on one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamEffect {
    /// Parameter name, shared across samples carrying the same effect.
    pub name: String,
    pub kind: EffectKind,
}

/// How a nuisance parameter modifies a sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Log-normal yield modifier, e.g. `value = 1.023` for a 2.3% effect.
    LogNormal { value: f64 },
    /// Free multiplicative scale with the given nominal value, bounded
    /// to [0, 1]. Used for the vector-sample region efficiencies.
    Scale { nominal: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_sample(name: &str) -> SampleDoc {
        SampleDoc {
            name: name.to_string(),
            sample_type: SampleType::Background,
            source: SampleSource::Template { values: vec![1.0, 2.0] },
            effects: vec![ParamEffect {
                name: "CMS_lumi".into(),
                kind: EffectKind::LogNormal { value: 1.023 },
            }],
        }
    }

    #[test]
    fn add_sample_targets_named_channel() {
        let mut model = ModelDoc {
            name: "m".into(),
            channels: vec![
                ChannelDoc {
                    name: "ptbin0pqq".into(),
                    observation: vec![3.0, 4.0],
                    edges: vec![0.0, 1.0, 2.0],
                    mask: vec![true, true],
                    samples: vec![],
                },
            ],
        };
        assert!(model.add_sample("ptbin0pqq", template_sample("ptbin0pqq_tqq")).is_some());
        assert!(model.add_sample("ptbin9pqq", template_sample("x")).is_none());
        assert_eq!(model.channel("ptbin0pqq").unwrap().samples.len(), 1);
    }

    #[test]
    fn document_roundtrips_through_json() {
        let doc = ModelDoc {
            name: "temp3Model".into(),
            channels: vec![ChannelDoc {
                name: "ptbin0pbb".into(),
                observation: vec![5.0],
                edges: vec![40.0, 47.0],
                mask: vec![false],
                samples: vec![SampleDoc {
                    name: "ptbin0pbb_qcd".into(),
                    sample_type: SampleType::Background,
                    source: SampleSource::TransferFactor {
                        coefficients: vec![vec![0.5, 0.5]],
                        param_names: vec!["tf_pt0_rho0".into(), "tf_pt0_rho1".into()],
                        dependent_on: "ptbin0pqq_qcd".into(),
                    },
                    effects: vec![],
                }],
            }],
        };
        let text = serde_json::to_string(&doc).unwrap();
        let back: ModelDoc = serde_json::from_str(&text).unwrap();
        assert_eq!(back.channels[0].name, "ptbin0pbb");
        match &back.channels[0].samples[0].source {
            SampleSource::TransferFactor { dependent_on, .. } => {
                assert_eq!(dependent_on, "ptbin0pqq_qcd");
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }
}
