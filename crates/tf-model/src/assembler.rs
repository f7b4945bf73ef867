//! Assembles the fit model from the template store.
//!
//! Mirrors the analysis structure: one channel per (pt bin, region) over
//! the three charm-tagging regions, template samples for the listed
//! processes, parametric vector-sample efficiencies, and the QCD
//! transfer-factor construction that predicts the tagged regions from
//! the light region.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use tf_core::binning::{BLIND_HI, BLIND_LO, N_MSD, N_PT};
use tf_core::{Error, Result};
use tf_store::{lookup, pseudo_data, HistStore, TemplateKey};

use crate::bernstein::{AnalysisGrid, BernsteinPoly};
use crate::mctf::{self, DecoTransform};
use crate::schema::{
    ChannelDoc, EffectKind, ModelDoc, ParamEffect, SampleDoc, SampleSource, SampleType,
};

/// Fit regions, in channel construction order.
pub const REGIONS: [&str; 3] = ["pbb", "pcc", "pqq"];
/// Electroweak V+jets processes.
pub const VECTOR_SAMPLES: [&str; 5] = ["zbb", "zcc", "zqq", "wcq", "wqq"];

const LUMI_PARAM: &str = "CMS_lumi";
const LUMI_VALUE: f64 = 1.023;
const SIGMA_SCALE: f64 = 10.0;
const MODEL_NAME: &str = "temp3Model";

/// Model construction switches.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Observations come from summed MC (optionally fluctuated) instead
    /// of recorded data.
    pub pseudo: bool,
    /// Poisson-fluctuate pseudo-data observations.
    pub throw_poisson: bool,
    /// Fit a Bernstein surface to the MC QCD ratio first.
    pub mctf: bool,
    /// Derive tagged-region QCD from the light region via transfer factors.
    pub fit_tf: bool,
    /// Float vector-sample region efficiencies instead of fixing them.
    pub param_vectors: bool,
    /// Use matched V/H templates.
    pub matched: bool,
    /// Pseudo-data RNG seed.
    pub seed: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            pseudo: true,
            throw_poisson: false,
            mctf: false,
            fit_tf: false,
            param_vectors: true,
            matched: true,
            seed: 0,
        }
    }
}

/// Assembled model plus the MC surface decorrelation, when it ran.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub model: ModelDoc,
    pub deco: Option<DecoTransform>,
}

/// Build the full fit model from a flat template store.
pub fn build_model(store: &impl HistStore, opts: &BuildOptions) -> Result<BuildOutput> {
    let grid = AnalysisGrid::analysis();

    // MC QCD templates per region, also the MC TF fit inputs
    let qcd_region = |region: &str| -> Result<Vec<tf_core::Histogram>> {
        (0..N_PT)
            .map(|ptbin| {
                let h = lookup(store, &TemplateKey::new(region, "qcd", ptbin))?.into_histogram();
                if h.nbins() != N_MSD {
                    return Err(Error::Validation(format!(
                        "qcd_{region}_bin{ptbin} has {} bins, expected {N_MSD}",
                        h.nbins()
                    )));
                }
                Ok(h)
            })
            .collect()
    };
    let qcd_pqq = qcd_region("pqq")?;
    let qcd_pcc = qcd_region("pcc")?;
    let qcd_pbb = qcd_region("pbb")?;
    let sum_of = |hists: &[tf_core::Histogram]| hists.iter().map(|h| h.sum()).sum::<f64>();
    let (tot_pqq, tot_pcc, tot_pbb) = (sum_of(&qcd_pqq), sum_of(&qcd_pcc), sum_of(&qcd_pbb));
    if tot_pqq <= 0.0 {
        return Err(Error::Computation(format!(
            "total pqq QCD yield is {tot_pqq}, cannot form QCD efficiencies"
        )));
    }
    let qcdeff_cc = tot_pcc / tot_pqq;
    let qcdeff_bb = tot_pbb / tot_pqq;
    info!(qcdeff_cc, qcdeff_bb, "MC QCD efficiencies");

    let mc_surface = if opts.mctf {
        let poly = BernsteinPoly::new("tf_MCtemplbb", (2, 2), (-50.0, 50.0));
        Some(mctf::fit(&poly, &qcd_pqq, &qcd_pbb, &grid, qcdeff_bb)?)
    } else {
        None
    };

    let mut include_samples: Vec<&str> = Vec::new();
    if !opts.param_vectors {
        include_samples.extend(VECTOR_SAMPLES);
    }
    if !opts.fit_tf {
        include_samples.push("qcd");
    }

    let mut model = ModelDoc { name: MODEL_NAME.into(), channels: Vec::new() };
    let mut rng = StdRng::seed_from_u64(opts.seed);

    for ptbin in 0..N_PT {
        for region in REGIONS {
            let name = format!("ptbin{ptbin}{region}");
            let mut mask = grid.validbins[ptbin].clone();
            if !opts.pseudo && region != "pqq" {
                for m in mask.iter_mut().take(BLIND_HI).skip(BLIND_LO) {
                    *m = false;
                }
            }

            let mut samples = Vec::new();
            for &s in &include_samples {
                let key = TemplateKey::new(region, s, ptbin).with_matched(opts.matched);
                let templ = lookup(store, &key)?.into_histogram();
                samples.push(SampleDoc {
                    name: format!("{name}_{s}"),
                    sample_type: sample_type(s),
                    source: SampleSource::Template { values: templ.values },
                    effects: vec![lumi_effect()],
                });
            }

            let observation = if opts.pseudo {
                let mut mc: Vec<&str> = include_samples.clone();
                mc.extend(VECTOR_SAMPLES);
                mc.push("qcd");
                pseudo_data(store, region, ptbin, &mc, opts.matched, opts.throw_poisson, &mut rng)?
            } else {
                let key = TemplateKey::new(region, "data_obs", ptbin);
                lookup(store, &key)?.into_histogram()
            };
            if observation.nbins() != N_MSD {
                return Err(Error::Validation(format!(
                    "observation in {name} has {} bins, expected {N_MSD}",
                    observation.nbins()
                )));
            }

            model.channels.push(ChannelDoc {
                name,
                edges: observation.edges.clone(),
                observation: observation.values,
                mask,
                samples,
            });
        }
    }

    if opts.param_vectors {
        add_parametric_vectors(store, &mut model, opts)?;
    }

    if opts.fit_tf {
        add_transfer_factors(&mut model, &grid, qcdeff_cc, qcdeff_bb, mc_surface.as_ref())?;
    }

    Ok(BuildOutput { model, deco: mc_surface.map(|r| r.deco) })
}

fn sample_type(sample: &str) -> SampleType {
    if sample == "zcc" { SampleType::Signal } else { SampleType::Background }
}

fn lumi_effect() -> ParamEffect {
    ParamEffect { name: LUMI_PARAM.into(), kind: EffectKind::LogNormal { value: LUMI_VALUE } }
}

/// Vector samples enter every channel as templates whose region split is
/// floated: one efficiency parameter per (sample, region), nominal at
/// the MC fraction of the sample's total yield in that region.
fn add_parametric_vectors(
    store: &impl HistStore,
    model: &mut ModelDoc,
    opts: &BuildOptions,
) -> Result<()> {
    for &s in &VECTOR_SAMPLES {
        let mut tot = 0.0;
        let mut tot_region = [0.0; REGIONS.len()];
        for ptbin in 0..N_PT {
            for (r, region) in REGIONS.iter().enumerate() {
                let key = TemplateKey::new(*region, s, ptbin).with_matched(opts.matched);
                let norm = lookup(store, &key)?.into_histogram().sum();
                tot += norm;
                tot_region[r] += norm;
            }
        }
        if tot <= 0.0 {
            return Err(Error::Validation(format!(
                "vector sample '{s}' has total yield {tot}, cannot float its region split"
            )));
        }

        for ptbin in 0..N_PT {
            for (r, region) in REGIONS.iter().enumerate() {
                let channel = format!("ptbin{ptbin}{region}");
                let key = TemplateKey::new(*region, s, ptbin).with_matched(opts.matched);
                let templ = lookup(store, &key)?.into_histogram();
                let sample = SampleDoc {
                    name: format!("{channel}_{s}"),
                    sample_type: sample_type(s),
                    source: SampleSource::Template { values: templ.values },
                    effects: vec![
                        ParamEffect {
                            name: format!("veff_{s}_{region}"),
                            kind: EffectKind::Scale { nominal: tot_region[r] / tot },
                        },
                        lumi_effect(),
                    ],
                };
                model.add_sample(&channel, sample).ok_or_else(|| {
                    Error::Computation(format!("channel '{channel}' missing during assembly"))
                })?;
            }
        }
    }
    Ok(())
}

/// The QCD construction: free per-bin yields in pqq, transfer-factor
/// products of those yields in pcc and pbb.
fn add_transfer_factors(
    model: &mut ModelDoc,
    grid: &AnalysisGrid,
    qcdeff_cc: f64,
    qcdeff_bb: f64,
    mc_surface: Option<&mctf::McTfResult>,
) -> Result<()> {
    let tf_cc = BernsteinPoly::new("tf_dataResidual_cc", (1, 3), (-10.0, 10.0));
    let tf_bb = BernsteinPoly::new("tf_dataResidual_bb", (1, 3), (-10.0, 10.0));

    for ptbin in 0..N_PT {
        let pqq_name = format!("ptbin{ptbin}pqq");
        let pqq = model.channel(&pqq_name).ok_or_else(|| {
            Error::Computation(format!("channel '{pqq_name}' missing during assembly"))
        })?;

        // residual observation once all template expectations are removed
        let mut initial_qcd = pqq.observation.clone();
        for sample in &pqq.samples {
            if let SampleSource::Template { values } = &sample.source {
                for (q, v) in initial_qcd.iter_mut().zip(values.iter()) {
                    *q -= v;
                }
            }
        }
        if initial_qcd.iter().any(|&v| v < 0.0) {
            return Err(Error::Validation(format!(
                "initial QCD yield negative in {pqq_name}: {initial_qcd:?}"
            )));
        }

        let widths: Vec<f64> =
            initial_qcd.iter().map(|&v| 1.0 + SIGMA_SCALE / v.sqrt().max(1.0)).collect();
        let param_names: Vec<String> =
            (0..N_MSD).map(|j| format!("qcdparam_ptbin{ptbin}_msdbin{j}")).collect();
        let pqq_qcd_name = format!("{pqq_name}_qcd");
        model
            .add_sample(
                &pqq_name,
                SampleDoc {
                    name: pqq_qcd_name.clone(),
                    sample_type: SampleType::Background,
                    source: SampleSource::Parameteric {
                        initial: initial_qcd,
                        widths,
                        param_names,
                    },
                    effects: vec![],
                },
            )
            .ok_or_else(|| {
                Error::Computation(format!("channel '{pqq_name}' missing during assembly"))
            })?;

        // tagged-region surfaces: data residual times the MC efficiency,
        // and the fitted MC surface when it ran
        let tf_rows = |poly: &BernsteinPoly, eff: f64, with_mc: bool| -> Vec<Vec<f64>> {
            (0..N_MSD)
                .map(|j| {
                    let mc = match (with_mc, mc_surface) {
                        (true, Some(res)) => res.surface[ptbin][j],
                        _ => 1.0,
                    };
                    poly.basis_row(grid.ptscaled[ptbin], grid.rhoscaled[ptbin][j])
                        .into_iter()
                        .map(|b| eff * mc * b)
                        .collect()
                })
                .collect()
        };
        for (region, poly, eff, with_mc) in [
            ("pcc", &tf_cc, qcdeff_cc, true),
            ("pbb", &tf_bb, qcdeff_bb, false),
        ] {
            let channel = format!("ptbin{ptbin}{region}");
            model
                .add_sample(
                    &channel,
                    SampleDoc {
                        name: format!("{channel}_qcd"),
                        sample_type: SampleType::Background,
                        source: SampleSource::TransferFactor {
                            coefficients: tf_rows(poly, eff, with_mc),
                            param_names: poly.param_names(),
                            dependent_on: pqq_qcd_name.clone(),
                        },
                        effects: vec![],
                    },
                )
                .ok_or_else(|| {
                    Error::Computation(format!("channel '{channel}' missing during assembly"))
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tf_core::binning::msd_edges;
    use tf_core::Histogram;
    use tf_store::TemplateStore;

    fn fixture_store() -> TemplateStore {
        let edges = msd_edges();
        let mut map = BTreeMap::new();
        let mut put = |name: String, value: f64| {
            map.insert(
                name,
                Histogram::new(vec![value; N_MSD], edges.clone(), "msd", None).unwrap(),
            );
        };
        for ptbin in 0..N_PT {
            for region in REGIONS {
                put(format!("qcd_{region}_bin{ptbin}"), 1000.0);
                put(format!("tqq_{region}_bin{ptbin}"), 5.0);
                put(format!("data_obs_{region}_bin{ptbin}"), 1050.0);
                for s in VECTOR_SAMPLES {
                    put(format!("{s}_{region}_bin{ptbin}"), 8.0);
                    put(format!("{s}_{region}_matchedUp_bin{ptbin}"), 6.0);
                }
            }
        }
        TemplateStore::from_map(map)
    }

    #[test]
    fn builds_all_channels() {
        let out = build_model(&fixture_store(), &BuildOptions::default()).unwrap();
        assert_eq!(out.model.channels.len(), N_PT * REGIONS.len());
        assert!(out.model.channel("ptbin0pbb").is_some());
        assert!(out.model.channel("ptbin5pqq").is_some());
        assert!(out.deco.is_none());
    }

    #[test]
    fn pseudo_observation_is_exact_sum_without_poisson() {
        let out = build_model(&fixture_store(), &BuildOptions::default()).unwrap();
        // qcd + 5 matched vector samples: 1000 + 5 * 6
        let ch = out.model.channel("ptbin2pcc").unwrap();
        for &v in &ch.observation {
            assert!((v - 1030.0).abs() < 1e-9, "observation bin = {v}");
        }
    }

    #[test]
    fn real_data_blinds_tagged_regions_only() {
        let opts = BuildOptions { pseudo: false, ..BuildOptions::default() };
        let out = build_model(&fixture_store(), &opts).unwrap();
        let pcc = out.model.channel("ptbin1pcc").unwrap();
        assert!(pcc.mask[BLIND_LO..BLIND_HI].iter().all(|&m| !m));
        let pqq = out.model.channel("ptbin1pqq").unwrap();
        assert!(pqq.mask[BLIND_LO..BLIND_HI].iter().any(|&m| m));
    }

    #[test]
    fn zcc_is_the_signal_sample() {
        let opts = BuildOptions { param_vectors: true, ..BuildOptions::default() };
        let out = build_model(&fixture_store(), &opts).unwrap();
        let ch = out.model.channel("ptbin0pcc").unwrap();
        let zcc = ch.samples.iter().find(|s| s.name.ends_with("_zcc")).unwrap();
        assert_eq!(zcc.sample_type, SampleType::Signal);
        let zbb = ch.samples.iter().find(|s| s.name.ends_with("_zbb")).unwrap();
        assert_eq!(zbb.sample_type, SampleType::Background);
    }

    #[test]
    fn every_template_sample_carries_lumi() {
        let out = build_model(&fixture_store(), &BuildOptions::default()).unwrap();
        for ch in &out.model.channels {
            for s in &ch.samples {
                assert!(
                    s.effects.iter().any(|e| e.name == LUMI_PARAM),
                    "sample {} lacks lumi",
                    s.name
                );
            }
        }
    }

    #[test]
    fn fit_tf_wires_qcd_through_the_light_region() {
        let opts = BuildOptions { fit_tf: true, ..BuildOptions::default() };
        let out = build_model(&fixture_store(), &opts).unwrap();
        let pqq = out.model.channel("ptbin3pqq").unwrap();
        let qcd = pqq.samples.iter().find(|s| s.name.ends_with("_qcd")).unwrap();
        match &qcd.source {
            SampleSource::Parameteric { initial, widths, param_names } => {
                assert_eq!(initial.len(), N_MSD);
                assert_eq!(widths.len(), N_MSD);
                assert_eq!(param_names[0], "qcdparam_ptbin3_msdbin0");
                // observation 1030 minus the five floated vector
                // templates at 6 per bin
                assert!((initial[0] - 1000.0).abs() < 1e-9);
            }
            other => panic!("unexpected pqq qcd source: {other:?}"),
        }
        let pbb = out.model.channel("ptbin3pbb").unwrap();
        let qcd = pbb.samples.iter().find(|s| s.name.ends_with("_qcd")).unwrap();
        match &qcd.source {
            SampleSource::TransferFactor { coefficients, param_names, dependent_on } => {
                assert_eq!(dependent_on, "ptbin3pqq_qcd");
                assert_eq!(coefficients.len(), N_MSD);
                assert_eq!(param_names.len(), 8);
                // flat MC ratio: coefficient rows sum to the efficiency
                let row_sum: f64 = coefficients[5].iter().sum();
                assert!((row_sum - 1.0).abs() < 1e-9, "row sums to {row_sum}");
            }
            other => panic!("unexpected pbb qcd source: {other:?}"),
        }
    }

    #[test]
    fn mctf_produces_a_deco_transform() {
        let opts = BuildOptions { mctf: true, fit_tf: true, ..BuildOptions::default() };
        let out = build_model(&fixture_store(), &opts).unwrap();
        let deco = out.deco.unwrap();
        assert_eq!(deco.transform.len(), 9);
        assert!(deco.param_names[0].starts_with("tf_MCtemplbb"));
    }

    #[test]
    fn negative_initial_qcd_is_fatal() {
        let edges = msd_edges();
        let mut map = BTreeMap::new();
        let mut put = |name: String, value: f64| {
            map.insert(
                name,
                Histogram::new(vec![value; N_MSD], edges.clone(), "msd", None).unwrap(),
            );
        };
        for ptbin in 0..N_PT {
            for region in REGIONS {
                put(format!("qcd_{region}_bin{ptbin}"), 10.0);
                // non-parametric vector templates larger than the observation
                for s in VECTOR_SAMPLES {
                    put(format!("{s}_{region}_bin{ptbin}"), 50.0);
                    put(format!("{s}_{region}_matchedUp_bin{ptbin}"), 50.0);
                }
                put(format!("data_obs_{region}_bin{ptbin}"), 10.0);
            }
        }
        let store = TemplateStore::from_map(map);
        let opts = BuildOptions {
            pseudo: false,
            fit_tf: true,
            param_vectors: false,
            ..BuildOptions::default()
        };
        let err = build_model(&store, &opts).unwrap_err();
        assert!(err.to_string().contains("initial QCD yield negative"));
    }
}
