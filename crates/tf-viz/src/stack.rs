//! Stacked-distribution artifact computation.
//!
//! One artifact per plot: data points, cumulative stack outlines for the
//! main panel, the pull-style residual panel, and all labels. The
//! renderer consumes the artifact without recomputing anything.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::warn;

use tf_core::binning::{BLIND_HI, BLIND_LO, PT_EDGES};
use tf_core::{Error, Histogram, Result};
use tf_store::HistStore;

use crate::style::{label_rank, lumi_for, series_label, RegionScheme};

/// QCD-like backgrounds subtracted in the residual panel, in draw order.
const MAJOR_BACKGROUNDS: [&str; 2] = ["qcd", "tqq"];
/// Electroweak stack, in draw order.
const VECTOR_STACK: [&str; 5] = ["zbb", "zcc", "zqq", "wcq", "wqq"];
/// Residual-panel stack draw order.
const RESIDUAL_STACK: [&str; 6] = ["hbb", "zbb", "zcc", "zqq", "wcq", "wqq"];
const HIGGS_SCALE: f64 = 500.0;

/// Plot-level switches.
#[derive(Debug, Clone)]
pub struct StackOptions {
    /// Observations are summed MC, not recorded data.
    pub pseudo: bool,
    /// Observations are post-fit toys.
    pub toys: bool,
    /// Blind the Higgs mass window (applies on real data only).
    pub mask: bool,
    /// Overlay Higgs scaled by 500 instead of stacking it.
    pub scale_higgs: bool,
    /// Use sqrt(N) data errors instead of stored variances.
    pub sqrt_n_err: bool,
    /// prefit / postfit / inputs, used in titles and file stems.
    pub fittype: String,
    pub year: String,
}

/// One drawable series: a cumulative outline, optionally filled down to
/// `y0`, optionally dashed.
#[derive(Debug, Clone, Serialize)]
pub struct StackSeries {
    pub sample: String,
    pub label: String,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y0: Option<Vec<f64>>,
    pub filled: bool,
    pub dashed: bool,
}

/// Legend entry, already ordered for display.
#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub key: String,
    pub label: String,
}

/// Everything the renderer needs for one stacked plot.
#[derive(Debug, Clone, Serialize)]
pub struct StackArtifact {
    /// File stem, e.g. `prefit_Charm` or `postfit_Passing3`.
    pub name: String,
    pub fittype: String,
    pub region_label: String,
    /// Annotation block lines drawn inside the main panel.
    pub annotation: Vec<String>,
    /// Header shows "Data" when true, "Simulation" otherwise.
    pub is_data: bool,
    pub year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lumi: Option<f64>,
    pub edges: Vec<f64>,
    pub data_label: String,
    /// NaN in the blinded window on masked real data.
    pub data_y: Vec<f64>,
    pub data_yerr_lo: Vec<f64>,
    pub data_yerr_hi: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_error_model: Option<String>,
    /// Bins where data points are drawn.
    pub plot_bins: Vec<bool>,
    pub stacks: Vec<StackSeries>,
    pub scaled_signals: Vec<StackSeries>,
    pub residual_y: Vec<f64>,
    pub residual_yerr: Vec<f64>,
    pub residual_stacks: Vec<StackSeries>,
    pub legend: Vec<LegendEntry>,
}

/// Intersects the nonzero-bin masks of every data series drawn on a
/// figure, so bins empty in any panel are hidden in all of them.
#[derive(Debug, Default, Clone)]
pub struct BinMask {
    bins: Option<Vec<bool>>,
}

impl BinMask {
    /// Fold in a series; all-zero series leave the mask unchanged.
    pub fn intersect(&mut self, y: &[f64]) {
        if !y.iter().any(|&v| v != 0.0 && !v.is_nan()) {
            return;
        }
        match &mut self.bins {
            None => self.bins = Some(y.iter().map(|&v| v != 0.0 && !v.is_nan()).collect()),
            Some(bins) => {
                for (m, &v) in bins.iter_mut().zip(y) {
                    *m = *m && v != 0.0 && !v.is_nan();
                }
            }
        }
    }

    /// Final mask; all-true when nothing constrained it.
    pub fn resolve(&self, nbins: usize) -> Vec<bool> {
        self.bins.clone().unwrap_or_else(|| vec![true; nbins])
    }
}

/// Pull error propagation for `(A - B) / C` with absolute errors
/// `a`, `b`, `c` on the three inputs. The denominator is floored so
/// empty bins stay finite.
pub fn prop_err(a_val: f64, b_val: f64, c_val: f64, a: f64, b: f64, c: f64) -> f64 {
    let e = c_val.powi(2) * (a.powi(2) + b.powi(2)) + c.powi(2) * (a_val - b_val).powi(2);
    (e / (c_val.powi(4) + 1e-10)).sqrt()
}

fn is_near_integer_nonneg(x: f64) -> Option<u64> {
    if !(x.is_finite() && x >= 0.0) {
        return None;
    }
    let r = x.round();
    if (x - r).abs() <= 1e-9 { Some(r as u64) } else { None }
}

fn garwood_68_interval(n: u64) -> (f64, f64) {
    let alpha = 0.31731_f64;
    let lo = if n == 0 {
        0.0
    } else {
        match ChiSquared::new(2.0 * (n as f64)) {
            Ok(dist) => (n as f64) - 0.5 * dist.inverse_cdf(alpha / 2.0),
            Err(_) => (n as f64).sqrt(),
        }
    };
    let hi = match ChiSquared::new(2.0 * ((n + 1) as f64)) {
        Ok(dist) => 0.5 * dist.inverse_cdf(1.0 - alpha / 2.0) - (n as f64),
        Err(_) => (n as f64).sqrt(),
    };
    (lo, hi)
}

/// Sum one sample across categories; `None` when any category lacks it.
fn summed<S: HistStore>(cats: &[(String, S)], sample: &str) -> Result<Option<Histogram>> {
    let mut total: Option<Histogram> = None;
    for (cat_name, store) in cats {
        let h = match store.get(sample) {
            Some(h) => h,
            None => return Ok(None),
        };
        match &mut total {
            None => total = Some(h.clone()),
            Some(t) => t.checked_add(h).map_err(|_| {
                Error::Validation(format!(
                    "sample '{sample}' in category '{cat_name}' is on a different bin grid"
                ))
            })?,
        }
    }
    Ok(total)
}

/// Build the artifact for one list of categories (one pt bin, or all of
/// them summed, or the muon control region).
pub fn stack_artifact<S: HistStore>(
    cats: &[(String, S)],
    opts: &StackOptions,
) -> Result<StackArtifact> {
    let first = cats
        .first()
        .ok_or_else(|| Error::Validation("no categories to plot".into()))?
        .0
        .clone();
    let scheme = RegionScheme::detect(&first)?;
    let region_label = scheme.region_label(&first).to_string();
    let muon = first.contains("muon");

    // samples present in every category; partial ones are dropped
    let mut counts: Vec<(String, usize)> = Vec::new();
    for (_, store) in cats {
        for name in store.names() {
            if name.contains("total") {
                continue;
            }
            match counts.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
    }
    let max_count = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    for (name, c) in counts.iter().filter(|(_, c)| *c != max_count) {
        warn!(sample = %name, present = c, categories = cats.len(),
              "sample partially missing, not plotted");
    }
    let avail: Vec<String> =
        counts.into_iter().filter(|(_, c)| *c == max_count).map(|(n, _)| n).collect();
    let has = |s: &str| avail.iter().any(|a| a == s);

    let data = summed(cats, "data_obs")?.ok_or_else(|| {
        Error::Validation(format!("data_obs missing from categories starting at '{first}'"))
    })?;
    let nbins = data.nbins();
    let edges = data.edges.clone();

    // symmetric data errors; Garwood intervals only when nothing better
    // is stored
    let (yerr_lo, yerr_hi, error_model) = if opts.sqrt_n_err {
        let e: Vec<f64> = data.values.iter().map(|&v| v.max(0.0).sqrt()).collect();
        (e.clone(), e, Some("sqrt_n".to_string()))
    } else if let Some(var) = &data.variances {
        let e: Vec<f64> = var.iter().map(|&v| v.max(0.0).sqrt()).collect();
        (e.clone(), e, Some("sum_variances".to_string()))
    } else {
        let mut lo = Vec::with_capacity(nbins);
        let mut hi = Vec::with_capacity(nbins);
        for &v in &data.values {
            match is_near_integer_nonneg(v) {
                Some(n) => {
                    let (l, h) = garwood_68_interval(n);
                    lo.push(l);
                    hi.push(h);
                }
                None => {
                    let e = if v > 0.0 { v.sqrt() } else { 0.0 };
                    lo.push(e);
                    hi.push(e);
                }
            }
        }
        (lo, hi, Some("garwood_poisson_68".to_string()))
    };
    let sigma: Vec<f64> =
        yerr_lo.iter().zip(yerr_hi.iter()).map(|(l, h)| 0.5 * (l + h)).collect();

    let mut mask = BinMask::default();
    mask.intersect(&data.values);

    // only the tagged signal regions carry a blind window; the untagged
    // region and the muon control region are always shown in full
    let signal_region =
        !muon && (first.contains("pass") || first.contains("pcc") || first.contains("pbb"));
    let blind = opts.mask && !opts.pseudo && signal_region;
    let blind_out = |mut y: Vec<f64>| -> Vec<f64> {
        if blind {
            for v in y.iter_mut().take(BLIND_HI).skip(BLIND_LO) {
                *v = f64::NAN;
            }
        }
        y
    };

    // main panel: qcd/tqq first, then the electroweak stack
    let mut stacks: Vec<StackSeries> = Vec::new();
    let mut legend_keys: Vec<String> = Vec::new();
    let mut push_stack = |out: &mut Vec<StackSeries>,
                          keys: &mut Vec<String>,
                          tot: &mut Option<Vec<f64>>,
                          sample: &str,
                          h: &Histogram,
                          scale: Option<&[f64]>| {
        let apply = |v: f64, i: usize| match scale {
            Some(s) if s[i] != 0.0 && s[i].is_finite() => v / s[i],
            Some(_) => f64::NAN,
            None => v,
        };
        let filled = sample == "hcc";
        let (y, y0) = match tot {
            None => {
                *tot = Some(h.values.clone());
                let y = h.values.iter().enumerate().map(|(i, &v)| apply(v, i)).collect();
                (y, if filled { Some(vec![0.0; h.nbins()]) } else { None })
            }
            Some(t) => {
                let y0: Vec<f64> = t.iter().enumerate().map(|(i, &v)| apply(v, i)).collect();
                for (a, b) in t.iter_mut().zip(h.values.iter()) {
                    *a += b;
                }
                let y = t.iter().enumerate().map(|(i, &v)| apply(v, i)).collect();
                (y, if filled { Some(y0) } else { None })
            }
        };
        if !keys.iter().any(|k| k == sample) {
            keys.push(sample.to_string());
        }
        out.push(StackSeries {
            sample: sample.to_string(),
            label: series_label(sample, opts.scale_higgs),
            y,
            y0,
            filled,
            dashed: false,
        });
    };

    let mut tot: Option<Vec<f64>> = None;
    for s in MAJOR_BACKGROUNDS {
        if !has(s) {
            continue;
        }
        if let Some(h) = summed(cats, s)? {
            push_stack(&mut stacks, &mut legend_keys, &mut tot, s, &h, None);
        }
    }
    let mut ew_samples: Vec<&str> = Vec::new();
    if !opts.scale_higgs {
        ew_samples.extend(["hcc", "hbb"]);
    }
    ew_samples.extend(VECTOR_STACK);
    let mut tot: Option<Vec<f64>> = None;
    for s in ew_samples {
        if !has(s) {
            continue;
        }
        if let Some(h) = summed(cats, s)? {
            push_stack(&mut stacks, &mut legend_keys, &mut tot, s, &h, None);
        }
    }

    let mut scaled_signals: Vec<StackSeries> = Vec::new();
    if opts.scale_higgs {
        for s in ["hcc", "hbb"] {
            if !has(s) {
                continue;
            }
            if let Some(h) = summed(cats, s)? {
                if !legend_keys.iter().any(|k| k == s) {
                    legend_keys.push(s.to_string());
                }
                scaled_signals.push(StackSeries {
                    sample: s.to_string(),
                    label: series_label(s, true),
                    y: h.values.iter().map(|&v| v * HIGGS_SCALE).collect(),
                    y0: None,
                    filled: false,
                    dashed: true,
                });
            }
        }
    }

    // residual panel: (data - major backgrounds) in units of the data error
    let mut residual_num = data.values.clone();
    for s in MAJOR_BACKGROUNDS {
        if !has(s) {
            continue;
        }
        if let Some(h) = summed(cats, s)? {
            for (r, v) in residual_num.iter_mut().zip(h.values.iter()) {
                *r -= v;
            }
        }
    }
    let residual_y: Vec<f64> = residual_num
        .iter()
        .zip(sigma.iter())
        .map(|(&n, &s)| {
            let r = n / s;
            if r.is_finite() { r } else { f64::NAN }
        })
        .collect();
    let residual_yerr: Vec<f64> = data
        .values
        .iter()
        .zip(residual_num.iter())
        .zip(sigma.iter())
        .map(|((&d, &n), &s)| {
            let bkg = d - n;
            prop_err(d, bkg, s, d.max(0.0).sqrt(), bkg.max(0.0).sqrt(), 1.0)
        })
        .collect();
    mask.intersect(&residual_y);

    let mut residual_stacks: Vec<StackSeries> = Vec::new();
    let mut res_samples: Vec<&str> = Vec::new();
    if !opts.scale_higgs {
        res_samples.extend(["hcc", "hbb"]);
    }
    res_samples.extend(RESIDUAL_STACK);
    let mut tot: Option<Vec<f64>> = None;
    for s in res_samples {
        if !has(s) || residual_stacks.iter().any(|r| r.sample == s) {
            continue;
        }
        if let Some(h) = summed(cats, s)? {
            push_stack(&mut residual_stacks, &mut legend_keys, &mut tot, s, &h, Some(&sigma));
        }
    }
    if opts.scale_higgs && has("hcc") {
        if let Some(h) = summed(cats, "hcc")? {
            residual_stacks.push(StackSeries {
                sample: "hcc".to_string(),
                label: series_label("hcc", true),
                y: h.values
                    .iter()
                    .zip(sigma.iter())
                    .map(|(&v, &s)| {
                        let r = v * HIGGS_SCALE / s;
                        if r.is_finite() { r } else { f64::NAN }
                    })
                    .collect(),
                y0: None,
                filled: false,
                dashed: true,
            });
        }
    }

    // labels
    let ipt = first
        .split("ptbin")
        .nth(1)
        .and_then(|rest| rest.chars().next())
        .and_then(|c| c.to_digit(10))
        .map(|d| d as usize)
        .unwrap_or(0);
    let pt_range = if cats.len() == 1 && !muon && first.contains("ptbin") {
        format!("{} < pT < {} GeV", PT_EDGES[ipt], PT_EDGES[ipt + 1])
    } else {
        format!("{} < pT < {} GeV", PT_EDGES[0], PT_EDGES[PT_EDGES.len() - 1])
    };
    let tagger = if muon { "DeepDoubleX, MuonCR".to_string() } else { "DeepDoubleX".to_string() };
    let annotation = vec![pt_range, tagger, format!("{region_label} Region")];

    let data_key = if opts.toys {
        "Toys"
    } else if opts.pseudo {
        "MC"
    } else {
        "Data"
    };
    legend_keys.push(data_key.to_string());
    legend_keys.sort_by_key(|k| label_rank(k));
    legend_keys.dedup();
    let legend = legend_keys
        .into_iter()
        .map(|key| LegendEntry { label: series_label(&key, opts.scale_higgs), key })
        .collect();

    let suffix = if muon {
        "MuonCR".to_string()
    } else if cats.len() == 1 {
        ipt.to_string()
    } else {
        String::new()
    };
    let lumi = lumi_for(&opts.year, muon);
    if lumi.is_none() {
        warn!(year = %opts.year, "no luminosity entry for year, header omits it");
    }

    Ok(StackArtifact {
        name: format!("{}_{}{}", opts.fittype, region_label, suffix),
        fittype: opts.fittype.clone(),
        region_label,
        annotation,
        is_data: !opts.pseudo || opts.toys,
        year: opts.year.clone(),
        lumi,
        edges,
        data_label: series_label(data_key, opts.scale_higgs),
        data_y: blind_out(data.values.clone()),
        data_yerr_lo: yerr_lo,
        data_yerr_hi: yerr_hi,
        data_error_model: error_model,
        plot_bins: mask.resolve(nbins),
        stacks,
        scaled_signals,
        residual_y: blind_out(residual_y),
        residual_yerr,
        residual_stacks,
        legend,
    })
}
