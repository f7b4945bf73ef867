//! Template sums and pseudo-data synthesis.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Poisson};
use tracing::debug;

use tf_core::{Error, Histogram, Result};

use crate::store::HistStore;
use crate::templates::{lookup, TemplateKey};

/// Sum the named samples' templates for one region/pt bin.
///
/// Missing templates substitute zeros per [`lookup`]; all contributing
/// histograms must share one edge grid.
pub fn sum_templates(
    store: &impl HistStore,
    region: &str,
    ptbin: usize,
    samples: &[&str],
    matched: bool,
) -> Result<Histogram> {
    let mut iter = samples.iter();
    let first = iter.next().ok_or_else(|| {
        Error::Validation("cannot sum an empty sample list".into())
    })?;
    let key = |s: &str| TemplateKey::new(region, s, ptbin).with_matched(matched);
    let mut total = lookup(store, &key(*first))?.into_histogram();
    for sample in iter {
        let h = lookup(store, &key(sample))?.into_histogram();
        total.checked_add(&h)?;
    }
    Ok(total)
}

/// Synthesize pseudo-data for one region/pt bin by summing the given
/// samples and optionally Poisson-fluctuating each bin.
///
/// Duplicate sample names are collapsed so no process is double counted.
/// Every summed bin must be finite and non-negative before sampling; a
/// negative expectation is an input error, not something to clamp.
pub fn pseudo_data(
    store: &impl HistStore,
    region: &str,
    ptbin: usize,
    samples: &[&str],
    matched: bool,
    throw_poisson: bool,
    rng: &mut StdRng,
) -> Result<Histogram> {
    let mut unique: Vec<&str> = Vec::with_capacity(samples.len());
    for s in samples {
        if !unique.contains(s) {
            unique.push(s);
        }
    }
    let mut total = sum_templates(store, region, ptbin, &unique, matched)?;
    for (i, v) in total.values.iter().enumerate() {
        if !v.is_finite() || *v < 0.0 {
            return Err(Error::Validation(format!(
                "pseudo-data expectation in {region} bin{ptbin}, mass bin {i} is {v}; \
                 expectations must be finite and non-negative"
            )));
        }
    }
    if throw_poisson {
        for v in total.values.iter_mut() {
            *v = sample_poisson(rng, *v);
        }
        total.variances = None;
    }
    debug!(
        region,
        ptbin,
        yield_ = total.sum(),
        poisson = throw_poisson,
        "synthesized pseudo-data"
    );
    Ok(total)
}

fn sample_poisson(rng: &mut StdRng, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 0.0;
    }
    match Poisson::new(lambda) {
        Ok(dist) => dist.sample(rng),
        // Poisson::new only fails for non-finite or non-positive lambda,
        // both excluded above.
        Err(_) => 0.0,
    }
}
