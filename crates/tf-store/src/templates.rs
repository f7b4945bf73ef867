//! Template naming and lookup with the missing-template fallback.

use tracing::warn;

use tf_core::{Error, Histogram, Result};

use crate::store::HistStore;

/// Identifies one template in a flat store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateKey {
    /// Process name, e.g. "qcd", "zcc", "hcc".
    pub sample: String,
    /// Region name, e.g. "pqq", "pcc", "pbb", "pass", "fail".
    pub region: String,
    /// Zero-based pt bin index.
    pub ptbin: usize,
    /// Systematic variation suffix, e.g. "JESUp". `None` selects the nominal.
    pub syst: Option<String>,
    /// Select the matched component of V/H samples (nominal only).
    pub matched: bool,
}

/// Samples that carry a matched component.
const MATCHED_SAMPLES: [&str; 7] = ["wqq", "wcq", "zbb", "zcc", "zqq", "hqq", "hcc"];

impl TemplateKey {
    /// Nominal, unmatched key.
    pub fn new(region: impl Into<String>, sample: impl Into<String>, ptbin: usize) -> Self {
        Self {
            sample: sample.into(),
            region: region.into(),
            ptbin,
            syst: None,
            matched: false,
        }
    }

    /// Same key with a systematic suffix.
    pub fn with_syst(mut self, syst: impl Into<String>) -> Self {
        self.syst = Some(syst.into());
        self
    }

    /// Same key selecting the matched component.
    pub fn with_matched(mut self, matched: bool) -> Self {
        self.matched = matched;
        self
    }

    /// Store name for this key.
    ///
    /// Higgs samples carry a mass tag. The matched suffix only applies to
    /// nominal V/H templates; systematic variations are stored unmatched.
    pub fn name(&self) -> String {
        let mass = if self.sample == "hcc" || self.sample == "hqq" { "125" } else { "" };
        let mut name = format!("{}{}_{}", self.sample, mass, self.region);
        if let Some(syst) = &self.syst {
            name.push('_');
            name.push_str(syst);
        } else if self.matched && MATCHED_SAMPLES.contains(&self.sample.as_str()) {
            name.push_str("_matchedUp");
        }
        name.push_str(&format!("_bin{}", self.ptbin));
        name
    }
}

/// Outcome of a template lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateLookup {
    /// Template present in the store.
    Found(Histogram),
    /// Template absent; an all-zero histogram was substituted on the grid
    /// of the previous pt bin's template.
    MissingSubstituted(Histogram),
}

impl TemplateLookup {
    /// The histogram, found or substituted.
    pub fn into_histogram(self) -> Histogram {
        match self {
            TemplateLookup::Found(h) | TemplateLookup::MissingSubstituted(h) => h,
        }
    }

    /// The histogram, found or substituted.
    pub fn histogram(&self) -> &Histogram {
        match self {
            TemplateLookup::Found(h) | TemplateLookup::MissingSubstituted(h) => h,
        }
    }

    /// True when the store actually held this template.
    pub fn is_found(&self) -> bool {
        matches!(self, TemplateLookup::Found(_))
    }
}

/// Fetch a template, substituting an all-zero histogram when it is absent.
///
/// The substitute borrows its bin grid from the same key one pt bin lower,
/// which a sparse high-pt sample always has populated first. A key missing
/// in pt bin 0 is an input error.
pub fn lookup(store: &impl HistStore, key: &TemplateKey) -> Result<TemplateLookup> {
    let name = key.name();
    if let Some(h) = store.get(&name) {
        return Ok(TemplateLookup::Found(h.clone()));
    }
    if key.ptbin == 0 {
        return Err(Error::Validation(format!(
            "template '{name}' is missing and has no lower pt bin to borrow a grid from"
        )));
    }
    let prev = TemplateKey { ptbin: key.ptbin - 1, ..key.clone() };
    let prev_name = prev.name();
    let donor = store.get(&prev_name).ok_or_else(|| {
        Error::Validation(format!(
            "template '{name}' is missing and so is '{prev_name}'"
        ))
    })?;
    warn!(template = %name, grid_from = %prev_name, "missing template, substituting zeros");
    Ok(TemplateLookup::MissingSubstituted(Histogram::zeros_like(donor)))
}

/// Like [`lookup`] but guarantees the result carries per-bin variances,
/// filling zeros when the stored template has none.
pub fn lookup_with_sumw2(store: &impl HistStore, key: &TemplateKey) -> Result<TemplateLookup> {
    let looked = lookup(store, key)?;
    let fill = |mut h: Histogram| {
        if h.variances.is_none() {
            h.variances = Some(vec![0.0; h.nbins()]);
        }
        h
    };
    Ok(match looked {
        TemplateLookup::Found(h) => TemplateLookup::Found(fill(h)),
        TemplateLookup::MissingSubstituted(h) => TemplateLookup::MissingSubstituted(fill(h)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TemplateStore;
    use std::collections::BTreeMap;

    fn store_with(names: &[&str]) -> TemplateStore {
        let mut map = BTreeMap::new();
        for name in names {
            map.insert(
                name.to_string(),
                Histogram::new(vec![1.0, 2.0], vec![0.0, 1.0, 2.0], "msd", None).unwrap(),
            );
        }
        TemplateStore::from_map(map)
    }

    #[test]
    fn nominal_names() {
        assert_eq!(TemplateKey::new("pqq", "qcd", 0).name(), "qcd_pqq_bin0");
        assert_eq!(TemplateKey::new("pcc", "zcc", 3).name(), "zcc_pcc_bin3");
    }

    #[test]
    fn higgs_names_carry_mass_tag() {
        assert_eq!(TemplateKey::new("pbb", "hqq", 1).name(), "hqq125_pbb_bin1");
        assert_eq!(TemplateKey::new("pcc", "hcc", 5).name(), "hcc125_pcc_bin5");
    }

    #[test]
    fn syst_suffix_precedes_bin() {
        let key = TemplateKey::new("pqq", "wqq", 2).with_syst("JESUp");
        assert_eq!(key.name(), "wqq_pqq_JESUp_bin2");
    }

    #[test]
    fn matched_applies_to_nominal_vh_only() {
        let key = TemplateKey::new("pcc", "zcc", 2).with_matched(true);
        assert_eq!(key.name(), "zcc_pcc_matchedUp_bin2");
        let syst = TemplateKey::new("pcc", "zcc", 2).with_matched(true).with_syst("JESUp");
        assert_eq!(syst.name(), "zcc_pcc_JESUp_bin2");
        let qcd = TemplateKey::new("pcc", "qcd", 2).with_matched(true);
        assert_eq!(qcd.name(), "qcd_pcc_bin2");
    }

    #[test]
    fn missing_template_borrows_previous_grid() {
        let store = store_with(&["tqq_pqq_bin4"]);
        let looked = lookup(&store, &TemplateKey::new("pqq", "tqq", 5)).unwrap();
        assert!(!looked.is_found());
        let h = looked.into_histogram();
        assert_eq!(h.edges, vec![0.0, 1.0, 2.0]);
        assert!(h.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn missing_in_bin_zero_is_an_error() {
        let store = store_with(&[]);
        assert!(lookup(&store, &TemplateKey::new("pqq", "tqq", 0)).is_err());
    }

    #[test]
    fn lookup_with_sumw2_fills_zero_variances() {
        let store = store_with(&["qcd_pqq_bin0"]);
        let looked = lookup_with_sumw2(&store, &TemplateKey::new("pqq", "qcd", 0)).unwrap();
        assert_eq!(looked.histogram().variances, Some(vec![0.0, 0.0]));
    }
}
