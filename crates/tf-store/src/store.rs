//! Histogram stores backed by JSON documents.
//!
//! Two layouts are supported. A [`TemplateStore`] is a flat map from a
//! template name to a histogram, used by the model builder. A
//! [`ShapeStore`] groups histograms by category (one namespace per
//! pt-bin/region pair) and is the input to the plotting path.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tf_core::{Error, Histogram, Result};

/// Read access to named histograms within a single namespace.
pub trait HistStore {
    /// Fetch a histogram by name, or `None` when absent.
    fn get(&self, name: &str) -> Option<&Histogram>;

    /// Names present, sorted.
    fn names(&self) -> Vec<String>;
}

/// Flat name-to-histogram store.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    hists: BTreeMap<String, Histogram>,
}

impl TemplateStore {
    /// Load a flat store from a JSON file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let hists: BTreeMap<String, Histogram> = serde_json::from_reader(BufReader::new(file))?;
        for (name, h) in &hists {
            validate(name, h)?;
        }
        Ok(Self { hists })
    }

    /// Build a store from already-validated histograms. Used in tests and
    /// by the pseudo-data path.
    pub fn from_map(hists: BTreeMap<String, Histogram>) -> Self {
        Self { hists }
    }

    /// Number of histograms held.
    pub fn len(&self) -> usize {
        self.hists.len()
    }

    /// True if the store holds no histograms.
    pub fn is_empty(&self) -> bool {
        self.hists.is_empty()
    }
}

impl HistStore for TemplateStore {
    fn get(&self, name: &str) -> Option<&Histogram> {
        self.hists.get(name)
    }

    fn names(&self) -> Vec<String> {
        self.hists.keys().cloned().collect()
    }
}

/// Category-grouped store: category name -> sample name -> histogram.
#[derive(Debug, Clone)]
pub struct ShapeStore {
    categories: BTreeMap<String, BTreeMap<String, Histogram>>,
}

impl ShapeStore {
    /// Load a nested store from a JSON file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let categories: BTreeMap<String, BTreeMap<String, Histogram>> =
            serde_json::from_reader(BufReader::new(file))?;
        for (cat, samples) in &categories {
            for (name, h) in samples {
                validate(&format!("{cat}/{name}"), h)?;
            }
        }
        Ok(Self { categories })
    }

    /// Category names present, sorted.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    /// Resolve one category. Failure reports the keys that do exist so a
    /// typo in a fit-type or region name is obvious from the message.
    pub fn category(&self, key: &str) -> Result<CategoryView<'_>> {
        match self.categories.get(key) {
            Some(samples) => Ok(CategoryView { samples }),
            None => Err(Error::MissingNamespace {
                key: key.to_string(),
                available: self.category_names(),
            }),
        }
    }
}

/// Borrowed view of one category's histograms.
#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a> {
    samples: &'a BTreeMap<String, Histogram>,
}

impl HistStore for CategoryView<'_> {
    fn get(&self, name: &str) -> Option<&Histogram> {
        self.samples.get(name)
    }

    fn names(&self) -> Vec<String> {
        self.samples.keys().cloned().collect()
    }
}

fn validate(name: &str, h: &Histogram) -> Result<()> {
    if h.edges.len() != h.values.len() + 1 {
        return Err(Error::Validation(format!(
            "histogram '{name}': edge count {} does not match {} bins + 1",
            h.edges.len(),
            h.values.len()
        )));
    }
    if h.edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::Validation(format!(
            "histogram '{name}': bin edges must be strictly increasing"
        )));
    }
    if let Some(v) = &h.variances {
        if v.len() != h.values.len() {
            return Err(Error::Validation(format!(
                "histogram '{name}': variance count {} does not match {} bins",
                v.len(),
                h.values.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_hist() -> serde_json::Value {
        serde_json::json!({
            "values": [1.0, 2.0, 3.0],
            "edges": [0.0, 1.0, 2.0, 3.0],
            "axis": "msd"
        })
    }

    #[test]
    fn flat_store_roundtrip() {
        let doc = serde_json::json!({ "qcd_pass_bin0": sample_hist() });
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{doc}").unwrap();
        let store = TemplateStore::open(f.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("qcd_pass_bin0").unwrap().sum(), 6.0);
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn flat_store_rejects_bad_grid() {
        let doc = serde_json::json!({
            "bad": { "values": [1.0, 2.0], "edges": [0.0, 1.0], "axis": "msd" }
        });
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{doc}").unwrap();
        assert!(TemplateStore::open(f.path()).is_err());
    }

    #[test]
    fn missing_category_lists_available_keys() {
        let doc = serde_json::json!({
            "ptbin0pqq_prefit": { "qcd": sample_hist() },
            "ptbin0pcc_prefit": { "qcd": sample_hist() }
        });
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{doc}").unwrap();
        let store = ShapeStore::open(f.path()).unwrap();
        let err = store.category("ptbin9pqq_prefit").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ptbin9pqq_prefit"));
        assert!(msg.contains("ptbin0pqq_prefit"));
        assert!(msg.contains("ptbin0pcc_prefit"));
    }

    #[test]
    fn category_view_gets_samples() {
        let doc = serde_json::json!({
            "ptbin1pbb_fit_s": { "qcd": sample_hist(), "tqq": sample_hist() }
        });
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{doc}").unwrap();
        let store = ShapeStore::open(f.path()).unwrap();
        let cat = store.category("ptbin1pbb_fit_s").unwrap();
        assert_eq!(cat.names(), vec!["qcd".to_string(), "tqq".to_string()]);
        assert!(cat.get("tqq").is_some());
    }
}
