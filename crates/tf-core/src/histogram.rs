//! Binned histogram type used across the store, model, and plotting crates.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A 1D binned histogram: values plus explicit bin edges.
///
/// Invariants enforced at construction: `edges.len() == values.len() + 1`,
/// edges strictly increasing, `variances` (when present) parallel to `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin contents (length = n_bins).
    pub values: Vec<f64>,
    /// Bin edges (length = n_bins + 1).
    pub edges: Vec<f64>,
    /// Observable label (e.g. "msd").
    pub axis: String,
    /// Per-bin sum of weights squared, if stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variances: Option<Vec<f64>>,
}

impl Histogram {
    /// Build a histogram, validating the edge grid.
    pub fn new(
        values: Vec<f64>,
        edges: Vec<f64>,
        axis: impl Into<String>,
        variances: Option<Vec<f64>>,
    ) -> Result<Self> {
        if edges.len() != values.len() + 1 {
            return Err(Error::Validation(format!(
                "edge count {} does not match {} bins + 1",
                edges.len(),
                values.len()
            )));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation("bin edges must be strictly increasing".into()));
        }
        if let Some(v) = &variances {
            if v.len() != values.len() {
                return Err(Error::Validation(format!(
                    "variance count {} does not match {} bins",
                    v.len(),
                    values.len()
                )));
            }
        }
        Ok(Self { values, edges, axis: axis.into(), variances })
    }

    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.values.len()
    }

    /// Total yield.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// All-zero histogram on the same edge grid (variances dropped).
    pub fn zeros_like(other: &Histogram) -> Self {
        Self {
            values: vec![0.0; other.nbins()],
            edges: other.edges.clone(),
            axis: other.axis.clone(),
            variances: None,
        }
    }

    /// True if `other` shares this histogram's edge grid exactly.
    pub fn same_edges(&self, other: &Histogram) -> bool {
        self.edges == other.edges
    }

    /// Elementwise in-place sum. The edge grids must match exactly.
    ///
    /// Variances accumulate when both operands carry them; otherwise the
    /// result carries none (sqrt(N) errors apply downstream).
    pub fn checked_add(&mut self, other: &Histogram) -> Result<()> {
        if !self.same_edges(other) {
            return Err(Error::Validation(format!(
                "cannot sum histograms with different edge grids ({} vs {} edges)",
                self.edges.len(),
                other.edges.len()
            )));
        }
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += b;
        }
        self.variances = match (self.variances.take(), other.variances.as_ref()) {
            (Some(mut va), Some(vb)) => {
                for (a, b) in va.iter_mut().zip(vb.iter()) {
                    *a += b;
                }
                Some(va)
            }
            _ => None,
        };
        Ok(())
    }

    /// Bin centers.
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }
}
