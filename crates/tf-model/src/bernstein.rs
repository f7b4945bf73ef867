//! 2D Bernstein polynomial surfaces over the scaled (pt, rho) plane.

use tf_core::binning::{msd_centers, N_MSD, N_PT, PT_EDGES, RHO_MAX, RHO_MIN};

/// A Bernstein polynomial surface of order (n_pt, n_rho).
///
/// The basis partitions unity, so all coefficients at 1 give a flat
/// surface of 1 everywhere.
#[derive(Debug, Clone)]
pub struct BernsteinPoly {
    pub name: String,
    pub order: (usize, usize),
    /// Allowed coefficient range handed to the fitter.
    pub limits: (f64, f64),
}

impl BernsteinPoly {
    pub fn new(name: impl Into<String>, order: (usize, usize), limits: (f64, f64)) -> Self {
        Self { name: name.into(), order, limits }
    }

    /// Number of coefficients, `(n_pt + 1) * (n_rho + 1)`.
    pub fn nparams(&self) -> usize {
        (self.order.0 + 1) * (self.order.1 + 1)
    }

    /// Coefficient names in row-major (pt, rho) order.
    pub fn param_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.nparams());
        for i in 0..=self.order.0 {
            for j in 0..=self.order.1 {
                names.push(format!("{}_pt{}_rho{}", self.name, i, j));
            }
        }
        names
    }

    /// Basis values at one scaled point, parallel to [`param_names`].
    ///
    /// [`param_names`]: BernsteinPoly::param_names
    pub fn basis_row(&self, ptscaled: f64, rhoscaled: f64) -> Vec<f64> {
        let bpt = bernstein_basis(self.order.0, ptscaled);
        let brho = bernstein_basis(self.order.1, rhoscaled);
        let mut row = Vec::with_capacity(self.nparams());
        for &p in &bpt {
            for &r in &brho {
                row.push(p * r);
            }
        }
        row
    }
}

/// Univariate Bernstein basis of degree `n` at `x`.
fn bernstein_basis(n: usize, x: f64) -> Vec<f64> {
    (0..=n)
        .map(|k| binomial(n, k) * x.powi(k as i32) * (1.0 - x).powi((n - k) as i32))
        .collect()
}

fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    let mut acc = 1.0;
    for i in 0..k {
        acc = acc * (n - i) as f64 / (i + 1) as f64;
    }
    acc
}

/// The (pt, rho) sample points and fit-validity mask of the analysis
/// binning.
///
/// One pt sample point per pt bin at 30% of the bin width, one rho point
/// per (pt bin, mass bin) at the mass bin center. Points with rho outside
/// [RHO_MIN, RHO_MAX] scale out of [0, 1]; those are pinned to 1 and
/// masked out of the fit.
#[derive(Debug, Clone)]
pub struct AnalysisGrid {
    /// Scaled pt per pt bin, in [0, 1].
    pub ptscaled: Vec<f64>,
    /// Scaled rho per (pt bin, mass bin).
    pub rhoscaled: Vec<Vec<f64>>,
    /// True where the (pt, mass) cell lies inside the rho window.
    pub validbins: Vec<Vec<bool>>,
}

impl AnalysisGrid {
    pub fn analysis() -> Self {
        let pt_lo = PT_EDGES[0];
        let pt_hi = PT_EDGES[N_PT];
        let centers = msd_centers();
        let mut ptscaled = Vec::with_capacity(N_PT);
        let mut rhoscaled = Vec::with_capacity(N_PT);
        let mut validbins = Vec::with_capacity(N_PT);
        for i in 0..N_PT {
            let pt = PT_EDGES[i] + 0.3 * (PT_EDGES[i + 1] - PT_EDGES[i]);
            ptscaled.push((pt - pt_lo) / (pt_hi - pt_lo));
            let mut row = Vec::with_capacity(N_MSD);
            let mut valid = Vec::with_capacity(N_MSD);
            for &msd in &centers {
                let rho = 2.0 * (msd / pt).ln();
                let scaled = (rho - RHO_MIN) / (RHO_MAX - RHO_MIN);
                let ok = (0.0..=1.0).contains(&scaled);
                row.push(if ok { scaled } else { 1.0 });
                valid.push(ok);
            }
            rhoscaled.push(row);
            validbins.push(valid);
        }
        Self { ptscaled, rhoscaled, validbins }
    }
}
