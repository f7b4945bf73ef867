//! Auxiliary MC transfer-factor fit.
//!
//! Fits a Bernstein surface to the per-bin MC QCD pass/fail ratio before
//! the data fit, so the data-residual surface only has to absorb what MC
//! does not describe. The expectation is linear in the Bernstein
//! coefficients, so the fit is a weighted linear least-squares solve.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::info;

use tf_core::{Error, Histogram, Result};

use crate::bernstein::{AnalysisGrid, BernsteinPoly};

/// Orthogonalizing transform for the fitted surface coefficients.
///
/// Columns of `transform` are eigenvectors of the coefficient covariance
/// scaled by the square root of their eigenvalues, so uncorrelated
/// unit-normal fit parameters map onto correlated coefficient shifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoTransform {
    pub param_names: Vec<String>,
    pub transform: Vec<Vec<f64>>,
}

/// Outcome of the MC transfer-factor fit.
#[derive(Debug, Clone)]
pub struct McTfResult {
    /// Fitted Bernstein coefficients, row-major (pt, rho).
    pub coefficients: Vec<f64>,
    /// Fitted surface value per (pt bin, mass bin), without the overall
    /// QCD efficiency factor.
    pub surface: Vec<Vec<f64>>,
    pub deco: DecoTransform,
}

/// Fit `poly` so that `qcdeff * surface * pass_qcd` matches `fail_qcd`
/// over the valid cells of the grid.
///
/// `fail_qcd` and `pass_qcd` hold one histogram per pt bin; here "fail"
/// is the high-statistics pqq region the surface multiplies and
/// "pass" the pbb (or pcc) region being predicted.
pub fn fit(
    poly: &BernsteinPoly,
    fail_qcd: &[Histogram],
    pass_qcd: &[Histogram],
    grid: &AnalysisGrid,
    qcdeff: f64,
) -> Result<McTfResult> {
    let npt = grid.ptscaled.len();
    if fail_qcd.len() != npt || pass_qcd.len() != npt {
        return Err(Error::Validation(format!(
            "MC TF fit expects {npt} pt bins, got {} fail / {} pass",
            fail_qcd.len(),
            pass_qcd.len()
        )));
    }
    let nparams = poly.nparams();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut targets: Vec<f64> = Vec::new();
    for i in 0..npt {
        for j in 0..grid.rhoscaled[i].len() {
            if !grid.validbins[i][j] {
                continue;
            }
            let fail = fail_qcd[i].values[j];
            let pass = pass_qcd[i].values[j];
            // Poisson weight on the predicted region
            let w = (1.0 / pass.max(1.0)).sqrt();
            let basis = poly.basis_row(grid.ptscaled[i], grid.rhoscaled[i][j]);
            rows.push(basis.iter().map(|b| w * qcdeff * fail * b).collect());
            targets.push(w * pass);
        }
    }
    if rows.len() < nparams {
        return Err(Error::Computation(format!(
            "MC TF fit has {} valid cells for {} coefficients",
            rows.len(),
            nparams
        )));
    }

    let a = DMatrix::from_fn(rows.len(), nparams, |r, c| rows[r][c]);
    let y = DVector::from_vec(targets);
    let svd = a.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let rank = svd.singular_values.iter().filter(|&&s| s > 1e-10 * max_sv).count();
    if rank < nparams {
        return Err(Error::Computation(format!(
            "MC TF fit is rank deficient: rank {rank} of {nparams} coefficients \
             (singular values {:?})",
            svd.singular_values.as_slice()
        )));
    }
    let theta = svd
        .solve(&y, 1e-10 * max_sv)
        .map_err(|e| Error::Computation(format!("MC TF least-squares solve failed: {e}")))?;

    let (lo, hi) = poly.limits;
    if theta.iter().any(|&t| t < lo || t > hi) {
        return Err(Error::Computation(format!(
            "MC TF coefficients escaped limits ({lo}, {hi}): {:?}",
            theta.as_slice()
        )));
    }

    let normal = a.transpose() * &a;
    let cov = normal.try_inverse().ok_or_else(|| {
        Error::Computation("MC TF coefficient covariance is singular".into())
    })?;
    let deco = decorrelate(&cov, poly.param_names());

    let surface = (0..npt)
        .map(|i| {
            (0..grid.rhoscaled[i].len())
                .map(|j| {
                    let basis = poly.basis_row(grid.ptscaled[i], grid.rhoscaled[i][j]);
                    basis.iter().zip(theta.iter()).map(|(b, t)| b * t).sum()
                })
                .collect()
        })
        .collect();

    info!(
        surface = %poly.name,
        cells = rows.len(),
        coefficients = ?theta.as_slice(),
        "fitted MC transfer-factor surface"
    );
    Ok(McTfResult { coefficients: theta.as_slice().to_vec(), surface, deco })
}

/// Eigendecompose a covariance into an orthogonal shift basis.
fn decorrelate(cov: &DMatrix<f64>, param_names: Vec<String>) -> DecoTransform {
    let eig = cov.clone().symmetric_eigen();
    let n = cov.nrows();
    let mut transform = vec![vec![0.0; n]; n];
    for (r, row) in transform.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = eig.eigenvectors[(r, c)] * eig.eigenvalues[c].max(0.0).sqrt();
        }
    }
    DecoTransform { param_names, transform }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_hists(value: f64, npt: usize, nbins: usize) -> Vec<Histogram> {
        let edges: Vec<f64> = (0..=nbins).map(|i| 40.0 + 7.0 * i as f64).collect();
        (0..npt)
            .map(|_| Histogram::new(vec![value; nbins], edges.clone(), "msd", None).unwrap())
            .collect()
    }

    #[test]
    fn flat_ratio_fits_flat_surface() {
        let grid = AnalysisGrid::analysis();
        let nbins = grid.rhoscaled[0].len();
        let npt = grid.ptscaled.len();
        let qcdeff = 0.02;
        let fail = flat_hists(50_000.0, npt, nbins);
        let pass = flat_hists(50_000.0 * qcdeff, npt, nbins);
        let poly = BernsteinPoly::new("tf_MCtempl", (2, 2), (-50.0, 50.0));
        let res = fit(&poly, &fail, &pass, &grid, qcdeff).unwrap();
        for row in &res.surface {
            for &v in row {
                assert!((v - 1.0).abs() < 1e-6, "surface value {v}");
            }
        }
    }

    #[test]
    fn pt_bin_mismatch_is_rejected() {
        let grid = AnalysisGrid::analysis();
        let nbins = grid.rhoscaled[0].len();
        let poly = BernsteinPoly::new("tf", (2, 2), (-50.0, 50.0));
        let fail = flat_hists(1.0, 3, nbins);
        let pass = flat_hists(1.0, 3, nbins);
        assert!(fit(&poly, &fail, &pass, &grid, 1.0).is_err());
    }

    #[test]
    fn deco_transform_is_square_and_finite() {
        let grid = AnalysisGrid::analysis();
        let nbins = grid.rhoscaled[0].len();
        let npt = grid.ptscaled.len();
        let fail = flat_hists(10_000.0, npt, nbins);
        let pass = flat_hists(200.0, npt, nbins);
        let poly = BernsteinPoly::new("tf", (2, 2), (-50.0, 50.0));
        let res = fit(&poly, &fail, &pass, &grid, 0.02).unwrap();
        assert_eq!(res.deco.transform.len(), poly.nparams());
        for row in &res.deco.transform {
            assert_eq!(row.len(), poly.nparams());
            assert!(row.iter().all(|v| v.is_finite()));
        }
        assert_eq!(res.deco.param_names.len(), poly.nparams());
    }
}
