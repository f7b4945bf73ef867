//! Analysis binning: jet pt bins, soft-drop mass grid, rho validity window.

/// Jet pt bin edges in GeV.
pub const PT_EDGES: [f64; 7] = [450.0, 500.0, 550.0, 600.0, 675.0, 800.0, 1200.0];

/// Number of pt bins.
pub const N_PT: usize = PT_EDGES.len() - 1;

/// Lower edge of the soft-drop mass grid in GeV.
pub const MSD_MIN: f64 = 40.0;
/// Upper edge of the soft-drop mass grid in GeV.
pub const MSD_MAX: f64 = 201.0;
/// Number of soft-drop mass bins.
pub const N_MSD: usize = 23;

/// Rho validity window; bins outside are masked out of the fit.
pub const RHO_MIN: f64 = -6.0;
/// Upper end of the rho validity window.
pub const RHO_MAX: f64 = -2.1;

/// Half-open index range of mass bins blinded when fitting real data.
pub const BLIND_LO: usize = 10;
/// Exclusive upper index of the blinded window.
pub const BLIND_HI: usize = 14;

/// Soft-drop mass bin edges (N_MSD + 1 values, uniform 7 GeV bins).
pub fn msd_edges() -> Vec<f64> {
    let step = (MSD_MAX - MSD_MIN) / N_MSD as f64;
    (0..=N_MSD).map(|i| MSD_MIN + step * i as f64).collect()
}

/// Soft-drop mass bin centers.
pub fn msd_centers() -> Vec<f64> {
    let edges = msd_edges();
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}
