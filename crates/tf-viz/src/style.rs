//! Labels, legend ordering, and luminosity bookkeeping.

use tf_core::{Error, Result};

/// Which region naming convention a shapes file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionScheme {
    /// pass / fail
    PassFail,
    /// pqq / pcc / pbb
    ThreeRegion,
}

impl RegionScheme {
    /// Detect the scheme from a category name.
    pub fn detect(category: &str) -> Result<Self> {
        if category.contains("pass") || category.contains("fail") {
            Ok(RegionScheme::PassFail)
        } else if category.contains("pqq") || category.contains("pcc") || category.contains("pbb")
        {
            Ok(RegionScheme::ThreeRegion)
        } else {
            Err(Error::Validation(format!(
                "cannot determine region scheme from category '{category}'"
            )))
        }
    }

    /// Human label for the region a category belongs to.
    pub fn region_label(&self, category: &str) -> &'static str {
        match self {
            RegionScheme::PassFail => {
                if category.contains("pass") {
                    "Passing"
                } else {
                    "Failing"
                }
            }
            RegionScheme::ThreeRegion => {
                if category.contains("pqq") {
                    "Light"
                } else if category.contains("pcc") {
                    "Charm"
                } else {
                    "Bottom"
                }
            }
        }
    }
}

/// Legend label order; entries not listed sort last.
const LABEL_ORDER: [&str; 13] = [
    "Data", "MC", "Toys", "zbb", "zcc", "zqq", "wcq", "wqq", "hbb", "hqq", "hcc", "qcd", "tqq",
];

/// Display label for a series key.
pub fn series_label(key: &str, scale_higgs: bool) -> String {
    let base = match key {
        "Data" => "Data",
        "MC" => "MC",
        "Toys" => "PostFit Toys",
        "zbb" => "Z(bb)",
        "zcc" => "Z(cc)",
        "zqq" => "Z(qq)",
        "wcq" => "W(cq)",
        "wqq" => "W(qq)",
        "hbb" | "hqq" => "H(bb)",
        "hcc" => "H(cc)",
        "qcd" => "QCD",
        "tqq" => "tt",
        other => other,
    };
    if scale_higgs && matches!(key, "hbb" | "hqq" | "hcc") {
        format!("{base} x 500")
    } else {
        base.to_string()
    }
}

/// Position of a series key in the fixed legend order.
pub fn label_rank(key: &str) -> usize {
    LABEL_ORDER.iter().position(|&k| k == key).unwrap_or(LABEL_ORDER.len())
}

/// Integrated luminosity in 1/fb for the jet or muon selection.
pub fn lumi_for(year: &str, muon: bool) -> Option<f64> {
    let table: &[(&str, f64, f64)] =
        &[("2016", 35.5, 35.2), ("2017", 41.5, 41.1), ("2018", 59.2, 59.0)];
    table
        .iter()
        .find(|(y, _, _)| *y == year)
        .map(|(_, jet, mu)| if muon { *mu } else { *jet })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_detection() {
        assert_eq!(RegionScheme::detect("ptbin0pass_prefit").unwrap(), RegionScheme::PassFail);
        assert_eq!(RegionScheme::detect("ptbin3pcc_postfit").unwrap(), RegionScheme::ThreeRegion);
        assert!(RegionScheme::detect("ptbin3xyz_postfit").is_err());
    }

    #[test]
    fn region_labels() {
        let s = RegionScheme::ThreeRegion;
        assert_eq!(s.region_label("ptbin0pqq_prefit"), "Light");
        assert_eq!(s.region_label("ptbin0pcc_prefit"), "Charm");
        assert_eq!(s.region_label("ptbin0pbb_prefit"), "Bottom");
        let pf = RegionScheme::PassFail;
        assert_eq!(pf.region_label("muonCRpass_prefit"), "Passing");
    }

    #[test]
    fn higgs_labels_scale() {
        assert_eq!(series_label("hcc", true), "H(cc) x 500");
        assert_eq!(series_label("hcc", false), "H(cc)");
        assert_eq!(series_label("zcc", true), "Z(cc)");
    }

    #[test]
    fn lumi_table() {
        assert_eq!(lumi_for("2017", false), Some(41.5));
        assert_eq!(lumi_for("2017", true), Some(41.1));
        assert_eq!(lumi_for("1999", false), None);
    }

    #[test]
    fn data_sorts_before_samples() {
        assert!(label_rank("Data") < label_rank("zbb"));
        assert!(label_rank("zcc") < label_rank("tqq"));
        assert_eq!(label_rank("unknown"), LABEL_ORDER.len());
    }
}
