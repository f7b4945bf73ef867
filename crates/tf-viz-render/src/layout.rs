//! Plot areas and the main/residual panel split.

/// Rectangular plot area within the canvas.
#[derive(Debug, Clone, Copy)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    pub fn manual(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Main + residual panel layout. The main panel gets the height left
/// over after the residual fraction and the gap.
#[derive(Debug, Clone)]
pub struct MainRatioLayout {
    pub main: PlotArea,
    pub ratio: PlotArea,
}

impl MainRatioLayout {
    pub fn new(
        left: f64,
        top: f64,
        width: f64,
        total_height: f64,
        gap: f64,
        ratio_frac: f64,
    ) -> Self {
        let ratio_h = total_height * ratio_frac;
        let main_h = total_height - ratio_h - gap;
        Self {
            main: PlotArea::manual(left, top, width, main_h),
            ratio: PlotArea::manual(left, top + main_h + gap, width, ratio_h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_share_width_and_do_not_overlap() {
        let layout = MainRatioLayout::new(50.0, 20.0, 400.0, 300.0, 4.0, 0.25);
        assert_eq!(layout.main.width, layout.ratio.width);
        assert!(layout.main.bottom() <= layout.ratio.top);
        assert!((layout.ratio.height - 75.0).abs() < 1e-9);
    }
}
