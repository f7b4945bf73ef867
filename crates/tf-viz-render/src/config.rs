//! Render configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas width in points.
    pub width: f64,
    /// Canvas height in points.
    pub height: f64,
    /// PNG raster resolution.
    pub dpi: u32,
    pub title_size: f64,
    pub label_size: f64,
    pub tick_size: f64,
    pub legend_size: f64,
    /// Experiment tag drawn in the header.
    pub experiment: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 480.0,
            height: 440.0,
            dpi: 150,
            title_size: 13.0,
            label_size: 11.0,
            tick_size: 9.0,
            legend_size: 9.0,
            experiment: "CMS".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_json() {
        let cfg: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.dpi, 150);
        assert_eq!(cfg.experiment, "CMS");
    }
}
