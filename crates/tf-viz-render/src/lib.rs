//! # tf-viz-render
//!
//! Renders `tf-viz` stack artifacts to SVG and PNG. The artifact carries
//! all numbers precomputed; this crate only draws.

pub mod axes;
pub mod canvas;
pub mod color;
pub mod config;
pub mod layout;
pub mod png;
pub mod primitives;
pub mod stack_plot;
pub mod text;

use std::path::Path;

use thiserror::Error;

use tf_viz::StackArtifact;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("layout error: {0}")]
    Layout(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PNG encoding error: {0}")]
    Png(String),
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Render an artifact to an SVG string.
pub fn render_svg(artifact: &StackArtifact, config: &config::RenderConfig) -> Result<String> {
    stack_plot::render(artifact, config)
}

/// Render an artifact to a file; the format follows the extension
/// (`.svg` or `.png`).
pub fn render_to_file(
    artifact: &StackArtifact,
    path: &Path,
    config: &config::RenderConfig,
) -> Result<()> {
    let svg = render_svg(artifact, config)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("svg");
    match ext {
        "svg" => std::fs::write(path, svg.as_bytes())?,
        "png" => std::fs::write(path, png::svg_to_png(&svg, config.dpi)?)?,
        other => return Err(RenderError::UnknownFormat(other.to_string())),
    }
    Ok(())
}
