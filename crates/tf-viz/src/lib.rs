//! # tf-viz
//!
//! Computes stacked-distribution artifacts (numbers-first) for the
//! diagnostic plots. The artifact holds everything the renderer needs
//! precomputed: data points and errors, cumulative stack outlines,
//! residual-panel series, labels, and the visibility mask. Rendering
//! lives in `tf-viz-render`.

pub mod stack;
pub mod style;

pub use stack::{stack_artifact, BinMask, StackArtifact, StackOptions, StackSeries};
pub use style::{lumi_for, series_label, RegionScheme};
