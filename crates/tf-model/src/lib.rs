//! # tf-model
//!
//! Statistical model construction for the transfer-factor fit: the
//! serializable model document, Bernstein polynomial surfaces over the
//! (pt, rho) plane, the auxiliary MC transfer-factor fit, and the
//! assembler that ties templates, pseudo-data, and QCD parameterization
//! into channels.

pub mod assembler;
pub mod bernstein;
pub mod mctf;
pub mod schema;

pub use assembler::{build_model, BuildOptions, BuildOutput};
pub use bernstein::{AnalysisGrid, BernsteinPoly};
pub use mctf::{DecoTransform, McTfResult};
pub use schema::{ChannelDoc, EffectKind, ModelDoc, ParamEffect, SampleDoc, SampleSource, SampleType};
