//! Core types shared by the transfer-factor fit tooling.

pub mod binning;
pub mod error;
pub mod histogram;

pub use error::{Error, Result};
pub use histogram::Histogram;
