//! # tf-store
//!
//! Read-only access to histogram stores plus the template naming / lookup
//! logic and the pseudo-data synthesizer shared by the plotting and
//! model-building paths.
//!
//! ## Example
//!
//! ```no_run
//! use tf_store::{TemplateStore, TemplateKey, lookup};
//!
//! let store = TemplateStore::open("templates.json").unwrap();
//! let key = TemplateKey::new("pqq", "qcd", 0);
//! let templ = lookup(&store, &key).unwrap().into_histogram();
//! println!("bins: {}, yield: {}", templ.nbins(), templ.sum());
//! ```

pub mod aggregate;
pub mod store;
pub mod templates;

pub use aggregate::{pseudo_data, sum_templates};
pub use store::{HistStore, ShapeStore, TemplateStore};
pub use templates::{lookup, lookup_with_sumw2, TemplateKey, TemplateLookup};
