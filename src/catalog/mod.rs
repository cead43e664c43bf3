//! Call records, identity keys, consolidation, and catalog persistence.
//!
//! Adapters produce [`CallRecord`] candidates; only [`consolidate`] mutates
//! a [`Catalog`]. The orchestrator loads the catalog once at run start and
//! writes it back once, atomically, after merging.

mod consolidate;
mod error;
pub mod identity;
mod record;
mod store;

pub use consolidate::{Catalog, ConsolidationReport, consolidate, is_richer};
pub use error::CatalogError;
pub use identity::{call_slug, identity_key, is_annex_title, is_valid_title};
pub use record::{CallRecord, DocumentReference};
pub use store::{load_catalog, save_catalog};
