//! Document pipeline: signature classification, format normalization, and
//! content-addressed artifact storage.
//!
//! # Overview
//!
//! - [`classify`] / [`classify_with_hints`] - true format from magic numbers
//! - [`FormatNormalizer`] - word-processing office files to PDF, soft-failing
//! - [`ArtifactStore`] - `<site>/<call>/<stem>_<hash8><ext>` with a hash index
//! - [`DocumentAcquirer`] - fetch, validate, and store one discovered URL

mod acquire;
mod error;
pub mod filename;
mod normalize;
mod signature;
mod store;

pub use acquire::{AcquiredDocument, AcquisitionTarget, DocumentAcquirer};
pub use error::{ConversionError, DocumentError};
pub use normalize::{
    Converter, DEFAULT_CONVERSION_TIMEOUT, DisabledConverter, FormatNormalizer, Normalized,
    SofficeConverter, needs_conversion,
};
pub use signature::{
    Classification, FileSignature, OfficeFlavor, SourceHints, classify, classify_with_hints,
    looks_like_html,
};
pub use store::{ArtifactStore, StoredArtifact};
