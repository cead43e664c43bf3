//! Calls Harvester Core Library
//!
//! Crawls public funding-call portals, discovers and validates the documents
//! each call publishes, and consolidates the results into a durable catalog.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`navigate`] - Paced HTTP sessions and retry-with-backoff navigation
//! - [`discover`] - Document link heuristics and intermediate-page following
//! - [`document`] - Signature classification, format normalization, artifact storage
//! - [`adapter`] - The site adapter contract and one adapter per portal
//! - [`catalog`] - Call records, identity keys, consolidation, persistence
//! - [`orchestrator`] - Sequential adapter runs and the end-of-run summary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod catalog;
pub mod discover;
pub mod document;
pub mod navigate;
pub mod orchestrator;
pub mod user_agent;
pub mod utils;

// Re-export commonly used types
pub use adapter::{AdapterError, AdapterStats, SiteAdapter, SitesFile};
pub use catalog::{CallRecord, Catalog, CatalogError, DocumentReference, consolidate};
pub use discover::{Discoverer, DiscoveryConfig};
pub use document::{FileSignature, FormatNormalizer, SofficeConverter, classify};
pub use navigate::{BackoffPolicy, HttpSession, NavigationError, Navigator, SessionOptions};
pub use orchestrator::{Orchestrator, RunError, RunOutcome, RunStatus, RunSummary};
