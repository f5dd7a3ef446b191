//! State module for the data entities flowing through a crawl
//!
//! # Components
//!
//! - `DataEntity`: one crawlable unit (file, message, page, feed item)
//! - `ModificationState`: classification of an entity relative to a prior crawl
//! - `Attributes`: ordered multi-map of adapter-specific descriptor fields
//! - `SourceKind`: the declared kind that selects the adapter for an entity

mod attributes;
mod entity;
mod modification;

// Re-export main types
pub use attributes::Attributes;
pub use entity::{DataEntity, SourceKind};
pub use modification::ModificationState;
