//! Core data model for the gallery service.
//!
//! A single persisted entity, the image record, maps to one sqlite row
//! and serializes naturally as JSON via `serde`.

pub mod image;
