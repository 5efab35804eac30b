//! Coordinators over the two stores: upload/delete orchestration, the
//! metadata query engine, and the derived-attribute worker.

pub mod gallery_service;
pub mod processor;
