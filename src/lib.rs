//! studioops: entity linking and data-integrity auditing for the studio's
//! project records.
//!
//! Raw artifacts (emails, documents, invoice lines) are normalized into
//! `Evidence`, matched against the project store by the resolver, and the
//! store itself is audited for data gaps. Humans decide the borderline
//! cases; their decisions feed back into per-rule accuracy that gates what
//! the engine may apply on its own.

pub mod auditor;
pub mod config;
pub mod db;
pub mod error;
pub mod evidence;
pub mod helpers;
pub mod ledger;
mod migrations;
pub mod model;
pub mod pipeline;
pub mod reporting;
pub mod resolver;
pub mod review;

pub use config::EngineConfig;
pub use db::AuditDb;
pub use error::EngineError;
