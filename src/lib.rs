//! # FHIR Validator Server
//!
//! An HTTP wrapper around a FHIR conformance rule engine. The service exposes
//! resource validation, JSON/XML transcoding across FHIR releases, FHIRPath-style
//! evaluation, and an implementation-guide registry, and serves a degraded but
//! well-formed API while the engine performs its expensive initialization.
//!
//! The rule engine itself sits behind [`engine::RuleEngine`]; everything else in
//! this crate is the orchestration layer around it.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod routes;
pub mod server;
pub mod services;

pub use config::ServerConfig;
pub use diagnostics::{Diagnostics, Issue, IssueKind, Severity};
pub use error::{Result, ServiceError};
pub use server::{RouteTable, loading_router, ready_router};
pub use services::AppState;
