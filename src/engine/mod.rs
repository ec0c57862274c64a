//! The conformance rule engine boundary.
//!
//! The engine is an opaque collaborator: the rest of the service only talks to
//! it through [`RuleEngine`]. The in-crate default is
//! [`schema_engine::SchemaEngine`], a structural checker over the compile-time
//! type tables; a different engine can be dropped in behind the same trait.

pub mod schema_engine;

pub use schema_engine::SchemaEngine;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Failure inside the rule engine. Facades convert these into diagnostic
/// documents; they never reach the transport layer as errors.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Wire serialization of a resource body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Xml,
}

impl WireFormat {
    /// Detect the serialization from the first non-whitespace byte.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Self::Xml,
            _ => Self::Json,
        }
    }
}

/// An implementation guide known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideInfo {
    pub package_id: String,
    pub version: String,
}

/// Engine configuration derived from the service environment.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Whether terminology checking runs at all.
    pub terminology_enabled: bool,
    /// External terminology service, reported when a code system is not
    /// loaded locally.
    pub tx_server: Option<String>,
    /// Report display-text mismatches as warnings instead of errors.
    pub display_issues_are_warnings: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            terminology_enabled: true,
            tx_server: None,
            display_issues_are_warnings: false,
        }
    }
}

/// The rule engine call contract.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Ingest an extracted package directory and register its guide.
    async fn ingest_package(&self, dir: &Path, guide: GuideInfo) -> EngineResult<usize>;

    /// Ingest a directory of loose definition resources (startup artifacts).
    async fn ingest_profile_dir(&self, dir: &Path) -> EngineResult<usize>;

    /// Ingest a single definition resource (profile, code system, guide).
    fn ingest_resource(&self, bytes: &[u8]) -> EngineResult<()>;

    /// Validate a resource body against the given profile URLs. An empty list
    /// means the resource's base type only.
    fn validate(
        &self,
        resource: &[u8],
        format: WireFormat,
        profiles: &[String],
    ) -> EngineResult<Diagnostics>;

    /// Sorted, distinct resource type names known to the engine.
    fn resource_names(&self) -> Vec<String>;

    /// Sorted, distinct canonical URLs of loaded structure definitions.
    fn structure_urls(&self) -> Vec<String>;

    /// Implementation guides currently known to the engine.
    fn guides(&self) -> Vec<GuideInfo>;

    /// Engine version string for the version endpoint.
    fn version(&self) -> String;
}
