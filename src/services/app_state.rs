//! Shared application state.
//!
//! All long-lived service objects are constructed once at startup and handed
//! to the dispatch layer by reference; there is no ambient global state.

use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::engine::{RuleEngine, SchemaEngine};
use crate::error::{Result, ServiceError};
use crate::registry::{HttpPackageSource, PackageRegistry, PackageSource};

use super::conversion::ConversionService;
use super::fhirpath::FhirPathService;
use super::validation::ValidationService;

pub struct AppState {
    pub config: ServerConfig,
    pub engine: Arc<dyn RuleEngine>,
    pub registry: PackageRegistry,
    pub validation: ValidationService,
    pub conversion: ConversionService,
    pub fhirpath: FhirPathService,
}

impl AppState {
    /// Full synchronous initialization: construct the engine, ingest the
    /// startup artifacts, and wire up the facades. This is the expensive part
    /// the startup gate hides.
    pub async fn initialize(config: ServerConfig) -> Result<Self> {
        let engine: Arc<dyn RuleEngine> = Arc::new(SchemaEngine::new(
            config.release,
            config.engine_settings(),
        ));
        engine
            .ingest_profile_dir(&config.ig_directory)
            .await
            .map_err(|e| ServiceError::Engine(e.to_string()))?;

        let source: Arc<dyn PackageSource> = Arc::new(HttpPackageSource::new(
            config.package_registry_url.clone(),
            config.package_cache_dir(),
        ));

        let state = Self::assemble(config, engine, source);
        info!(
            resources = state.engine.resource_names().len(),
            structures = state.engine.structure_urls().len(),
            "validator initialized"
        );
        Ok(state)
    }

    /// Wire the facades around an existing engine and package source.
    pub fn assemble(
        config: ServerConfig,
        engine: Arc<dyn RuleEngine>,
        source: Arc<dyn PackageSource>,
    ) -> Self {
        let registry = PackageRegistry::new(engine.clone(), source);
        let validation = ValidationService::new(engine.clone());
        let conversion = ConversionService::new();
        let fhirpath = FhirPathService::new(config.release);
        Self {
            config,
            engine,
            registry,
            validation,
            conversion,
            fhirpath,
        }
    }
}
