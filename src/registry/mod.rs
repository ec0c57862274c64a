//! The package/profile registry.
//!
//! Owns the custom package cache and coordinates the remote package source
//! with the rule engine. Reads run concurrently; loads serialize behind a
//! single writer lock, including the engine ingestion they trigger.

pub mod package;
pub mod source;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

pub use package::Package;
pub use source::{HttpPackageSource, PackageSource, SourceError, StaticPackageSource};

use crate::engine::{GuideInfo, RuleEngine};
use crate::error::{Result, ServiceError};

use package::{extract_archive, package_from_dir, profile_urls};

pub struct PackageRegistry {
    engine: Arc<dyn RuleEngine>,
    source: Arc<dyn PackageSource>,
    /// Packages loaded explicitly from archive bytes, keyed `id#version`.
    /// Entries are inserted by explicit loads only and never evicted; a
    /// remote-resolved package never replaces one.
    custom: std::sync::RwLock<HashMap<String, Arc<Package>>>,
    /// Serializes loads against each other and against the engine ingestion
    /// they perform.
    load_lock: tokio::sync::Mutex<()>,
}

impl PackageRegistry {
    pub fn new(engine: Arc<dyn RuleEngine>, source: Arc<dyn PackageSource>) -> Self {
        Self {
            engine,
            source,
            custom: std::sync::RwLock::new(HashMap::new()),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load (or return the already-loaded) package for `id`.
    ///
    /// A custom cache hit is returned as-is, without touching the remote
    /// source; a missing version matches any cached version of the id.
    pub async fn load_ig(&self, id: &str, version: Option<&str>) -> Result<Arc<Package>> {
        if let Some(package) = self.cached(id, version) {
            debug!(id, version = %package.version, "implementation guide served from cache");
            return Ok(package);
        }

        let _guard = self.load_lock.lock().await;
        // A concurrent load may have won the race for the same package.
        if let Some(package) = self.cached(id, version) {
            return Ok(package);
        }

        let bytes = self
            .source
            .fetch(id, version)
            .await
            .map_err(map_source_error)?;
        let package = self.ingest_archive(&bytes).await?;
        info!(id = %package.id, version = %package.version, "implementation guide loaded");
        Ok(package)
    }

    /// Load a package archive supplied by the caller and remember it in the
    /// custom cache.
    pub async fn load_package(&self, bytes: &[u8]) -> Result<Arc<Package>> {
        let _guard = self.load_lock.lock().await;
        let package = self.ingest_archive(bytes).await?;
        self.custom
            .write()
            .expect("package cache lock")
            .insert(package.cache_key(), package.clone());
        info!(id = %package.id, version = %package.version, "custom package loaded");
        Ok(package)
    }

    /// Extract, derive, and hand the archive to the engine. The transient
    /// extraction directory is removed on every exit path.
    async fn ingest_archive(&self, bytes: &[u8]) -> Result<Arc<Package>> {
        let dir = tempfile::tempdir()?;
        extract_archive(bytes, dir.path())?;
        let package = Arc::new(package_from_dir(dir.path())?);
        self.engine
            .ingest_package(
                dir.path(),
                GuideInfo {
                    package_id: package.id.clone(),
                    version: package.version.clone(),
                },
            )
            .await
            .map_err(|e| ServiceError::Engine(e.to_string()))?;
        Ok(package)
    }

    /// Union of the remote source's listing and the custom cache. On an id
    /// collision the custom entry wins.
    pub async fn known_igs(&self) -> BTreeMap<String, String> {
        let mut igs = match self.source.list().await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(error = %err, "package source listing unavailable");
                BTreeMap::new()
            }
        };
        let custom = self.custom.read().expect("package cache lock");
        for package in custom.values() {
            igs.insert(package.id.clone(), package.canonical.clone());
        }
        igs
    }

    /// Profile URLs for every guide the engine knows. A failure to resolve
    /// one guide yields an empty list for that guide, not a failed response.
    pub async fn profiles_by_ig(&self) -> BTreeMap<String, Vec<String>> {
        let mut out = BTreeMap::new();
        for guide in self.engine.guides() {
            if out.contains_key(&guide.package_id) {
                continue;
            }
            let profiles = match self.profiles_for(&guide).await {
                Ok(profiles) => profiles,
                Err(err) => {
                    warn!(
                        package = %guide.package_id,
                        version = %guide.version,
                        error = %err,
                        "guide profiles unavailable"
                    );
                    Vec::new()
                }
            };
            out.insert(guide.package_id, profiles);
        }
        out
    }

    async fn profiles_for(&self, guide: &GuideInfo) -> Result<Vec<String>> {
        if let Some(package) = self.cached(&guide.package_id, Some(&guide.version)) {
            return Ok(package.profile_urls.clone());
        }
        let bytes = self
            .source
            .fetch(&guide.package_id, Some(&guide.version))
            .await
            .map_err(map_source_error)?;
        let dir = tempfile::tempdir()?;
        extract_archive(&bytes, dir.path())?;
        profile_urls(dir.path())
    }

    /// Custom-cache lookup. With a version the key must match exactly; with
    /// none, any cached version of the id matches (newest first for
    /// determinism).
    fn cached(&self, id: &str, version: Option<&str>) -> Option<Arc<Package>> {
        let custom = self.custom.read().expect("package cache lock");
        match version {
            Some(version) => custom.get(&format!("{id}#{version}")).cloned(),
            None => custom
                .values()
                .filter(|p| p.id == id)
                .max_by(|a, b| a.version.cmp(&b.version))
                .cloned(),
        }
    }
}

fn map_source_error(err: SourceError) -> ServiceError {
    match err {
        SourceError::NotFound { id, version } => ServiceError::PackageNotFound { id, version },
        SourceError::Unavailable(message) => ServiceError::Source(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineSettings, SchemaEngine};
    use crate::model::FhirRelease;
    use super::package::fixtures;

    fn engine() -> Arc<SchemaEngine> {
        Arc::new(SchemaEngine::new(FhirRelease::R4, EngineSettings::default()))
    }

    fn registry_with(source: StaticPackageSource) -> PackageRegistry {
        PackageRegistry::new(engine(), Arc::new(source))
    }

    #[tokio::test]
    async fn custom_package_wins_over_remote_listing() {
        let registry = registry_with(
            StaticPackageSource::new().advertise("example.ig", "http://remote.example.org/ig"),
        );

        let bytes = fixtures::archive(
            "example.ig",
            "1.0.0",
            Some("http://custom.example.org/ig"),
            &[("A", "http://custom.example.org/ig/StructureDefinition/a")],
        );
        registry.load_package(&bytes).await.unwrap();

        let igs = registry.known_igs().await;
        assert_eq!(
            igs.get("example.ig").map(String::as_str),
            Some("http://custom.example.org/ig")
        );
    }

    #[tokio::test]
    async fn load_ig_prefers_cache_and_skips_the_remote_source() {
        // The source cannot serve this package, so any remote call would fail.
        let registry = registry_with(StaticPackageSource::new());

        let bytes = fixtures::archive("pkg.a", "1.0", Some("http://example.org/pkg-a"), &[]);
        let loaded = registry.load_package(&bytes).await.unwrap();

        let by_version = registry.load_ig("pkg.a", Some("1.0")).await.unwrap();
        assert_eq!(by_version, loaded);

        // No version matches any cached version.
        let wildcard = registry.load_ig("pkg.a", None).await.unwrap();
        assert_eq!(wildcard, loaded);
    }

    #[tokio::test]
    async fn wildcard_lookup_picks_the_newest_cached_version() {
        let registry = registry_with(StaticPackageSource::new());
        for version in ["1.0.0", "1.2.0", "1.10.0"] {
            let bytes = fixtures::archive("pkg.multi", version, Some("http://example.org/m"), &[]);
            registry.load_package(&bytes).await.unwrap();
        }
        // Lexicographic comparison; "1.2.0" sorts after "1.10.0".
        let picked = registry.load_ig("pkg.multi", None).await.unwrap();
        assert_eq!(picked.version, "1.2.0");
    }

    #[tokio::test]
    async fn load_ig_resolves_through_the_source() {
        let bytes = fixtures::archive(
            "remote.ig",
            "2.0.0",
            Some("http://remote.example.org/ig"),
            &[("R", "http://remote.example.org/ig/StructureDefinition/r")],
        );
        let registry = registry_with(StaticPackageSource::new().with_package(
            "remote.ig",
            "2.0.0",
            "http://remote.example.org/ig",
            bytes,
        ));

        let package = registry.load_ig("remote.ig", None).await.unwrap();
        assert_eq!(package.version, "2.0.0");

        // Remote-resolved packages do not enter the custom cache, but the
        // listing still knows the id.
        assert!(registry.cached("remote.ig", None).is_none());
        assert!(registry.known_igs().await.contains_key("remote.ig"));
    }

    #[tokio::test]
    async fn missing_packages_surface_as_package_not_found() {
        let registry = registry_with(StaticPackageSource::new());
        let err = registry.load_ig("no.such.ig", Some("1.0")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PackageNotFound { .. }));
    }

    #[tokio::test]
    async fn profiles_by_ig_substitutes_empty_lists_for_failures() {
        let registry = registry_with(StaticPackageSource::new());

        let bytes = fixtures::archive(
            "good.ig",
            "1.0",
            Some("http://example.org/good"),
            &[("G", "http://example.org/good/StructureDefinition/g")],
        );
        registry.load_package(&bytes).await.unwrap();

        // A guide the source cannot resolve: known to the engine only.
        registry
            .engine
            .ingest_resource(
                br#"{"resourceType":"ImplementationGuide","packageId":"broken.ig","version":"0.1"}"#,
            )
            .unwrap();

        let map = registry.profiles_by_ig().await;
        assert_eq!(
            map.get("good.ig").map(Vec::len),
            Some(1),
            "loaded guide lists its profiles"
        );
        assert_eq!(
            map.get("broken.ig").map(Vec::len),
            Some(0),
            "unresolvable guide degrades to an empty list"
        );
    }

    #[tokio::test]
    async fn malformed_archives_are_rejected() {
        let registry = registry_with(StaticPackageSource::new());
        let err = registry.load_package(b"definitely not gzip").await.unwrap_err();
        assert!(matches!(err, ServiceError::Archive(_)));
        assert!(registry.known_igs().await.is_empty());
    }
}
