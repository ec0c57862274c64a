//! Remote package sources.
//!
//! The service resolves packages it has not seen before through a
//! [`PackageSource`]. The production implementation talks to an npm-style
//! FHIR package registry and keeps an on-disk download cache; the static
//! implementation serves a fixed in-memory set and backs the tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::package::manifest_from_archive;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("package {id}#{version} was not found in the package registry")]
    NotFound { id: String, version: String },

    #[error("package source unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A remote package distribution service.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Known package ids mapped to their canonical URLs.
    async fn list(&self) -> SourceResult<BTreeMap<String, String>>;

    /// Fetch a package archive. A missing version means the latest one.
    async fn fetch(&self, id: &str, version: Option<&str>) -> SourceResult<Vec<u8>>;
}

/// npm-style registry client with an on-disk download cache.
///
/// Downloads land in the cache directory as `id#version.tgz`; a cached
/// archive is never fetched again, and `list` reports exactly what the cache
/// holds.
pub struct HttpPackageSource {
    base_url: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl HttpPackageSource {
    pub fn new(base_url: url::Url, cache_dir: PathBuf) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            cache_dir,
            client: reqwest::Client::new(),
        }
    }

    fn cache_file(&self, id: &str, version: &str) -> PathBuf {
        self.cache_dir.join(format!("{id}#{version}.tgz"))
    }

    /// Versions of a package already present in the cache, ascending.
    fn cached_versions(&self, id: &str) -> Vec<String> {
        let mut versions: Vec<String> = cache_entries(&self.cache_dir)
            .into_iter()
            .filter(|(entry_id, _)| entry_id == id)
            .map(|(_, version)| version)
            .collect();
        versions.sort();
        versions
    }

    async fn resolve_version(&self, id: &str) -> SourceResult<String> {
        if let Some(version) = self.cached_versions(id).pop() {
            debug!(id, version, "latest version resolved from download cache");
            return Ok(version);
        }

        let url = format!("{}/{id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                id: id.to_string(),
                version: "latest".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{url} answered {}",
                response.status()
            )));
        }
        let metadata: Value = response.json().await?;
        if let Some(latest) = metadata
            .pointer("/dist-tags/latest")
            .and_then(Value::as_str)
        {
            return Ok(latest.to_string());
        }
        metadata
            .get("versions")
            .and_then(Value::as_object)
            .and_then(|versions| versions.keys().max().cloned())
            .ok_or_else(|| {
                SourceError::Unavailable(format!("{url} lists no versions for {id}"))
            })
    }
}

#[async_trait]
impl PackageSource for HttpPackageSource {
    async fn list(&self) -> SourceResult<BTreeMap<String, String>> {
        let mut igs = BTreeMap::new();
        for (id, version) in cache_entries(&self.cache_dir) {
            let path = self.cache_file(&id, &version);
            match tokio::fs::read(&path).await {
                Ok(bytes) => match manifest_from_archive(&bytes) {
                    Ok((manifest_id, _, canonical)) => {
                        igs.insert(
                            manifest_id.clone(),
                            canonical.unwrap_or_else(|| format!("urn:ig:{manifest_id}")),
                        );
                    }
                    Err(err) => {
                        warn!(file = %path.display(), error = %err, "unreadable cached package")
                    }
                },
                Err(err) => warn!(file = %path.display(), error = %err, "unreadable cached package"),
            }
        }
        Ok(igs)
    }

    async fn fetch(&self, id: &str, version: Option<&str>) -> SourceResult<Vec<u8>> {
        let version = match version {
            Some(v) => v.to_string(),
            None => self.resolve_version(id).await?,
        };

        let cache_file = self.cache_file(id, &version);
        if cache_file.exists() {
            debug!(id, version, "package served from download cache");
            return Ok(tokio::fs::read(&cache_file).await?);
        }

        let url = format!("{0}/{id}/-/{id}-{version}.tgz", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                id: id.to_string(),
                version,
            });
        }
        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{url} answered {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?.to_vec();

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(&cache_file, &bytes).await?;
        info!(id, version, bytes = bytes.len(), "package downloaded");
        Ok(bytes)
    }
}

fn cache_entries(cache_dir: &std::path::Path) -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stem = name.strip_suffix(".tgz")?;
            let (id, version) = stem.split_once('#')?;
            Some((id.to_string(), version.to_string()))
        })
        .collect()
}

/// A fixed, in-memory package source.
#[derive(Default)]
pub struct StaticPackageSource {
    listing: BTreeMap<String, String>,
    packages: HashMap<String, Vec<u8>>,
    latest: HashMap<String, String>,
}

impl StaticPackageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise a package id in the listing without making it fetchable.
    pub fn advertise(mut self, id: &str, canonical: &str) -> Self {
        self.listing.insert(id.to_string(), canonical.to_string());
        self
    }

    /// Make a package archive fetchable (and advertise it).
    pub fn with_package(mut self, id: &str, version: &str, canonical: &str, bytes: Vec<u8>) -> Self {
        self.listing.insert(id.to_string(), canonical.to_string());
        self.packages.insert(format!("{id}#{version}"), bytes);
        let newest = self
            .latest
            .get(id)
            .map(|existing| existing.as_str() < version)
            .unwrap_or(true);
        if newest {
            self.latest.insert(id.to_string(), version.to_string());
        }
        self
    }
}

#[async_trait]
impl PackageSource for StaticPackageSource {
    async fn list(&self) -> SourceResult<BTreeMap<String, String>> {
        Ok(self.listing.clone())
    }

    async fn fetch(&self, id: &str, version: Option<&str>) -> SourceResult<Vec<u8>> {
        let version = version
            .map(str::to_string)
            .or_else(|| self.latest.get(id).cloned())
            .ok_or_else(|| SourceError::NotFound {
                id: id.to_string(),
                version: "latest".to_string(),
            })?;
        self.packages
            .get(&format!("{id}#{version}"))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                id: id.to_string(),
                version,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::package::fixtures;

    #[tokio::test]
    async fn static_source_serves_latest_version() {
        let source = StaticPackageSource::new()
            .with_package("a.b", "1.0.0", "http://example.org/a", vec![1])
            .with_package("a.b", "2.0.0", "http://example.org/a", vec![2]);

        assert_eq!(source.fetch("a.b", Some("1.0.0")).await.unwrap(), vec![1]);
        assert_eq!(source.fetch("a.b", None).await.unwrap(), vec![2]);
        assert!(matches!(
            source.fetch("a.b", Some("9.9.9")).await.unwrap_err(),
            SourceError::NotFound { .. }
        ));
        assert!(matches!(
            source.fetch("missing", None).await.unwrap_err(),
            SourceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn http_source_lists_its_download_cache() {
        let cache = tempfile::tempdir().unwrap();
        let bytes = fixtures::archive("cached.ig", "1.0.0", Some("http://example.org/cached"), &[]);
        std::fs::write(cache.path().join("cached.ig#1.0.0.tgz"), &bytes).unwrap();
        std::fs::write(cache.path().join("junk.txt"), b"ignored").unwrap();

        let source = HttpPackageSource::new(
            url::Url::parse("http://registry.invalid").unwrap(),
            cache.path().to_path_buf(),
        );
        let igs = source.list().await.unwrap();
        assert_eq!(
            igs.get("cached.ig").map(String::as_str),
            Some("http://example.org/cached")
        );
    }

    #[tokio::test]
    async fn http_source_serves_cached_archives_without_network() {
        let cache = tempfile::tempdir().unwrap();
        let bytes = fixtures::archive("cached.ig", "1.0.0", None, &[]);
        std::fs::write(cache.path().join("cached.ig#1.0.0.tgz"), &bytes).unwrap();

        // The registry URL is unreachable; a cache hit must not touch it.
        let source = HttpPackageSource::new(
            url::Url::parse("http://registry.invalid").unwrap(),
            cache.path().to_path_buf(),
        );
        let fetched = source.fetch("cached.ig", Some("1.0.0")).await.unwrap();
        assert_eq!(fetched, bytes);

        // Version resolution also prefers the cache.
        let fetched = source.fetch("cached.ig", None).await.unwrap();
        assert_eq!(fetched, bytes);
    }
}
