//! Package records and archive handling.
//!
//! Packages arrive as npm-style `.tgz` archives with a `package/package.json`
//! manifest and a `package/.index.json` file index. The package record is
//! derived from the manifest plus the canonical URLs of every
//! StructureDefinition listed in the index, sorted and deduplicated.

use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tar::Archive;

use crate::error::{Result, ServiceError};

/// An immutable implementation-guide package record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub version: String,
    pub canonical: String,
    #[serde(rename = "profiles")]
    pub profile_urls: Vec<String>,
}

impl Package {
    /// The registry cache key, `id#version`.
    pub fn cache_key(&self) -> String {
        format!("{}#{}", self.id, self.version)
    }
}

/// Extract a gzipped tar archive into `dest`.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    archive
        .unpack(dest)
        .map_err(|e| ServiceError::Archive(format!("could not extract package archive: {e}")))
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    name: String,
    version: String,
    canonical: Option<String>,
}

fn read_manifest(dir: &Path) -> Result<PackageManifest> {
    for candidate in [dir.join("package").join("package.json"), dir.join("package.json")] {
        if candidate.exists() {
            let bytes = std::fs::read(&candidate)?;
            return serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Archive(format!("invalid package manifest: {e}")));
        }
    }
    Err(ServiceError::Archive(
        "package archive has no package.json".to_string(),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct PackageIndex {
    #[serde(default)]
    files: Vec<IndexFile>,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(rename = "resourceType", default)]
    resource_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Canonical URLs of every profile definition in an extracted package,
/// sorted and deduplicated.
pub fn profile_urls(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for candidate in [dir.join("package").join(".index.json"), dir.join(".index.json")] {
        if candidate.exists() {
            let index: PackageIndex = serde_json::from_slice(&std::fs::read(&candidate)?)
                .map_err(|e| ServiceError::Archive(format!("invalid package index: {e}")))?;
            files = index.files;
            break;
        }
    }

    if files.is_empty() {
        files = scan_resources(dir)?;
    }

    let mut urls: Vec<String> = files
        .into_iter()
        .filter(|f| f.resource_type.as_deref() == Some("StructureDefinition"))
        .filter_map(|f| f.url)
        .collect();
    urls.sort();
    urls.dedup();
    Ok(urls)
}

/// Fallback for packages shipped without a file index.
fn scan_resources(dir: &Path) -> Result<Vec<IndexFile>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if name.starts_with('.') || name == "package.json" || !name.ends_with(".json") {
                continue;
            }
            if let Ok(value) = serde_json::from_slice::<Value>(&std::fs::read(&path)?) {
                files.push(IndexFile {
                    resource_type: value
                        .get("resourceType")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    url: value.get("url").and_then(Value::as_str).map(str::to_string),
                });
            }
        }
    }
    Ok(files)
}

/// Build the package record for an extracted archive.
pub fn package_from_dir(dir: &Path) -> Result<Package> {
    let manifest = read_manifest(dir)?;
    let profile_urls = profile_urls(dir)?;
    let canonical = manifest
        .canonical
        .or_else(|| canonical_from_profiles(&profile_urls))
        .unwrap_or_else(|| format!("urn:ig:{}", manifest.name));
    Ok(Package {
        id: manifest.name,
        version: manifest.version,
        canonical,
        profile_urls,
    })
}

/// Read `(id, version, canonical)` straight out of archive bytes, without
/// extracting to disk.
pub fn manifest_from_archive(bytes: &[u8]) -> Result<(String, String, Option<String>)> {
    use std::io::Read;

    let mut archive = Archive::new(GzDecoder::new(bytes));
    for entry in archive
        .entries()
        .map_err(|e| ServiceError::Archive(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| ServiceError::Archive(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| ServiceError::Archive(e.to_string()))?
            .into_owned();
        if path.file_name().and_then(|n| n.to_str()) == Some("package.json") {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| ServiceError::Archive(e.to_string()))?;
            let manifest: PackageManifest = serde_json::from_str(&content)
                .map_err(|e| ServiceError::Archive(format!("invalid package manifest: {e}")))?;
            return Ok((manifest.name, manifest.version, manifest.canonical));
        }
    }
    Err(ServiceError::Archive(
        "package archive has no package.json".to_string(),
    ))
}

fn canonical_from_profiles(urls: &[String]) -> Option<String> {
    urls.first().and_then(|url| {
        url.contains("/StructureDefinition/")
            .then(|| url.split("/StructureDefinition/").next().unwrap_or(url).to_string())
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// Build an npm-style package archive in memory.
    pub fn archive(
        id: &str,
        version: &str,
        canonical: Option<&str>,
        profiles: &[(&str, &str)],
    ) -> Vec<u8> {
        let manifest = match canonical {
            Some(c) => format!(
                r#"{{"name":"{id}","version":"{version}","canonical":"{c}"}}"#
            ),
            None => format!(r#"{{"name":"{id}","version":"{version}"}}"#),
        };

        let index_entries: Vec<String> = profiles
            .iter()
            .enumerate()
            .map(|(i, (name, url))| {
                format!(
                    r#"{{"filename":"StructureDefinition-{i}.json","resourceType":"StructureDefinition","url":"{url}","name":"{name}"}}"#
                )
            })
            .collect();
        let index = format!(
            r#"{{"index-version":1,"files":[{}]}}"#,
            index_entries.join(",")
        );

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut add = |path: &str, content: &str| {
            let bytes = content.as_bytes();
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, bytes).unwrap();
        };

        add("package/package.json", &manifest);
        add("package/.index.json", &index);
        for (i, (name, url)) in profiles.iter().enumerate() {
            add(
                &format!("package/StructureDefinition-{i}.json"),
                &format!(
                    r#"{{"resourceType":"StructureDefinition","url":"{url}","name":"{name}","status":"active","kind":"resource","abstract":false,"type":"Patient"}}"#
                ),
            );
        }

        builder
            .into_inner()
            .unwrap()
            .finish()
            .unwrap()
    }
}
