//! Shared helpers for the integration tests.

use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;

use fhir_validator_server::config::ServerConfig;
use fhir_validator_server::engine::{EngineSettings, SchemaEngine};
use fhir_validator_server::model::FhirRelease;
use fhir_validator_server::registry::StaticPackageSource;
use fhir_validator_server::services::AppState;

/// Build an npm-style package archive in memory.
pub fn package_archive(
    id: &str,
    version: &str,
    canonical: &str,
    profile_urls: &[&str],
) -> Vec<u8> {
    let manifest = format!(r#"{{"name":"{id}","version":"{version}","canonical":"{canonical}"}}"#);

    let index_entries: Vec<String> = profile_urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"{{"filename":"StructureDefinition-{i}.json","resourceType":"StructureDefinition","url":"{url}"}}"#
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
    for (i, url) in profile_urls.iter().enumerate() {
        add(
            &format!("package/StructureDefinition-{i}.json"),
            &format!(
                r#"{{"resourceType":"StructureDefinition","url":"{url}","name":"Profile{i}","status":"active","kind":"resource","abstract":false,"type":"Patient"}}"#
            ),
        );
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Application state over the default engine and a static package source.
pub fn app_state(source: StaticPackageSource) -> Arc<AppState> {
    let engine = Arc::new(SchemaEngine::new(
        FhirRelease::R4,
        EngineSettings::default(),
    ));
    Arc::new(AppState::assemble(
        ServerConfig::default(),
        engine,
        Arc::new(source),
    ))
}
