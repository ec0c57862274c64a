//! Handlers for validation, profile, and package routes.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::ServiceError;
use crate::registry::Package;
use crate::services::AppState;

use super::outcome_response;

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub profile: Option<String>,
}

/// `POST /validate?profile=<csv>`
///
/// Always answers 200 with an OperationOutcome, even when the engine fails.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ValidateParams>,
    body: Bytes,
) -> Response {
    let profiles: Vec<String> = params
        .profile
        .as_deref()
        .map(|csv| {
            csv.split(',')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let outcome = state.validation.validate(&body, &profiles);
    outcome_response(StatusCode::OK, &outcome)
}

/// `GET /resources`
pub async fn resources(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.engine.resource_names())
}

/// `GET /profiles`
pub async fn profiles(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.engine.structure_urls())
}

/// `POST /profiles`: load one profile resource; empty body on success.
pub async fn load_profile(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match state.validation.load_profile(&body) {
        Ok(()) => (StatusCode::OK, "").into_response(),
        Err(outcome) => outcome_response(StatusCode::OK, &outcome),
    }
}

/// `GET /profiles-by-ig`
pub async fn profiles_by_ig(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, Vec<String>>> {
    Json(state.registry.profiles_by_ig().await)
}

/// `GET /igs`
pub async fn known_igs(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    Json(state.registry.known_igs().await)
}

/// `POST /igs`: load a package archive from the request body.
pub async fn load_package(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Package>, ServiceError> {
    let package = state.registry.load_package(&body).await?;
    Ok(Json(package.as_ref().clone()))
}

#[derive(Debug, Deserialize)]
pub struct LoadIgParams {
    pub version: Option<String>,
}

/// `PUT /igs/{id}?version=`
pub async fn load_ig(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LoadIgParams>,
) -> Result<Json<Package>, ServiceError> {
    let package = state
        .registry
        .load_ig(&id, params.version.as_deref())
        .await?;
    Ok(Json(package.as_ref().clone()))
}

/// `GET /version` while the validator is still loading: only the server's own
/// build version is known yet.
pub async fn version() -> Json<BTreeMap<&'static str, String>> {
    Json(BTreeMap::from([(
        "fhir-validator-server",
        env!("CARGO_PKG_VERSION").to_string(),
    )]))
}

/// `GET /version` once ready: server build version plus the engine's version
/// string.
pub async fn version_ready(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<&'static str, String>> {
    Json(BTreeMap::from([
        (
            "fhir-validator-server",
            env!("CARGO_PKG_VERSION").to_string(),
        ),
        ("engine", state.engine.version()),
    ]))
}
