//! Handler for the path evaluation route.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::services::AppState;

use super::outcome_response;

#[derive(Debug, Deserialize)]
pub struct EvaluateParams {
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub type_descriptor: Option<String>,
}

/// `POST /evaluate?path=&type=`
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EvaluateParams>,
    body: String,
) -> Response {
    match state.fhirpath.evaluate(
        &body,
        params.path.as_deref(),
        params.type_descriptor.as_deref(),
    ) {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(outcome) => outcome_response(StatusCode::OK, &outcome),
    }
}
