//! Handler for the transcoding route.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::services::AppState;

use super::outcome_response;

#[derive(Debug, Deserialize)]
pub struct TransformParams {
    pub direction: Option<String>,
    pub fhir_version: Option<String>,
}

/// `POST /transform?direction=&fhir_version=`
pub async fn transform(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransformParams>,
    body: String,
) -> Response {
    match state.conversion.transform(
        &body,
        params.direction.as_deref(),
        params.fhir_version.as_deref(),
    ) {
        Ok(converted) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, converted.content_type)],
            converted.body,
        )
            .into_response(),
        Err(outcome) => outcome_response(StatusCode::OK, &outcome),
    }
}
