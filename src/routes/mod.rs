//! HTTP route handlers.

pub mod conversion;
pub mod fhirpath;
pub mod validation;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::diagnostics::Diagnostics;

/// Render a diagnostic document as a FHIR JSON response.
///
/// If even the outcome cannot be serialized, a minimal quoted JSON string is
/// returned instead of failing the worker.
pub fn outcome_response(status: StatusCode, outcome: &Diagnostics) -> Response {
    match serde_json::to_string(outcome) {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "application/fhir+json")],
            body,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "application/json")],
            format!("\"Diagnostic document could not be serialized: {err}\""),
        )
            .into_response(),
    }
}
