//! Service-wide error type and its HTTP mapping.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::diagnostics::{Diagnostics, Severity};

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors produced by the service layer.
///
/// Only [`ServiceError::PackageNotFound`] is an expected, typed failure that
/// crosses a facade boundary; everything else is converted into a diagnostic
/// document before it reaches the transport layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("package {id}#{version} was not found locally or in the package registry")]
    PackageNotFound { id: String, version: String },

    #[error("unsupported element type '{0}'")]
    UnsupportedElementType(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("engine failure: {0}")]
    Engine(String),

    #[error("package archive error: {0}")]
    Archive(String),

    #[error("package source error: {0}")]
    Source(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status for this error.
    ///
    /// Client input problems and engine failures deliberately map to 200: the
    /// response body is a diagnostic document, not a transport failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::PackageNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::UnsupportedElementType(_)
            | ServiceError::InvalidInput(_)
            | ServiceError::Engine(_)
            | ServiceError::Archive(_)
            | ServiceError::Json(_)
            | ServiceError::Xml(_) => StatusCode::OK,
            ServiceError::Source(_) | ServiceError::Http(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Io(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Issue severity used when rendering this error as a diagnostic document.
    pub fn severity(&self) -> Severity {
        match self {
            ServiceError::Engine(_) | ServiceError::Internal(_) | ServiceError::Io(_) => {
                Severity::Fatal
            }
            _ => Severity::Error,
        }
    }
}

impl From<quick_xml::Error> for ServiceError {
    fn from(err: quick_xml::Error) -> Self {
        ServiceError::Xml(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::error!(error = %self, status = %status, "request failed");

        let outcome = Diagnostics::from_error(&self);
        match serde_json::to_string(&outcome) {
            Ok(body) => (
                status,
                [(header::CONTENT_TYPE, "application/fhir+json")],
                body,
            )
                .into_response(),
            // Should never happen; return a minimal JSON literal instead of
            // failing the worker.
            Err(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(format!("Error response could not be serialized: {self}")),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_not_found_maps_to_404() {
        let err = ServiceError::PackageNotFound {
            id: "hl7.fhir.us.core".to_string(),
            version: "*".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn client_input_errors_keep_http_200() {
        assert_eq!(
            ServiceError::InvalidInput("bad parameter".into()).status_code(),
            StatusCode::OK
        );
        assert_eq!(
            ServiceError::UnsupportedElementType("Foo".into()).status_code(),
            StatusCode::OK
        );
    }

    #[test]
    fn engine_failures_are_fatal() {
        assert_eq!(
            ServiceError::Engine("exploded".into()).severity(),
            Severity::Fatal
        );
    }
}
