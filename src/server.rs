//! Server assembly and the startup gate.
//!
//! The gate is a swappable route table: the listener starts serving a
//! placeholder table immediately, initialization runs in the background, and
//! once it finishes the fully-built ready table replaces the placeholder in
//! one atomic store. The transition happens exactly once per process and no
//! request is ever dispatched against a partially registered table.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use tower::Service;
use tower::ServiceExt;
use tower::make::Shared;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::diagnostics::{Diagnostics, IssueKind, Severity};
use crate::error::Result;
use crate::routes;
use crate::routes::outcome_response;
use crate::services::AppState;

/// The swappable route table.
///
/// Cloning is cheap and every clone observes the same table; `install`
/// replaces the table for all of them at once.
#[derive(Clone)]
pub struct RouteTable {
    inner: Arc<std::sync::RwLock<Router>>,
}

impl RouteTable {
    /// A table serving only the placeholder routes.
    pub fn loading() -> Self {
        Self {
            inner: Arc::new(std::sync::RwLock::new(loading_router())),
        }
    }

    /// Atomically replace the current table. The router passed in is fully
    /// built before the store happens.
    pub fn install(&self, router: Router) {
        *self.inner.write().expect("route table lock") = router;
    }
}

impl Service<Request<Body>> for RouteTable {
    type Response = Response;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Browsers preflight-check CORS with OPTIONS; answer 200 with the
        // permissive headers for any path, in either lifecycle state.
        if req.method() == Method::OPTIONS {
            let response = preflight_response();
            return Box::pin(async move { Ok(response) });
        }
        let router = self.inner.read().expect("route table lock").clone();
        Box::pin(async move { router.oneshot(req).await })
    }
}

fn preflight_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, PUT, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
        "",
    )
        .into_response()
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any)
}

/// The placeholder table served while the engine initializes: every route
/// except the version route answers 503 with a single-ERROR outcome.
pub fn loading_router() -> Router {
    Router::new()
        .route("/version", get(routes::validation::version))
        .fallback(still_loading)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

async fn still_loading() -> Response {
    let outcome = Diagnostics::single(
        Severity::Error,
        IssueKind::Processing,
        "Validation service is still loading",
    );
    outcome_response(StatusCode::SERVICE_UNAVAILABLE, &outcome)
}

/// The full route table.
pub fn ready_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/validate", post(routes::validation::validate))
        .route("/resources", get(routes::validation::resources))
        .route(
            "/profiles",
            get(routes::validation::profiles).post(routes::validation::load_profile),
        )
        .route("/profiles-by-ig", get(routes::validation::profiles_by_ig))
        .route(
            "/igs",
            get(routes::validation::known_igs).post(routes::validation::load_package),
        )
        .route("/igs/:id", put(routes::validation::load_ig))
        .route("/version", get(routes::validation::version_ready))
        .route("/evaluate", post(routes::fhirpath::evaluate))
        .route("/transform", post(routes::conversion::transform))
        .fallback(no_such_route)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

async fn no_such_route() -> Response {
    let outcome = Diagnostics::single(
        Severity::Error,
        IssueKind::NotFound,
        "No such route",
    );
    outcome_response(StatusCode::NOT_FOUND, &outcome)
}

/// Last-resort handler: a panic anywhere in a handler becomes best-effort
/// diagnostic JSON instead of a dead connection.
fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    let outcome = Diagnostics::fatal(format!("Unhandled internal error: {detail}"));
    let body = serde_json::to_string(&outcome)
        .unwrap_or_else(|_| format!("\"Unhandled internal error: {detail}\""));
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/fhir+json")
        .body(Body::from(body))
        .expect("static response")
}

/// Bind, serve the loading table, initialize in the background, and swap to
/// the ready table when initialization finishes. Initialization failure is
/// fatal for the process.
pub async fn run(config: ServerConfig) -> Result<()> {
    let table = RouteTable::loading();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening, validator loading");

    {
        let table = table.clone();
        let config = config.clone();
        tokio::spawn(async move {
            match AppState::initialize(config).await {
                Ok(state) => {
                    table.install(ready_router(Arc::new(state)));
                    info!("validator ready");
                }
                Err(err) => {
                    error!(error = %err, "validator initialization failed");
                    std::process::exit(1);
                }
            }
        });
    }

    axum::serve(listener, Shared::new(table)).await?;
    Ok(())
}

/// The `prepare` mode: run initialization so the engine artifacts and package
/// caches are warm, then return.
pub async fn prepare(config: ServerConfig) -> Result<()> {
    let state = AppState::initialize(config).await?;
    info!(
        resources = state.engine.resource_names().len(),
        "validator artifacts prepared"
    );
    Ok(())
}
