// crates/evalstream-server/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: Axum router and server bootstrap for the evalstream API.
// Purpose: Map HTTP requests onto [`crate::api::StreamApi`] with audit logging.
// Dependencies: evalstream-config, evalstream-core, evalstream-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! [`StreamServer`] wires configuration into a session registry, identity
//! provider, and audit sink, then serves the JSON API over HTTP. Every handler
//! resolves the current user, runs one [`StreamApi`] call on a blocking-capable
//! thread, records one audit event, and renders either the JSON payload or
//! `{"detail": message}` with the status mapped from the error kind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use bytes::Bytes;
use evalstream_config::DatasetsConfig;
use evalstream_config::EvalStreamConfig;
use evalstream_config::ServerAuditConfig;
use evalstream_config::SessionStoreType;
use evalstream_core::InMemorySessionStore;
use evalstream_core::SessionRegistry;
use evalstream_core::SharedOwnershipMap;
use evalstream_core::SharedSessionStore;
use evalstream_core::StreamError;
use evalstream_core::UserId;
use evalstream_engine::DirectoryDatasetCatalog;
use evalstream_engine::EvaluatorFactory;
use evalstream_engine::Prediction;
use evalstream_engine::SyntheticDatasetCatalog;
use evalstream_store_sqlite::SqliteSessionStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;

use crate::api::StreamApi;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::StreamAuditEvent;
use crate::audit::StreamAuditEventParams;
use crate::audit::StreamAuditSink;
use crate::audit::StreamOperation;
use crate::identity::AccessPolicy;
use crate::identity::IdentityProvider;
use crate::identity::identity_from_config;
use crate::models::CreateStreamRequest;
use crate::models::HealthResponse;
use crate::models::ReadyResponse;
use crate::models::RegisterAlgorithmRequest;

// ============================================================================
// SECTION: Stream Server
// ============================================================================

/// Evalstream HTTP server instance.
pub struct StreamServer {
    /// Parsed bind address.
    bind: SocketAddr,
    /// Session store backend label for the startup notice.
    store_label: &'static str,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl StreamServer {
    /// Builds a new server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StreamServerError`] when validation or initialization fails.
    pub fn from_config(config: EvalStreamConfig) -> Result<Self, StreamServerError> {
        config.validate().map_err(|err| StreamServerError::Config(err.to_string()))?;
        let bind =
            config.server.bind_addr().map_err(|err| StreamServerError::Config(err.to_string()))?;
        let registry = build_registry(&config)?;
        let identity =
            identity_from_config(&config.server.identity).map_err(StreamServerError::Init)?;
        let audit = build_audit_sink(&config.server.audit)?;
        let api = StreamApi::new(
            registry,
            AccessPolicy::from(config.server.ownership),
            config.defaults,
        );
        let store_label = match config.session_store.store_type {
            SessionStoreType::Memory => "memory",
            SessionStoreType::Sqlite => "sqlite",
        };
        let state = Arc::new(ServerState {
            api,
            identity,
            audit,
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(Self {
            bind,
            store_label,
            state,
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Returns the HTTP router over this server's state.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves requests.
    ///
    /// # Errors
    ///
    /// Returns [`StreamServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), StreamServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| StreamServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_listener(listener).await
    }

    /// Serves requests on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`StreamServerError::Transport`] when serving fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), StreamServerError> {
        let local = listener.local_addr().unwrap_or(self.bind);
        emit_startup_notice(local, self.store_label);
        axum::serve(listener, self.router())
            .await
            .map_err(|err| StreamServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Builds the session registry from configuration.
fn build_registry(
    config: &EvalStreamConfig,
) -> Result<SessionRegistry<EvaluatorFactory>, StreamServerError> {
    let factory = build_factory(&config.datasets);
    let (store, ownership) = match config.session_store.store_type {
        SessionStoreType::Memory => {
            let store = InMemorySessionStore::new();
            (SharedSessionStore::from_store(store.clone()), SharedOwnershipMap::from_map(store))
        }
        SessionStoreType::Sqlite => {
            let sqlite_config = config.session_store.sqlite().ok_or_else(|| {
                StreamServerError::Config("sqlite session_store requires path".to_string())
            })?;
            let store = SqliteSessionStore::new(&sqlite_config)
                .map_err(|err| StreamServerError::Init(err.to_string()))?;
            (SharedSessionStore::from_store(store.clone()), SharedOwnershipMap::from_map(store))
        }
    };
    Ok(SessionRegistry::new(factory, store, ownership))
}

/// Builds the evaluator factory over the configured dataset catalog.
fn build_factory(datasets: &DatasetsConfig) -> EvaluatorFactory {
    let allowed = datasets.allowed.iter().cloned();
    match &datasets.dir {
        Some(dir) => {
            EvaluatorFactory::from_catalog(DirectoryDatasetCatalog::new(dir.clone(), allowed))
        }
        None => EvaluatorFactory::from_catalog(SyntheticDatasetCatalog::new(allowed)),
    }
}

/// Builds the audit sink named by configuration.
fn build_audit_sink(
    config: &ServerAuditConfig,
) -> Result<Arc<dyn StreamAuditSink>, StreamServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(FsPath::new(path))
                .map_err(|err| StreamServerError::Init(format!("audit log: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Writes the one-line startup notice to stderr.
fn emit_startup_notice(addr: SocketAddr, store_label: &str) {
    let _ = writeln!(
        io::stderr(),
        "evalstream: listening on http://{addr} (session store: {store_label})"
    );
}

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// Shared state for HTTP handlers.
struct ServerState {
    /// Registry-backed API.
    api: StreamApi,
    /// Current-user resolution.
    identity: Arc<dyn IdentityProvider>,
    /// Request audit sink.
    audit: Arc<dyn StreamAuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Raw identifiers of a request, echoed into audit events.
#[derive(Clone, Copy, Default)]
struct RequestIds<'a> {
    /// Stream path segment.
    stream_id: Option<&'a str>,
    /// Algorithm path segment.
    algorithm_id: Option<&'a str>,
}

impl<'a> RequestIds<'a> {
    /// Identifiers of a stream-scoped route.
    const fn stream(stream_id: &'a str) -> Self {
        Self {
            stream_id: Some(stream_id),
            algorithm_id: None,
        }
    }

    /// Identifiers of an algorithm-scoped route.
    const fn algorithm(stream_id: &'a str, algorithm_id: &'a str) -> Self {
        Self {
            stream_id: Some(stream_id),
            algorithm_id: Some(algorithm_id),
        }
    }
}

impl ServerState {
    /// Resolves the caller, runs `call`, records the audit event, and renders.
    fn respond<T: Serialize>(
        &self,
        operation: StreamOperation,
        ids: RequestIds<'_>,
        headers: &HeaderMap,
        call: impl FnOnce(&StreamApi, Option<&UserId>) -> Result<T, ApiError>,
    ) -> Response {
        let caller = self.identity.current_user(headers);
        let user_id = caller.as_ref().ok().and_then(|user| user.as_ref()).map(ToString::to_string);
        let result = match caller {
            Ok(caller) => run_blocking(|| call(&self.api, caller.as_ref())),
            Err(err) => Err(ApiError::from(err)),
        };
        let (status, error_kind) = match &result {
            Ok(_) => (StatusCode::OK, None),
            Err(err) => (err.status, Some(err.kind)),
        };
        self.audit.record(&StreamAuditEvent::new(StreamAuditEventParams {
            operation,
            stream_id: ids.stream_id.map(str::to_string),
            algorithm_id: ids.algorithm_id.map(str::to_string),
            user_id,
            status: status.as_u16(),
            error_kind,
        }));
        match result {
            Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
            Err(err) => err.into_response(),
        }
    }

    /// Buffers a request body, stopping at the configured size limit.
    async fn read_body(&self, body: Body) -> Result<Bytes, ApiError> {
        axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|_| ApiError::body_too_large(self.max_body_bytes))
    }
}

/// Decodes a buffered JSON body.
fn decode<T: DeserializeOwned>(body: Result<Bytes, ApiError>) -> Result<T, ApiError> {
    serde_json::from_slice(&body?)
        .map_err(|err| ApiError::from(StreamError::UnprocessableRequest(err.to_string())))
}

/// Executes a registry call, shifting to a blocking context when available.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the API router.
fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ready", get(ready))
        .route("/streams", post(create_stream))
        .route("/streams/user", get(user_streams))
        .route("/streams/{stream_id}/status", get(stream_status))
        .route("/streams/{stream_id}/settings", get(stream_settings))
        .route("/streams/{stream_id}/start", post(start_stream))
        .route("/streams/{stream_id}/check_access", get(check_access))
        .route("/streams/{stream_id}/metrics", get(metrics))
        .route("/streams/{stream_id}/algorithms", post(register_algorithm))
        .route("/streams/{stream_id}/algorithms/state", get(algorithm_states))
        .route("/streams/{stream_id}/algorithms/{algorithm_id}/state", get(algorithm_state))
        .route(
            "/streams/{stream_id}/algorithms/{algorithm_id}/is-completed",
            get(algorithm_completed),
        )
        .route(
            "/streams/{stream_id}/algorithms/{algorithm_id}/training-data",
            get(training_data),
        )
        .route(
            "/streams/{stream_id}/algorithms/{algorithm_id}/unlabeled-data",
            get(unlabeled_data),
        )
        .route(
            "/streams/{stream_id}/algorithms/{algorithm_id}/predictions",
            post(submit_prediction),
        )
        .with_state(state)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /`.
async fn health(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.respond(StreamOperation::Health, RequestIds::default(), &headers, |_, _| {
        Ok(HealthResponse::HEALTHY)
    })
}

/// `GET /ready`.
async fn ready(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.respond(StreamOperation::Ready, RequestIds::default(), &headers, |api, _| {
        api.readiness().map_err(ApiError::unavailable)?;
        Ok(ReadyResponse::READY)
    })
}

/// `POST /streams`.
async fn create_stream(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let body = state.read_body(body).await;
    state.respond(StreamOperation::CreateStream, RequestIds::default(), &headers, |api, caller| {
        let request: CreateStreamRequest = decode(body)?;
        Ok(api.create_stream(caller, request)?)
    })
}

/// `GET /streams/user`.
async fn user_streams(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.respond(StreamOperation::UserStreams, RequestIds::default(), &headers, |api, caller| {
        Ok(api.user_streams(caller)?)
    })
}

/// `GET /streams/{stream_id}/status`.
async fn stream_status(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::StreamStatus, ids, &headers, |api, caller| {
        Ok(api.stream_status(caller, &stream_id)?)
    })
}

/// `GET /streams/{stream_id}/settings`.
async fn stream_settings(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::StreamSettings, ids, &headers, |api, caller| {
        Ok(api.stream_settings(caller, &stream_id)?)
    })
}

/// `POST /streams/{stream_id}/start`.
async fn start_stream(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::StartStream, ids, &headers, |api, caller| {
        Ok(api.start_stream(caller, &stream_id)?)
    })
}

/// `GET /streams/{stream_id}/check_access`.
async fn check_access(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::CheckAccess, ids, &headers, |api, caller| {
        Ok(api.check_access(caller, &stream_id)?)
    })
}

/// `GET /streams/{stream_id}/metrics`.
async fn metrics(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::Metrics, ids, &headers, |api, caller| {
        Ok(api.metrics(caller, &stream_id)?)
    })
}

/// `POST /streams/{stream_id}/algorithms`.
async fn register_algorithm(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let body = state.read_body(body).await;
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::RegisterAlgorithm, ids, &headers, |api, caller| {
        let request: RegisterAlgorithmRequest = decode(body)?;
        Ok(api.register_algorithm(caller, &stream_id, &request)?)
    })
}

/// `GET /streams/{stream_id}/algorithms/state`.
async fn algorithm_states(
    State(state): State<Arc<ServerState>>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::stream(&stream_id);
    state.respond(StreamOperation::AlgorithmStates, ids, &headers, |api, caller| {
        Ok(api.algorithm_states(caller, &stream_id)?)
    })
}

/// `GET /streams/{stream_id}/algorithms/{algorithm_id}/state`.
async fn algorithm_state(
    State(state): State<Arc<ServerState>>,
    Path((stream_id, algorithm_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::algorithm(&stream_id, &algorithm_id);
    state.respond(StreamOperation::AlgorithmState, ids, &headers, |api, caller| {
        Ok(api.algorithm_state(caller, &stream_id, &algorithm_id)?)
    })
}

/// `GET /streams/{stream_id}/algorithms/{algorithm_id}/is-completed`.
async fn algorithm_completed(
    State(state): State<Arc<ServerState>>,
    Path((stream_id, algorithm_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::algorithm(&stream_id, &algorithm_id);
    state.respond(StreamOperation::AlgorithmCompleted, ids, &headers, |api, caller| {
        Ok(api.algorithm_completed(caller, &stream_id, &algorithm_id)?)
    })
}

/// `GET /streams/{stream_id}/algorithms/{algorithm_id}/training-data`.
async fn training_data(
    State(state): State<Arc<ServerState>>,
    Path((stream_id, algorithm_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::algorithm(&stream_id, &algorithm_id);
    state.respond(StreamOperation::TrainingData, ids, &headers, |api, caller| {
        Ok(api.training_data(caller, &stream_id, &algorithm_id)?)
    })
}

/// `GET /streams/{stream_id}/algorithms/{algorithm_id}/unlabeled-data`.
async fn unlabeled_data(
    State(state): State<Arc<ServerState>>,
    Path((stream_id, algorithm_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ids = RequestIds::algorithm(&stream_id, &algorithm_id);
    state.respond(StreamOperation::UnlabeledData, ids, &headers, |api, caller| {
        Ok(api.unlabeled_data(caller, &stream_id, &algorithm_id)?)
    })
}

/// `POST /streams/{stream_id}/algorithms/{algorithm_id}/predictions`.
async fn submit_prediction(
    State(state): State<Arc<ServerState>>,
    Path((stream_id, algorithm_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let body = state.read_body(body).await;
    let ids = RequestIds::algorithm(&stream_id, &algorithm_id);
    state.respond(StreamOperation::SubmitPrediction, ids, &headers, |api, caller| {
        let prediction: Prediction = decode(body)?;
        Ok(api.submit_prediction(caller, &stream_id, &algorithm_id, &prediction)?)
    })
}

// ============================================================================
// SECTION: Error Rendering
// ============================================================================

/// Error body rendered by every failing endpoint.
#[derive(Debug, Serialize)]
struct DetailBody {
    /// Human-readable message.
    detail: String,
}

/// HTTP-level failure: status, audit kind, and detail message.
#[derive(Debug)]
struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Stable kind label for audit events.
    kind: &'static str,
    /// Message rendered as `detail`.
    detail: String,
}

impl ApiError {
    /// Request body above the configured limit.
    fn body_too_large(limit: usize) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            kind: "payload_too_large",
            detail: format!("request body exceeds {limit} bytes"),
        }
    }

    /// Readiness failure rendered as 503.
    fn unavailable(error: StreamError) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            kind: error.kind(),
            detail: error.to_string(),
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(error: StreamError) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            kind: error.kind(),
            detail: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(DetailBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server bootstrap errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
