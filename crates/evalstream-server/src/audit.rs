// crates/evalstream-server/src/audit.rs
// ============================================================================
// Module: Request Audit Logging
// Description: Structured audit events for evalstream API requests.
// Purpose: Emit one JSON line per request without logging payloads.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every API request produces one [`StreamAuditEvent`] delivered to a
//! [`StreamAuditSink`]. Events carry identifiers, outcome, and error kind only;
//! training data and predictions are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// API operation classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOperation {
    /// `GET /`.
    Health,
    /// `GET /ready`.
    Ready,
    /// `POST /streams`.
    CreateStream,
    /// `GET /streams/{id}/status`.
    StreamStatus,
    /// `GET /streams/user`.
    UserStreams,
    /// `GET /streams/{id}/settings`.
    StreamSettings,
    /// `POST /streams/{id}/start`.
    StartStream,
    /// `GET /streams/{id}/check_access`.
    CheckAccess,
    /// `POST /streams/{id}/algorithms`.
    RegisterAlgorithm,
    /// `GET /streams/{id}/algorithms/{aid}/state`.
    AlgorithmState,
    /// `GET /streams/{id}/algorithms/state`.
    AlgorithmStates,
    /// `GET /streams/{id}/algorithms/{aid}/is-completed`.
    AlgorithmCompleted,
    /// `GET /streams/{id}/algorithms/{aid}/training-data`.
    TrainingData,
    /// `GET /streams/{id}/algorithms/{aid}/unlabeled-data`.
    UnlabeledData,
    /// `POST /streams/{id}/algorithms/{aid}/predictions`.
    SubmitPrediction,
    /// `GET /streams/{id}/metrics`.
    Metrics,
}

/// Request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    /// 2xx response.
    Ok,
    /// Any error response.
    Error,
}

/// Audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct StreamAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation performed.
    pub operation: StreamOperation,
    /// Stream identifier as supplied by the caller.
    pub stream_id: Option<String>,
    /// Algorithm identifier as supplied by the caller.
    pub algorithm_id: Option<String>,
    /// Current user, if any.
    pub user_id: Option<String>,
    /// Request outcome.
    pub outcome: StreamOutcome,
    /// HTTP status returned.
    pub status: u16,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Inputs required to construct an audit event.
pub struct StreamAuditEventParams {
    /// Operation performed.
    pub operation: StreamOperation,
    /// Stream identifier as supplied by the caller.
    pub stream_id: Option<String>,
    /// Algorithm identifier as supplied by the caller.
    pub algorithm_id: Option<String>,
    /// Current user, if any.
    pub user_id: Option<String>,
    /// HTTP status returned.
    pub status: u16,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

impl StreamAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: StreamAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        let outcome = if params.error_kind.is_none() && params.status < 400 {
            StreamOutcome::Ok
        } else {
            StreamOutcome::Error
        };
        Self {
            event: "stream_request",
            timestamp_ms,
            operation: params.operation,
            stream_id: params.stream_id,
            algorithm_id: params.algorithm_id,
            user_id: params.user_id,
            outcome,
            status: params.status,
            error_kind: params.error_kind,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for request events.
pub trait StreamAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &StreamAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StreamAuditSink for StderrAuditSink {
    fn record(&self, event: &StreamAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl StreamAuditSink for FileAuditSink {
    fn record(&self, event: &StreamAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl StreamAuditSink for NoopAuditSink {
    fn record(&self, _event: &StreamAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
