// crates/evalstream-server/src/models.rs
// ============================================================================
// Module: API Models
// Description: Request and response payloads of the evalstream HTTP API.
// Purpose: Pin the JSON wire shapes separately from engine types.
// Dependencies: evalstream-core, evalstream-engine, serde
// ============================================================================

//! ## Overview
//! Wire payloads for every endpoint. Engine results are converted into these
//! shapes at the API boundary so the JSON contract does not drift when engine
//! types change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use evalstream_config::WindowDefaults;
use evalstream_core::AlgorithmId;
use evalstream_core::AlgorithmState;
use evalstream_core::StreamId;
use evalstream_core::StreamStatus;
use evalstream_engine::AlgorithmHandle;
use evalstream_engine::DataRelease;
use evalstream_engine::EvaluatorConfig;
use evalstream_engine::Interaction;
use evalstream_engine::MetricKind;
use evalstream_engine::MetricReport;
use evalstream_engine::SettingKind;
use evalstream_engine::SettingParams;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Stream Management
// ============================================================================

/// `POST /streams` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStreamRequest {
    /// Dataset identifier.
    pub dataset_id: String,
    /// Ranking cut-off K.
    pub top_k: usize,
    /// Metrics to compute.
    pub metrics: Vec<MetricKind>,
    /// Background cut-off; configured default when omitted.
    #[serde(default)]
    pub background_t: Option<i64>,
    /// Window length in seconds; configured default when omitted.
    #[serde(default)]
    pub window_size: Option<i64>,
    /// Masked rows per user; configured default when omitted.
    #[serde(default)]
    pub n_seq_data: Option<usize>,
    /// Window layout; sliding window when omitted.
    #[serde(default)]
    pub setting: Option<SettingKind>,
}

impl CreateStreamRequest {
    /// Resolves omitted window parameters against `defaults`.
    #[must_use]
    pub fn into_config(self, defaults: &WindowDefaults) -> EvaluatorConfig {
        EvaluatorConfig {
            dataset_id: self.dataset_id,
            top_k: self.top_k,
            metrics: self.metrics,
            setting: SettingParams {
                kind: self.setting.unwrap_or_default(),
                background_t: self.background_t.unwrap_or(defaults.background_t),
                window_size: self.window_size.unwrap_or(defaults.window_size),
                n_seq_data: self.n_seq_data.unwrap_or(defaults.n_seq_data),
            },
        }
    }
}

/// `POST /streams` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStreamResponse {
    /// Identifier of the new stream.
    pub evaluator_stream_id: StreamId,
}

/// Derived status of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatusResponse {
    /// Stream identifier.
    pub stream_id: StreamId,
    /// Derived status.
    pub status: StreamStatus,
}

/// Boolean acknowledgement of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    /// Always `true` on success.
    pub status: bool,
}

impl OperationStatus {
    /// Successful acknowledgement.
    pub const OK: Self = Self {
        status: true,
    };
}

// ============================================================================
// SECTION: Algorithm Management
// ============================================================================

/// `POST /streams/{id}/algorithms` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAlgorithmRequest {
    /// Caller-supplied label.
    pub algorithm_name: String,
}

/// `POST /streams/{id}/algorithms` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAlgorithmResponse {
    /// Identifier of the new participant.
    pub algorithm_uuid: AlgorithmId,
}

/// State of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmStateResponse {
    /// Current state.
    pub algorithm_state: AlgorithmState,
}

/// One row of the all-participants state listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmSummary {
    /// Participant identifier.
    pub algorithm_uuid: AlgorithmId,
    /// Participant label.
    pub algorithm_name: String,
    /// Current state.
    pub state: AlgorithmState,
}

impl From<&AlgorithmHandle> for AlgorithmSummary {
    fn from(handle: &AlgorithmHandle) -> Self {
        Self {
            algorithm_uuid: handle.id,
            algorithm_name: handle.name.clone(),
            state: handle.state,
        }
    }
}

// ============================================================================
// SECTION: Data Handling
// ============================================================================

/// Labeled rows released to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingDataResponse {
    /// Stream-wide `[n_users, n_items]`.
    pub shape: [usize; 2],
    /// Released rows.
    pub training_data: Vec<Interaction>,
}

impl From<DataRelease> for TrainingDataResponse {
    fn from(release: DataRelease) -> Self {
        Self {
            shape: release.shape,
            training_data: release.rows,
        }
    }
}

/// Masked rows a participant must predict for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlabeledDataResponse {
    /// Stream-wide `[n_users, n_items]`.
    pub shape: [usize; 2],
    /// Masked rows.
    pub unlabeled_data: Vec<Interaction>,
}

impl From<DataRelease> for UnlabeledDataResponse {
    fn from(release: DataRelease) -> Self {
        Self {
            shape: release.shape,
            unlabeled_data: release.rows,
        }
    }
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Micro-averaged row on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroMetricRow {
    /// Participant label.
    pub algorithm_name: String,
    /// Participant identifier.
    pub algorithm_id: AlgorithmId,
    /// Metric label, e.g. `PrecisionK_10`.
    pub metric: String,
    /// Total score over total users.
    pub micro_score: f64,
    /// Users scored.
    pub num_user: usize,
}

/// Macro-averaged row on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroMetricRow {
    /// Participant label.
    pub algorithm_name: String,
    /// Participant identifier.
    pub algorithm_id: AlgorithmId,
    /// Metric label, e.g. `PrecisionK_10`.
    pub metric: String,
    /// Mean of per-window means.
    pub macro_score: f64,
    /// Windows scored.
    pub num_window: usize,
}

/// `GET /streams/{id}/metrics` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Micro rows.
    pub micro_metrics: Vec<MicroMetricRow>,
    /// Macro rows.
    pub macro_metrics: Vec<MacroMetricRow>,
}

impl From<MetricReport> for MetricsResponse {
    fn from(report: MetricReport) -> Self {
        let micro_metrics = report
            .micro_metrics
            .into_iter()
            .map(|row| MicroMetricRow {
                algorithm_name: row.algorithm.name,
                algorithm_id: row.algorithm.id,
                metric: row.metric,
                micro_score: row.micro_score,
                num_user: row.num_user,
            })
            .collect();
        let macro_metrics = report
            .macro_metrics
            .into_iter()
            .map(|row| MacroMetricRow {
                algorithm_name: row.algorithm.name,
                algorithm_id: row.algorithm.id,
                metric: row.metric,
                macro_score: row.macro_score,
                num_window: row.num_window,
            })
            .collect();
        Self {
            micro_metrics,
            macro_metrics,
        }
    }
}

// ============================================================================
// SECTION: Health Checks
// ============================================================================

/// `GET /` healthcheck body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always `HEALTHY`.
    #[serde(rename = "Server is running, STATUS")]
    pub status: &'static str,
}

impl HealthResponse {
    /// The only healthcheck body.
    pub const HEALTHY: Self = Self {
        status: "HEALTHY",
    };
}

/// `GET /ready` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadyResponse {
    /// Always `ready`.
    pub status: &'static str,
}

impl ReadyResponse {
    /// The only readiness body.
    pub const READY: Self = Self {
        status: "ready",
    };
}
