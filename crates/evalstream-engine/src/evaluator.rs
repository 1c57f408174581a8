// crates/evalstream-engine/src/evaluator.rs
// ============================================================================
// Module: Evalstream Evaluator Stream
// Description: The evaluation session object and its factory.
// Purpose: Drive algorithm participants through windows and score predictions.
// Dependencies: evalstream-core, serde, crate::{dataset, metric, prediction, setting}
// ============================================================================

//! ## Overview
//! [`EvaluatorStream`] is the session object persisted by the registry. Its
//! durable part ([`StreamState`]) holds the configuration, the interaction
//! frame, the started flag, and every algorithm handle with its window
//! cursor and accumulated scores. The window split is transient: `freeze`
//! drops it and `thaw` recomputes it from the stored frame.
//!
//! Algorithm participants follow the core state machine:
//! - training data: `NEW -> READY` (background), `PREDICTED -> READY`
//!   (previous window's ground truth, cursor advanced), `READY` re-releases;
//! - unlabeled data: only in `READY`;
//! - prediction: `READY -> PREDICTED`, or `READY -> COMPLETED` on the last
//!   window.
//!
//! Ordering violations are [`StreamError::IllegalTransition`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use evalstream_core::AlgorithmId;
use evalstream_core::AlgorithmKey;
use evalstream_core::AlgorithmState;
use evalstream_core::ConstructionPhase;
use evalstream_core::SerializationError;
use evalstream_core::SessionFactory;
use evalstream_core::SessionLifecycle;
use evalstream_core::StateBlob;
use evalstream_core::StreamError;
use evalstream_core::StreamSession;
use evalstream_core::StreamStatus;
use serde::Deserialize;
use serde::Serialize;

use crate::dataset::DatasetCatalog;
use crate::dataset::DatasetError;
use crate::dataset::Interaction;
use crate::dataset::InteractionFrame;
use crate::metric::MetricKind;
use crate::metric::WindowScore;
use crate::metric::macro_average;
use crate::metric::micro;
use crate::prediction::Prediction;
use crate::setting::SettingKind;
use crate::setting::SettingParams;
use crate::setting::WindowSplit;
use crate::setting::split;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version of the frozen session payload.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Maximum algorithm name length in bytes.
pub const MAX_ALGORITHM_NAME_BYTES: usize = 256;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Configuration of a new evaluation stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Dataset identifier.
    pub dataset_id: String,
    /// Ranking cut-off K.
    pub top_k: usize,
    /// Metrics to compute, in report order.
    pub metrics: Vec<MetricKind>,
    /// Window split parameters.
    pub setting: SettingParams,
}

/// One registered algorithm participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmHandle {
    /// Participant identifier.
    pub id: AlgorithmId,
    /// Caller-supplied label.
    pub name: String,
    /// Current state.
    pub state: AlgorithmState,
    /// Index of the window currently being predicted.
    cursor: usize,
    /// Scores accumulated per window and metric.
    scores: Vec<WindowScore>,
}

impl AlgorithmHandle {
    /// Returns the structured key of this participant.
    #[must_use]
    pub fn key(&self) -> AlgorithmKey {
        AlgorithmKey {
            name: self.name.clone(),
            id: self.id,
        }
    }

    /// Moves to `next`, tagging a rejection with the operation name.
    fn advance(&mut self, next: AlgorithmState, operation: &str) -> Result<(), StreamError> {
        self.state = self
            .state
            .transition(next)
            .map_err(|err| StreamError::IllegalTransition(format!("{operation}: {err}")))?;
        Ok(())
    }
}

/// Durable part of an evaluation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StreamState {
    /// Creation configuration.
    config: EvaluatorConfig,
    /// Full interaction log.
    frame: InteractionFrame,
    /// Whether the run has been started.
    started: bool,
    /// Participants in registration order.
    algorithms: Vec<AlgorithmHandle>,
}

/// Data released to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRelease {
    /// Stream-wide `[n_users, n_items]`.
    pub shape: [usize; 2],
    /// Released rows.
    pub rows: Vec<Interaction>,
}

/// Micro-averaged metric row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicroMetric {
    /// Participant.
    pub algorithm: AlgorithmKey,
    /// Metric label, e.g. `PrecisionK_10`.
    pub metric: String,
    /// Total score over total users.
    pub micro_score: f64,
    /// Users scored across all windows.
    pub num_user: usize,
}

/// Macro-averaged metric row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroMetric {
    /// Participant.
    pub algorithm: AlgorithmKey,
    /// Metric label, e.g. `PrecisionK_10`.
    pub metric: String,
    /// Mean of per-window means.
    pub macro_score: f64,
    /// Windows scored.
    pub num_window: usize,
}

/// Micro and macro views of every scored participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricReport {
    /// Micro rows.
    pub micro_metrics: Vec<MicroMetric>,
    /// Macro rows.
    pub macro_metrics: Vec<MacroMetric>,
}

/// Configuration echo of a sliding-window stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    /// Dataset identifier.
    pub dataset_id: String,
    /// Ranking cut-off K.
    pub top_k: usize,
    /// Configured metrics.
    pub metrics: Vec<MetricKind>,
    /// Background cut-off.
    pub background_t: i64,
    /// Window length in seconds.
    pub window_size: i64,
    /// Masked rows per user per window.
    pub n_seq_data: usize,
    /// Evaluation windows in the split.
    pub number_of_windows: usize,
    /// Furthest window any participant has reached.
    pub current_window: usize,
}

// ============================================================================
// SECTION: Evaluator Stream
// ============================================================================

/// An evaluation session: durable state plus the rebuilt window split.
#[derive(Debug, Clone)]
pub struct EvaluatorStream {
    /// Durable state.
    state: StreamState,
    /// Transient split derived from `state.frame`.
    split: WindowSplit,
}

impl EvaluatorStream {
    /// Builds a session from configuration and a loaded frame.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::DomainConstruction`] naming the phase that
    /// failed: the window split, the metric list and cut-off, or the frame
    /// indexing.
    pub fn assemble(config: EvaluatorConfig, frame: InteractionFrame) -> Result<Self, StreamError> {
        let split = split(frame.rows(), &config.setting)
            .map_err(|err| StreamError::construction(ConstructionPhase::Setting, err.to_string()))?;
        if config.metrics.is_empty() {
            return Err(StreamError::construction(
                ConstructionPhase::Metrics,
                "at least one metric is required",
            ));
        }
        for (index, metric) in config.metrics.iter().enumerate() {
            if config.metrics[..index].contains(metric) {
                return Err(StreamError::construction(
                    ConstructionPhase::Metrics,
                    format!("duplicate metric {metric}"),
                ));
            }
        }
        if config.top_k == 0 {
            return Err(StreamError::construction(
                ConstructionPhase::Metrics,
                "top_k must be greater than zero",
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(row) = frame.rows().iter().find(|row| !seen.insert(row.interactionid)) {
            return Err(StreamError::construction(
                ConstructionPhase::Engine,
                format!("duplicate interactionid {}", row.interactionid),
            ));
        }
        Ok(Self {
            state: StreamState {
                config,
                frame,
                started: false,
                algorithms: Vec::new(),
            },
            split,
        })
    }

    /// Returns the creation configuration.
    #[must_use]
    pub const fn config(&self) -> &EvaluatorConfig {
        &self.state.config
    }

    /// Returns the number of evaluation windows.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.split.windows.len()
    }

    /// Starts the run.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::IllegalTransition`] when already started.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.state.started {
            return Err(StreamError::IllegalTransition(
                "Error Starting Stream: stream has already started".to_string(),
            ));
        }
        self.state.started = true;
        Ok(())
    }

    /// Registers a new participant in state `NEW`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] for an empty or overlong name
    /// and [`StreamError::IllegalTransition`] once the stream is completed.
    pub fn register_algorithm(&mut self, name: &str) -> Result<AlgorithmId, StreamError> {
        if name.trim().is_empty() {
            return Err(StreamError::InvalidRequest(
                "algorithm_name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_ALGORITHM_NAME_BYTES {
            return Err(StreamError::InvalidRequest(format!(
                "algorithm_name exceeds {MAX_ALGORITHM_NAME_BYTES} bytes"
            )));
        }
        if self.status() == StreamStatus::Completed {
            return Err(StreamError::IllegalTransition(
                "Error registering algorithm: stream has completed".to_string(),
            ));
        }
        let mut id = AlgorithmId::new_v4();
        while self.state.algorithms.iter().any(|handle| handle.id == id) {
            id = AlgorithmId::new_v4();
        }
        self.state.algorithms.push(AlgorithmHandle {
            id,
            name: name.to_string(),
            state: AlgorithmState::New,
            cursor: 0,
            scores: Vec::new(),
        });
        Ok(id)
    }

    /// Releases training data and moves the participant to `READY`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlgorithmNotFound`] for an unknown participant
    /// and [`StreamError::IllegalTransition`] before start or after
    /// completion.
    pub fn training_data(&mut self, id: &AlgorithmId) -> Result<DataRelease, StreamError> {
        const OPERATION: &str = "Error Getting Training Data";
        self.ensure_started(OPERATION)?;
        let handle = find_mut(&mut self.state.algorithms, id)?;
        match handle.state {
            AlgorithmState::Ready => {}
            AlgorithmState::Predicted => {
                handle.cursor += 1;
                handle.advance(AlgorithmState::Ready, OPERATION)?;
            }
            AlgorithmState::New | AlgorithmState::Completed => {
                handle.advance(AlgorithmState::Ready, OPERATION)?;
            }
        }
        let cursor = handle.cursor;
        let rows = match cursor.checked_sub(1) {
            None => self.split.background.clone(),
            Some(previous) => self
                .split
                .windows
                .get(previous)
                .map(|window| window.ground_truth.clone())
                .ok_or_else(|| StreamError::Engine(format!("{OPERATION}: window out of range")))?,
        };
        Ok(self.release(rows))
    }

    /// Returns the masked rows of the participant's current window.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlgorithmNotFound`] for an unknown participant
    /// and [`StreamError::IllegalTransition`] unless it is `READY`.
    pub fn unlabeled_data(&self, id: &AlgorithmId) -> Result<DataRelease, StreamError> {
        const OPERATION: &str = "Error Getting Unlabeled Data";
        self.ensure_started(OPERATION)?;
        let handle = find(&self.state.algorithms, id)?;
        require_ready(handle, OPERATION)?;
        let window = self
            .split
            .windows
            .get(handle.cursor)
            .ok_or_else(|| StreamError::Engine(format!("{OPERATION}: window out of range")))?;
        Ok(self.release(window.unlabeled.clone()))
    }

    /// Scores a prediction for the participant's current window.
    ///
    /// Returns the participant's new state.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlgorithmNotFound`] for an unknown participant,
    /// [`StreamError::IllegalTransition`] unless it is `READY`, and
    /// [`StreamError::InvalidRequest`] for a malformed payload.
    pub fn submit_prediction(
        &mut self,
        id: &AlgorithmId,
        prediction: &Prediction,
    ) -> Result<AlgorithmState, StreamError> {
        const OPERATION: &str = "Error Submitting Prediction";
        self.ensure_started(OPERATION)?;
        let top_k = self.state.config.top_k;
        let last_window = self.split.windows.len().saturating_sub(1);
        let handle = find_mut(&mut self.state.algorithms, id)?;
        require_ready(handle, OPERATION)?;
        let rankings = prediction
            .rankings(top_k)
            .map_err(|err| StreamError::InvalidRequest(format!("{OPERATION}: {err}")))?;
        let window = self
            .split
            .windows
            .get(handle.cursor)
            .ok_or_else(|| StreamError::Engine(format!("{OPERATION}: window out of range")))?;
        for metric in &self.state.config.metrics {
            let sum = window
                .relevant
                .iter()
                .map(|(uid, relevant)| {
                    let ranked = rankings.get(uid).map_or(&[][..], Vec::as_slice);
                    metric.score(ranked, relevant, top_k)
                })
                .sum();
            handle.scores.push(WindowScore {
                window: handle.cursor,
                metric: *metric,
                sum,
                users: window.relevant.len(),
            });
        }
        let next = if handle.cursor >= last_window {
            AlgorithmState::Completed
        } else {
            AlgorithmState::Predicted
        };
        handle.advance(next, OPERATION)?;
        Ok(handle.state)
    }

    /// Returns one participant's state.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlgorithmNotFound`] for an unknown participant.
    pub fn algorithm_state(&self, id: &AlgorithmId) -> Result<AlgorithmState, StreamError> {
        find(&self.state.algorithms, id).map(|handle| handle.state)
    }

    /// Returns every participant in registration order.
    #[must_use]
    pub fn algorithms(&self) -> &[AlgorithmHandle] {
        &self.state.algorithms
    }

    /// Computes micro and macro metric rows for every scored participant.
    #[must_use]
    pub fn metric_report(&self) -> MetricReport {
        let top_k = self.state.config.top_k;
        let mut report = MetricReport::default();
        for handle in &self.state.algorithms {
            for metric in &self.state.config.metrics {
                let scores: Vec<WindowScore> =
                    handle.scores.iter().filter(|score| score.metric == *metric).copied().collect();
                if scores.is_empty() {
                    continue;
                }
                let (micro_score, num_user) = micro(&scores);
                let (macro_score, num_window) = macro_average(&scores);
                report.micro_metrics.push(MicroMetric {
                    algorithm: handle.key(),
                    metric: metric.label(top_k),
                    micro_score,
                    num_user,
                });
                report.macro_metrics.push(MacroMetric {
                    algorithm: handle.key(),
                    metric: metric.label(top_k),
                    macro_score,
                    num_window,
                });
            }
        }
        report
    }

    /// Returns the configuration echo of a sliding-window stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unsupported`] for other setting kinds.
    pub fn settings(&self) -> Result<StreamSettings, StreamError> {
        let config = &self.state.config;
        if config.setting.kind != SettingKind::SlidingWindow {
            return Err(StreamError::Unsupported(
                "Settings are only available for sliding window streams".to_string(),
            ));
        }
        Ok(StreamSettings {
            dataset_id: config.dataset_id.clone(),
            top_k: config.top_k,
            metrics: config.metrics.clone(),
            background_t: config.setting.background_t,
            window_size: config.setting.window_size,
            n_seq_data: config.setting.n_seq_data,
            number_of_windows: self.split.windows.len(),
            current_window: self
                .state
                .algorithms
                .iter()
                .map(|handle| handle.cursor)
                .max()
                .unwrap_or(0),
        })
    }

    /// Fails unless the run has started.
    fn ensure_started(&self, operation: &str) -> Result<(), StreamError> {
        if self.state.started {
            Ok(())
        } else {
            Err(StreamError::IllegalTransition(format!("{operation}: stream has not started")))
        }
    }

    /// Wraps rows with the stream-wide shape.
    fn release(&self, rows: Vec<Interaction>) -> DataRelease {
        DataRelease {
            shape: self.state.frame.shape(),
            rows,
        }
    }
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

impl SessionLifecycle for EvaluatorStream {
    fn freeze(&self) -> Result<StateBlob, SerializationError> {
        StateBlob::seal(SESSION_SCHEMA_VERSION, &self.state)
    }

    fn thaw(blob: &StateBlob) -> Result<Self, SerializationError> {
        let state: StreamState = blob.open(SESSION_SCHEMA_VERSION)?;
        let split = split(state.frame.rows(), &state.config.setting)
            .map_err(|err| SerializationError::Thaw(err.to_string()))?;
        if let Some(handle) =
            state.algorithms.iter().find(|handle| handle.cursor >= split.windows.len())
        {
            return Err(SerializationError::Thaw(format!(
                "algorithm {} cursor {} beyond {} windows",
                handle.id,
                handle.cursor,
                split.windows.len()
            )));
        }
        Ok(Self {
            state,
            split,
        })
    }
}

impl StreamSession for EvaluatorStream {
    fn dataset_id(&self) -> &str {
        &self.state.config.dataset_id
    }

    fn has_started(&self) -> bool {
        self.state.started
    }

    fn algorithm_states(&self) -> Vec<AlgorithmState> {
        self.state.algorithms.iter().map(|handle| handle.state).collect()
    }
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builds evaluator streams from a dataset catalog.
#[derive(Clone)]
pub struct EvaluatorFactory {
    /// Dataset source.
    catalog: Arc<dyn DatasetCatalog + Send + Sync>,
}

impl EvaluatorFactory {
    /// Creates a factory over a shared catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn DatasetCatalog + Send + Sync>) -> Self {
        Self {
            catalog,
        }
    }

    /// Creates a factory owning `catalog`.
    #[must_use]
    pub fn from_catalog(catalog: impl DatasetCatalog + Send + Sync + 'static) -> Self {
        Self::new(Arc::new(catalog))
    }
}

impl SessionFactory for EvaluatorFactory {
    type Config = EvaluatorConfig;
    type Session = EvaluatorStream;

    fn build(&self, config: &EvaluatorConfig) -> Result<EvaluatorStream, StreamError> {
        let frame = self.catalog.load(&config.dataset_id).map_err(|err| match err {
            DatasetError::Unknown(id) => StreamError::UnknownDataset(id),
            DatasetError::Load(message) => {
                StreamError::construction(ConstructionPhase::Dataset, message)
            }
        })?;
        EvaluatorStream::assemble(config.clone(), frame)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Finds a participant by identifier.
fn find<'a>(
    algorithms: &'a [AlgorithmHandle],
    id: &AlgorithmId,
) -> Result<&'a AlgorithmHandle, StreamError> {
    algorithms
        .iter()
        .find(|handle| handle.id == *id)
        .ok_or_else(|| StreamError::AlgorithmNotFound(id.to_string()))
}

/// Finds a participant by identifier for mutation.
fn find_mut<'a>(
    algorithms: &'a mut [AlgorithmHandle],
    id: &AlgorithmId,
) -> Result<&'a mut AlgorithmHandle, StreamError> {
    algorithms
        .iter_mut()
        .find(|handle| handle.id == *id)
        .ok_or_else(|| StreamError::AlgorithmNotFound(id.to_string()))
}

/// Fails unless the participant is `READY`.
fn require_ready(handle: &AlgorithmHandle, operation: &str) -> Result<(), StreamError> {
    if handle.state == AlgorithmState::Ready {
        Ok(())
    } else {
        Err(StreamError::IllegalTransition(format!(
            "{operation}: algorithm {} is {}, expected READY",
            handle.id, handle.state
        )))
    }
}
