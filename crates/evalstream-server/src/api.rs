// crates/evalstream-server/src/api.rs
// ============================================================================
// Module: Stream API
// Description: Synchronous operations behind every HTTP endpoint.
// Purpose: Validate identifiers, enforce access, and drive the registry.
// Dependencies: evalstream-core, evalstream-engine, crate::identity, crate::models
// ============================================================================

//! ## Overview
//! [`StreamApi`] is transport-free: each method takes the current user and the
//! raw path identifiers, parses every identifier before any store call, checks
//! access, and then runs exactly one registry cycle. Mutating operations go
//! through [`SessionRegistry::update`], which commits only on success; queries
//! go through [`SessionRegistry::inspect`] and never write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use evalstream_config::WindowDefaults;
use evalstream_core::AlgorithmId;
use evalstream_core::AlgorithmState;
use evalstream_core::SessionRegistry;
use evalstream_core::StreamError;
use evalstream_core::StreamId;
use evalstream_core::UserId;
use evalstream_engine::EvaluatorFactory;
use evalstream_engine::Prediction;
use evalstream_engine::StreamSettings;

use crate::identity::AccessPolicy;
use crate::identity::require_user;
use crate::models::AlgorithmStateResponse;
use crate::models::AlgorithmSummary;
use crate::models::CreateStreamRequest;
use crate::models::CreateStreamResponse;
use crate::models::MetricsResponse;
use crate::models::OperationStatus;
use crate::models::RegisterAlgorithmRequest;
use crate::models::RegisterAlgorithmResponse;
use crate::models::StreamStatusResponse;
use crate::models::TrainingDataResponse;
use crate::models::UnlabeledDataResponse;

// ============================================================================
// SECTION: Stream API
// ============================================================================

/// Registry-backed implementation of every API operation.
pub struct StreamApi {
    /// Session registry.
    registry: SessionRegistry<EvaluatorFactory>,
    /// Ownership rules.
    policy: AccessPolicy,
    /// Window parameters for create requests that omit them.
    defaults: WindowDefaults,
}

impl StreamApi {
    /// Creates the API over a registry.
    #[must_use]
    pub const fn new(
        registry: SessionRegistry<EvaluatorFactory>,
        policy: AccessPolicy,
        defaults: WindowDefaults,
    ) -> Self {
        Self {
            registry,
            policy,
            defaults,
        }
    }

    /// Reports store readiness.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] when the store is unavailable.
    pub fn readiness(&self) -> Result<(), StreamError> {
        self.registry.readiness()
    }

    /// Creates a stream and records the caller as its owner.
    ///
    /// # Errors
    ///
    /// Returns construction, persistence, or access errors.
    pub fn create_stream(
        &self,
        caller: Option<&UserId>,
        request: CreateStreamRequest,
    ) -> Result<CreateStreamResponse, StreamError> {
        let owner = self.policy.creation_owner(caller)?;
        let config = request.into_config(&self.defaults);
        let evaluator_stream_id = self.registry.create(&config, owner)?;
        Ok(CreateStreamResponse {
            evaluator_stream_id,
        })
    }

    /// Derives the status of a stream.
    ///
    /// # Errors
    ///
    /// Returns identifier, access, or load errors.
    pub fn stream_status(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
    ) -> Result<StreamStatusResponse, StreamError> {
        let id = self.authorize(caller, stream_id)?;
        let status = self.registry.status(&id)?;
        Ok(StreamStatusResponse {
            stream_id: id,
            status,
        })
    }

    /// Lists the caller's streams in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unauthenticated`] for anonymous callers, or
    /// lookup errors.
    pub fn user_streams(
        &self,
        caller: Option<&UserId>,
    ) -> Result<Vec<StreamStatusResponse>, StreamError> {
        let user = require_user(caller)?;
        let owned = self.registry.list_owned(user)?;
        Ok(owned
            .into_iter()
            .map(|(stream_id, status)| StreamStatusResponse {
                stream_id,
                status,
            })
            .collect())
    }

    /// Echoes the stream configuration and window progress.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unsupported`] for non-sliding settings, or
    /// identifier, access, or load errors.
    pub fn stream_settings(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
    ) -> Result<StreamSettings, StreamError> {
        let id = self.authorize(caller, stream_id)?;
        self.registry.inspect(&id, |handle| handle.session().settings())
    }

    /// Starts the evaluation run.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::IllegalTransition`] when already started, or
    /// identifier, access, load, or commit errors.
    pub fn start_stream(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
    ) -> Result<OperationStatus, StreamError> {
        let id = self.authorize(caller, stream_id)?;
        self.registry.update(&id, |session| session.start())?;
        Ok(OperationStatus::OK)
    }

    /// Returns whether the caller owns the stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unauthenticated`] for anonymous callers, or
    /// identifier and lookup errors.
    pub fn check_access(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
    ) -> Result<bool, StreamError> {
        let id = StreamId::parse(stream_id)?;
        let user = require_user(caller)?;
        self.registry.is_owner(&id, user)
    }

    /// Registers an algorithm participant.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] for an unusable name, or
    /// identifier, access, load, or commit errors.
    pub fn register_algorithm(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        request: &RegisterAlgorithmRequest,
    ) -> Result<RegisterAlgorithmResponse, StreamError> {
        let id = self.authorize(caller, stream_id)?;
        let algorithm_uuid = self
            .registry
            .update(&id, |session| session.register_algorithm(&request.algorithm_name))?;
        Ok(RegisterAlgorithmResponse {
            algorithm_uuid,
        })
    }

    /// Returns one participant's state.
    ///
    /// # Errors
    ///
    /// Returns identifier, access, load, or lookup errors.
    pub fn algorithm_state(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        algorithm_id: &str,
    ) -> Result<AlgorithmStateResponse, StreamError> {
        let (id, algorithm) = self.authorize_algorithm(caller, stream_id, algorithm_id)?;
        let algorithm_state =
            self.registry.inspect(&id, |handle| handle.session().algorithm_state(&algorithm))?;
        Ok(AlgorithmStateResponse {
            algorithm_state,
        })
    }

    /// Lists every participant's state in registration order.
    ///
    /// # Errors
    ///
    /// Returns identifier, access, or load errors.
    pub fn algorithm_states(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
    ) -> Result<Vec<AlgorithmSummary>, StreamError> {
        let id = self.authorize(caller, stream_id)?;
        self.registry.inspect(&id, |handle| {
            Ok(handle.session().algorithms().iter().map(AlgorithmSummary::from).collect())
        })
    }

    /// Returns whether a participant has consumed every window.
    ///
    /// # Errors
    ///
    /// Returns identifier, access, load, or lookup errors.
    pub fn algorithm_completed(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        algorithm_id: &str,
    ) -> Result<bool, StreamError> {
        let state = self.algorithm_state(caller, stream_id, algorithm_id)?;
        Ok(state.algorithm_state == AlgorithmState::Completed)
    }

    /// Releases the participant's current training data and commits the
    /// resulting state change.
    ///
    /// # Errors
    ///
    /// Returns lifecycle, identifier, access, load, or commit errors.
    pub fn training_data(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        algorithm_id: &str,
    ) -> Result<TrainingDataResponse, StreamError> {
        let (id, algorithm) = self.authorize_algorithm(caller, stream_id, algorithm_id)?;
        let release = self.registry.update(&id, |session| session.training_data(&algorithm))?;
        Ok(release.into())
    }

    /// Returns the masked rows the participant must predict for.
    ///
    /// # Errors
    ///
    /// Returns lifecycle, identifier, access, or load errors.
    pub fn unlabeled_data(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        algorithm_id: &str,
    ) -> Result<UnlabeledDataResponse, StreamError> {
        let (id, algorithm) = self.authorize_algorithm(caller, stream_id, algorithm_id)?;
        let release =
            self.registry.inspect(&id, |handle| handle.session().unlabeled_data(&algorithm))?;
        Ok(release.into())
    }

    /// Scores a prediction for the participant's current window.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] for a malformed prediction, or
    /// lifecycle, identifier, access, load, or commit errors.
    pub fn submit_prediction(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        algorithm_id: &str,
        prediction: &Prediction,
    ) -> Result<OperationStatus, StreamError> {
        let (id, algorithm) = self.authorize_algorithm(caller, stream_id, algorithm_id)?;
        self.registry.update(&id, |session| session.submit_prediction(&algorithm, prediction))?;
        Ok(OperationStatus::OK)
    }

    /// Returns micro and macro metrics for every scored participant.
    ///
    /// # Errors
    ///
    /// Returns identifier, access, or load errors.
    pub fn metrics(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
    ) -> Result<MetricsResponse, StreamError> {
        let id = self.authorize(caller, stream_id)?;
        let report = self.registry.inspect(&id, |handle| Ok(handle.session().metric_report()))?;
        Ok(report.into())
    }

    /// Parses a stream identifier and applies the access policy.
    fn authorize(&self, caller: Option<&UserId>, stream_id: &str) -> Result<StreamId, StreamError> {
        let id = StreamId::parse(stream_id)?;
        self.policy.authorize_stream(&id, caller, |id, user| self.registry.is_owner(id, user))?;
        Ok(id)
    }

    /// Parses both identifiers before any store call, then applies access.
    fn authorize_algorithm(
        &self,
        caller: Option<&UserId>,
        stream_id: &str,
        algorithm_id: &str,
    ) -> Result<(StreamId, AlgorithmId), StreamError> {
        let id = StreamId::parse(stream_id)?;
        let algorithm = AlgorithmId::parse(algorithm_id)?;
        self.policy.authorize_stream(&id, caller, |id, user| self.registry.is_owner(id, user))?;
        Ok((id, algorithm))
    }
}
