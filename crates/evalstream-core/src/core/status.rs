// crates/evalstream-core/src/core/status.rs
// ============================================================================
// Module: Evalstream State Machines
// Description: Algorithm participant states and derived stream status.
// Purpose: Encode legal algorithm transitions and on-demand status derivation.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Algorithm participants move through `NEW -> READY -> PREDICTED -> READY ...`
//! until the final window is scored, at which point they are `COMPLETED`.
//! Stream status is never stored; [`derive_status`] recomputes it from the
//! nested algorithm states every time it is requested.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Algorithm State
// ============================================================================

/// Lifecycle state of one algorithm participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmState {
    /// Registered, no data consumed yet.
    New,
    /// Training data for the current window has been released.
    Ready,
    /// Prediction accepted for the current window.
    Predicted,
    /// Every window has been consumed and scored.
    Completed,
}

/// Rejected algorithm state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal algorithm transition from {from} to {to}")]
pub struct IllegalTransition {
    /// State before the attempted transition.
    pub from: AlgorithmState,
    /// Requested target state.
    pub to: AlgorithmState,
}

impl AlgorithmState {
    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Ready => "READY",
            Self::Predicted => "PREDICTED",
            Self::Completed => "COMPLETED",
        }
    }

    /// Returns true when `next` is reachable from `self` in one step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New | Self::Predicted, Self::Ready)
                | (Self::Ready, Self::Predicted | Self::Completed)
        )
    }

    /// Validates a transition and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] when `next` is not reachable from `self`.
    pub const fn transition(self, next: Self) -> Result<Self, IllegalTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for AlgorithmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Stream Status
// ============================================================================

/// Derived lifecycle status of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// The run has not been started.
    NotStarted,
    /// Started, with at least one participant not completed.
    InProgress,
    /// Started, with every participant completed.
    Completed,
}

impl StreamStatus {
    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives stream status from the started flag and participant states.
///
/// A started stream with no participants is `IN_PROGRESS`: completion needs
/// at least one completed participant, so registering the first participant
/// after start can never move a stream backwards out of `COMPLETED`.
#[must_use]
pub fn derive_status<I>(has_started: bool, states: I) -> StreamStatus
where
    I: IntoIterator<Item = AlgorithmState>,
{
    if !has_started {
        return StreamStatus::NotStarted;
    }
    let mut states = states.into_iter().peekable();
    if states.peek().is_some() && states.all(AlgorithmState::is_completed) {
        StreamStatus::Completed
    } else {
        StreamStatus::InProgress
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
