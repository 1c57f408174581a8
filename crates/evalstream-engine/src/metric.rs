// crates/evalstream-engine/src/metric.rs
// ============================================================================
// Module: Evalstream Metrics
// Description: Top-K ranking metrics and per-window accumulators.
// Purpose: Score ranked predictions against each window's relevant items.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each metric scores one user's ranked list (truncated to K) against that
//! user's relevant set. Window results are kept as `(sum, users)` pairs so
//! both aggregate views can be computed later:
//! - micro: total sum over total users across windows;
//! - macro: mean over windows of the per-window mean.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Metric Kind
// ============================================================================

/// Supported top-K metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Hits in the top K divided by K.
    PrecisionK,
    /// Hits in the top K divided by `min(K, |relevant|)`.
    RecallK,
    /// Discounted cumulative gain over the top K.
    #[serde(rename = "DCGK")]
    DcgK,
    /// DCG normalised by the ideal DCG.
    #[serde(rename = "NDCGK")]
    NdcgK,
    /// 1 when any of the top K is relevant.
    HitK,
}

impl MetricKind {
    /// Returns the wire name of the metric.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PrecisionK => "PrecisionK",
            Self::RecallK => "RecallK",
            Self::DcgK => "DCGK",
            Self::NdcgK => "NDCGK",
            Self::HitK => "HitK",
        }
    }

    /// Returns the label used in metric reports, e.g. `PrecisionK_10`.
    #[must_use]
    pub fn label(self, top_k: usize) -> String {
        format!("{}_{top_k}", self.name())
    }

    /// Scores one user's ranked items against their relevant set.
    #[must_use]
    pub fn score(self, ranked: &[i64], relevant: &BTreeSet<i64>, top_k: usize) -> f64 {
        if top_k == 0 || relevant.is_empty() {
            return 0.0;
        }
        let hits: Vec<usize> = ranked
            .iter()
            .take(top_k)
            .enumerate()
            .filter(|(_, item)| relevant.contains(*item))
            .map(|(rank, _)| rank)
            .collect();
        match self {
            Self::PrecisionK => ratio(hits.len(), top_k),
            Self::RecallK => ratio(hits.len(), top_k.min(relevant.len())),
            Self::DcgK => dcg(&hits),
            Self::NdcgK => {
                let ideal: Vec<usize> = (0..top_k.min(relevant.len())).collect();
                let ideal = dcg(&ideal);
                if ideal > 0.0 { dcg(&hits) / ideal } else { 0.0 }
            }
            Self::HitK => {
                if hits.is_empty() {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SECTION: Accumulators
// ============================================================================

/// Accumulated score of one metric over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowScore {
    /// Window index.
    pub window: usize,
    /// Metric scored.
    pub metric: MetricKind,
    /// Sum of per-user scores.
    pub sum: f64,
    /// Users scored.
    pub users: usize,
}

/// Micro aggregate: total sum over total users. Returns `(score, users)`.
#[must_use]
pub fn micro(scores: &[WindowScore]) -> (f64, usize) {
    let users: usize = scores.iter().map(|score| score.users).sum();
    let sum: f64 = scores.iter().map(|score| score.sum).sum();
    (if users == 0 { 0.0 } else { sum / to_f64(users) }, users)
}

/// Macro aggregate: mean of per-window means. Returns `(score, windows)`.
#[must_use]
pub fn macro_average(scores: &[WindowScore]) -> (f64, usize) {
    let means: Vec<f64> = scores
        .iter()
        .filter(|score| score.users > 0)
        .map(|score| score.sum / to_f64(score.users))
        .collect();
    if means.is_empty() {
        return (0.0, 0);
    }
    (means.iter().sum::<f64>() / to_f64(means.len()), means.len())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Discounted gain of hits at the given zero-based ranks.
fn dcg(ranks: &[usize]) -> f64 {
    ranks.iter().map(|rank| 1.0 / (to_f64(*rank) + 2.0).log2()).sum()
}

/// Returns `numerator / denominator`, or zero for an empty denominator.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 { 0.0 } else { to_f64(numerator) / to_f64(denominator) }
}

/// Converts a count to `f64` without a lossy cast.
fn to_f64(count: usize) -> f64 {
    u32::try_from(count).map_or(f64::from(u32::MAX), f64::from)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
