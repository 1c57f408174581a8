// crates/evalstream-engine/src/setting.rs
// ============================================================================
// Module: Evalstream Settings
// Description: Background/window split of an interaction log.
// Purpose: Derive the data released to algorithms window by window.
// Dependencies: serde, thiserror, crate::dataset
// ============================================================================

//! ## Overview
//! A setting cuts an interaction log at `background_t`. Everything earlier is
//! background (the first training release). Everything at or after it is
//! divided into evaluation windows:
//! - sliding window: `[background_t + k * window_size, background_t + (k + 1) * window_size)`,
//!   empty windows skipped;
//! - single time point: one window holding every remaining row.
//!
//! For each window, every user present contributes up to `n_seq_data` of
//! their window rows, item masked, to the unlabeled release. The items of all
//! of that user's window rows form the relevant set used for scoring.
//!
//! A [`WindowSplit`] is derived data. Sessions never persist it; they rebuild
//! it from the stored frame on thaw.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::dataset::Interaction;
use crate::dataset::MASKED_ITEM;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Window layout of an evaluation setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    /// Consecutive fixed-size windows after `background_t`.
    #[default]
    SlidingWindow,
    /// One window holding everything after `background_t`.
    SingleTimePoint,
}

/// Parameters of a setting split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingParams {
    /// Window layout.
    pub kind: SettingKind,
    /// Cut-off timestamp between background and evaluation data.
    pub background_t: i64,
    /// Window length in seconds (sliding window only).
    pub window_size: i64,
    /// Maximum masked rows per user in each unlabeled release.
    pub n_seq_data: usize,
}

/// One evaluation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Inclusive start timestamp.
    pub start: i64,
    /// Full window rows, released as training data once the window is scored.
    pub ground_truth: Vec<Interaction>,
    /// Masked rows released for prediction.
    pub unlabeled: Vec<Interaction>,
    /// Relevant items per user, for users present in `unlabeled`.
    pub relevant: BTreeMap<i64, BTreeSet<i64>>,
}

/// Background data plus ordered evaluation windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSplit {
    /// Rows strictly before `background_t`.
    pub background: Vec<Interaction>,
    /// Non-empty evaluation windows in time order.
    pub windows: Vec<Window>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Split failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    /// Window size must be positive for sliding windows.
    #[error("window_size must be greater than zero, got {0}")]
    WindowSize(i64),
    /// At least one masked row per user is required.
    #[error("n_seq_data must be greater than zero")]
    SeqData,
    /// No interaction falls at or after `background_t`.
    #[error("no interactions at or after background_t {0}; zero evaluation windows")]
    NoWindows(i64),
}

// ============================================================================
// SECTION: Split
// ============================================================================

/// Splits time-ordered rows into background and evaluation windows.
///
/// # Errors
///
/// Returns [`SettingError`] for invalid parameters or a split with no windows.
pub fn split(rows: &[Interaction], params: &SettingParams) -> Result<WindowSplit, SettingError> {
    if params.kind == SettingKind::SlidingWindow && params.window_size <= 0 {
        return Err(SettingError::WindowSize(params.window_size));
    }
    if params.n_seq_data == 0 {
        return Err(SettingError::SeqData);
    }
    let (background, rest): (Vec<Interaction>, Vec<Interaction>) =
        rows.iter().partition(|row| row.ts < params.background_t);

    let mut buckets: BTreeMap<i64, Vec<Interaction>> = BTreeMap::new();
    for row in rest {
        let index = match params.kind {
            SettingKind::SlidingWindow => {
                row.ts.saturating_sub(params.background_t) / params.window_size
            }
            SettingKind::SingleTimePoint => 0,
        };
        buckets.entry(index).or_default().push(row);
    }
    if buckets.is_empty() {
        return Err(SettingError::NoWindows(params.background_t));
    }
    let windows = buckets
        .into_iter()
        .map(|(index, rows)| {
            let start = match params.kind {
                SettingKind::SlidingWindow => {
                    params.background_t.saturating_add(index.saturating_mul(params.window_size))
                }
                SettingKind::SingleTimePoint => params.background_t,
            };
            build_window(start, rows, params.n_seq_data)
        })
        .collect();
    Ok(WindowSplit {
        background,
        windows,
    })
}

/// Builds masked and relevant views of one window.
fn build_window(start: i64, ground_truth: Vec<Interaction>, n_seq_data: usize) -> Window {
    let mut relevant: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    let mut per_user: BTreeMap<i64, usize> = BTreeMap::new();
    let mut unlabeled = Vec::new();
    for row in &ground_truth {
        relevant.entry(row.uid).or_default().insert(row.iid);
        let taken = per_user.entry(row.uid).or_insert(0);
        if *taken < n_seq_data {
            *taken += 1;
            unlabeled.push(Interaction {
                iid: MASKED_ITEM,
                ..*row
            });
        }
    }
    Window {
        start,
        ground_truth,
        unlabeled,
        relevant,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn row(interactionid: i64, uid: i64, iid: i64, ts: i64) -> Interaction {
        Interaction {
            interactionid,
            uid,
            iid,
            ts,
        }
    }

    fn params(kind: SettingKind) -> SettingParams {
        SettingParams {
            kind,
            background_t: 100,
            window_size: 10,
            n_seq_data: 1,
        }
    }

    #[test]
    fn sliding_window_skips_empty_windows() {
        let rows = [row(0, 0, 1, 50), row(1, 0, 2, 101), row(2, 1, 3, 135), row(3, 1, 4, 136)];
        let split = split(&rows, &params(SettingKind::SlidingWindow)).unwrap();
        assert_eq!(split.background, vec![row(0, 0, 1, 50)]);
        assert_eq!(split.windows.len(), 2);
        assert_eq!(split.windows[0].start, 100);
        assert_eq!(split.windows[1].start, 130);
        assert_eq!(split.windows[1].unlabeled, vec![row(2, 1, MASKED_ITEM, 135)]);
        assert_eq!(split.windows[1].relevant[&1], BTreeSet::from([3, 4]));
    }

    #[test]
    fn single_time_point_has_one_window() {
        let rows = [row(0, 0, 1, 101), row(1, 0, 2, 999)];
        let split = split(&rows, &params(SettingKind::SingleTimePoint)).unwrap();
        assert_eq!(split.windows.len(), 1);
        assert!(split.background.is_empty());
    }

    #[test]
    fn no_data_after_cutoff_is_rejected() {
        let rows = [row(0, 0, 1, 5)];
        assert_eq!(
            split(&rows, &params(SettingKind::SlidingWindow)).unwrap_err(),
            SettingError::NoWindows(100)
        );
    }

    #[test]
    fn non_positive_window_size_is_rejected() {
        let mut bad = params(SettingKind::SlidingWindow);
        bad.window_size = 0;
        assert_eq!(split(&[], &bad).unwrap_err(), SettingError::WindowSize(0));
    }
}
