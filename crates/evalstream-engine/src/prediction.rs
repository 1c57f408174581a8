// crates/evalstream-engine/src/prediction.rs
// ============================================================================
// Module: Evalstream Predictions
// Description: Prediction payloads and their conversion to ranked lists.
// Purpose: Accept record or sparse-matrix predictions and rank items per user.
// Dependencies: serde, thiserror, crate::dataset
// ============================================================================

//! ## Overview
//! Predictions arrive in one of two shapes:
//! - a list of interaction records; each user's items are ranked in
//!   submission order;
//! - a CSR matrix (`data`, `indices`, `indptr`, `shape`) with users as rows
//!   and items as columns; each row is ranked by descending score, ties by
//!   ascending item id.
//!
//! Rankings keep the first occurrence of an item and are cut at K.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::dataset::Interaction;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Sparse matrix of user-by-item scores in compressed row form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    /// Non-zero scores.
    pub data: Vec<f64>,
    /// Column (item) index of each score.
    pub indices: Vec<i64>,
    /// Row offsets into `data`/`indices`, length `rows + 1`.
    pub indptr: Vec<i64>,
    /// `[rows, cols]`.
    pub shape: Vec<i64>,
}

/// Prediction payload for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    /// Ranked interaction records.
    Records(Vec<Interaction>),
    /// Scored sparse matrix.
    Csr(CsrMatrix),
}

/// Top-K item ranking per user.
pub type Rankings = BTreeMap<i64, Vec<i64>>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Malformed prediction payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    /// Record list contains an unusable row.
    #[error("invalid prediction record {index}: {reason}")]
    Record {
        /// Position of the offending record.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
    /// Matrix structure is inconsistent.
    #[error("invalid prediction matrix: {0}")]
    Matrix(String),
}

// ============================================================================
// SECTION: Ranking
// ============================================================================

impl Prediction {
    /// Converts the payload into per-user rankings cut at `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError`] when the payload is malformed.
    pub fn rankings(&self, top_k: usize) -> Result<Rankings, PredictionError> {
        match self {
            Self::Records(records) => rank_records(records, top_k),
            Self::Csr(matrix) => rank_matrix(matrix, top_k),
        }
    }
}

/// Ranks record predictions in submission order.
fn rank_records(records: &[Interaction], top_k: usize) -> Result<Rankings, PredictionError> {
    let mut rankings = Rankings::new();
    for (index, record) in records.iter().enumerate() {
        if record.iid < 0 {
            return Err(PredictionError::Record {
                index,
                reason: format!("item id must be non-negative, got {}", record.iid),
            });
        }
        let ranked = rankings.entry(record.uid).or_default();
        if ranked.len() < top_k && !ranked.contains(&record.iid) {
            ranked.push(record.iid);
        }
    }
    Ok(rankings)
}

/// Ranks each matrix row by descending score.
fn rank_matrix(matrix: &CsrMatrix, top_k: usize) -> Result<Rankings, PredictionError> {
    let rows = validate_matrix(matrix)?;
    let mut rankings = Rankings::new();
    for row in 0..rows {
        let start = offset(matrix, row)?;
        let end = offset(matrix, row + 1)?;
        let mut scored: Vec<(f64, i64)> = matrix.data[start..end]
            .iter()
            .copied()
            .zip(matrix.indices[start..end].iter().copied())
            .collect();
        if scored.is_empty() {
            continue;
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        let mut ranked: Vec<i64> = Vec::with_capacity(top_k.min(scored.len()));
        for (_, item) in scored {
            if ranked.len() == top_k {
                break;
            }
            if !ranked.contains(&item) {
                ranked.push(item);
            }
        }
        let uid = i64::try_from(row)
            .map_err(|_| PredictionError::Matrix("row index overflow".to_string()))?;
        rankings.insert(uid, ranked);
    }
    Ok(rankings)
}

/// Checks CSR invariants and returns the row count.
fn validate_matrix(matrix: &CsrMatrix) -> Result<usize, PredictionError> {
    let [rows, cols] = matrix.shape.as_slice() else {
        return Err(PredictionError::Matrix(format!(
            "shape must have two dimensions, got {}",
            matrix.shape.len()
        )));
    };
    let rows = usize::try_from(*rows)
        .map_err(|_| PredictionError::Matrix("row count must be non-negative".to_string()))?;
    let cols = usize::try_from(*cols)
        .map_err(|_| PredictionError::Matrix("column count must be non-negative".to_string()))?;
    if matrix.indptr.len() != rows + 1 {
        return Err(PredictionError::Matrix(format!(
            "indptr length {} does not match {rows} rows",
            matrix.indptr.len()
        )));
    }
    if matrix.data.len() != matrix.indices.len() {
        return Err(PredictionError::Matrix("data and indices lengths differ".to_string()));
    }
    if matrix.indptr.first() != Some(&0) {
        return Err(PredictionError::Matrix("indptr must start at zero".to_string()));
    }
    if matrix.indptr.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(PredictionError::Matrix("indptr must be non-decreasing".to_string()));
    }
    let last = matrix.indptr.last().and_then(|value| usize::try_from(*value).ok());
    if last != Some(matrix.data.len()) {
        return Err(PredictionError::Matrix("indptr must end at the number of scores".to_string()));
    }
    if let Some(bad) = matrix
        .indices
        .iter()
        .find(|index| !usize::try_from(**index).is_ok_and(|index| index < cols))
    {
        return Err(PredictionError::Matrix(format!("column index {bad} out of range")));
    }
    if matrix.data.iter().any(|score| !score.is_finite()) {
        return Err(PredictionError::Matrix("scores must be finite".to_string()));
    }
    Ok(rows)
}

/// Reads one validated row offset.
fn offset(matrix: &CsrMatrix, row: usize) -> Result<usize, PredictionError> {
    matrix
        .indptr
        .get(row)
        .and_then(|value| usize::try_from(*value).ok())
        .ok_or_else(|| PredictionError::Matrix(format!("missing offset for row {row}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn records_keep_submission_order_per_user() {
        let records = vec![
            Interaction {
                interactionid: 0,
                uid: 1,
                iid: 7,
                ts: 0,
            },
            Interaction {
                interactionid: 1,
                uid: 1,
                iid: 3,
                ts: 0,
            },
            Interaction {
                interactionid: 2,
                uid: 1,
                iid: 7,
                ts: 0,
            },
            Interaction {
                interactionid: 3,
                uid: 1,
                iid: 5,
                ts: 0,
            },
        ];
        let rankings = Prediction::Records(records).rankings(2).unwrap();
        assert_eq!(rankings[&1], vec![7, 3]);
    }

    #[test]
    fn csr_rows_rank_by_score() {
        let matrix = CsrMatrix {
            data: vec![0.1, 0.9, 0.5, 1.0],
            indices: vec![0, 1, 2, 4],
            indptr: vec![0, 3, 3, 4],
            shape: vec![3, 5],
        };
        let rankings = Prediction::Csr(matrix).rankings(2).unwrap();
        assert_eq!(rankings[&0], vec![1, 2]);
        assert!(!rankings.contains_key(&1));
        assert_eq!(rankings[&2], vec![4]);
    }

    #[test]
    fn csr_structure_is_validated() {
        let matrix = CsrMatrix {
            data: vec![1.0],
            indices: vec![9],
            indptr: vec![0, 1],
            shape: vec![1, 5],
        };
        assert!(matches!(
            Prediction::Csr(matrix).rankings(10),
            Err(PredictionError::Matrix(_))
        ));
    }

    #[test]
    fn payload_shape_selects_variant() {
        let records: Prediction =
            serde_json::from_str(r#"[{"interactionid":0,"uid":0,"iid":1,"ts":2}]"#).unwrap();
        assert!(matches!(records, Prediction::Records(_)));
        let csr: Prediction =
            serde_json::from_str(r#"{"data":[],"indices":[],"indptr":[0],"shape":[0,0]}"#)
                .unwrap();
        assert!(matches!(csr, Prediction::Csr(_)));
    }
}
