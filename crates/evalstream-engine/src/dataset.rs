// crates/evalstream-engine/src/dataset.rs
// ============================================================================
// Module: Evalstream Datasets
// Description: Interaction records, frames, and dataset catalogs.
// Purpose: Resolve a dataset identifier to a timestamped interaction log.
// Dependencies: rand, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A dataset is a flat log of `(interactionid, uid, iid, ts)` rows. Catalogs
//! map dataset identifiers to logs:
//! - [`DirectoryDatasetCatalog`] reads `<dir>/<dataset_id>.jsonl`, one JSON
//!   record per line, restricted to an allow-list.
//! - [`SyntheticDatasetCatalog`] generates a deterministic log per known
//!   dataset name so the service runs without downloaded data.
//! - [`InMemoryDatasetCatalog`] serves frames registered in code.
//!
//! Dataset contents are untrusted; loaders bound file size and reject
//! malformed rows rather than skipping them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::BufRead;
use std::io::BufReader;
use std::path::PathBuf;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dataset identifiers served by default.
pub const KNOWN_DATASETS: [&str; 7] = [
    "amazon_music",
    "amazon_book",
    "amazon_computer",
    "amazon_movie",
    "yelp",
    "movielens100k",
    "lastfm2k",
];

/// Item id written into masked rows of unlabeled data.
pub const MASKED_ITEM: i64 = -1;

/// Maximum dataset file size accepted by the directory catalog.
pub const MAX_DATASET_FILE_BYTES: u64 = 512 * 1024 * 1024;

/// First synthetic timestamp (2013-01-01T00:00:00Z).
const SYNTHETIC_START_TS: i64 = 1_356_998_400;
/// Span of synthetic timestamps in seconds (four years).
const SYNTHETIC_SPAN_SECS: i64 = 4 * 365 * 86_400;
/// Users per synthetic dataset.
const SYNTHETIC_USERS: i64 = 64;
/// Items per synthetic dataset.
const SYNTHETIC_ITEMS: i64 = 256;
/// Interactions per synthetic dataset.
const SYNTHETIC_INTERACTIONS: usize = 4_000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One timestamped user-item interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction identifier, unique within a dataset.
    pub interactionid: i64,
    /// User identifier.
    pub uid: i64,
    /// Item identifier; [`MASKED_ITEM`] in unlabeled data.
    pub iid: i64,
    /// Unix timestamp in seconds.
    pub ts: i64,
}

/// An interaction log ordered by timestamp, then interaction id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFrame {
    /// Ordered rows.
    rows: Vec<Interaction>,
}

impl InteractionFrame {
    /// Builds a frame, sorting rows into timestamp order.
    #[must_use]
    pub fn new(mut rows: Vec<Interaction>) -> Self {
        rows.sort_by_key(|row| (row.ts, row.interactionid));
        Self {
            rows,
        }
    }

    /// Returns the ordered rows.
    #[must_use]
    pub fn rows(&self) -> &[Interaction] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the frame has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `[n_users, n_items]` sized to the largest ids present.
    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        let dim = |max: Option<i64>| {
            max.and_then(|value| usize::try_from(value).ok()).map_or(0, |value| value + 1)
        };
        [
            dim(self.rows.iter().map(|row| row.uid).max()),
            dim(self.rows.iter().map(|row| row.iid).max()),
        ]
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dataset lookup and load failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// Identifier not served by this catalog.
    #[error("unknown dataset: {0}")]
    Unknown(String),
    /// Identifier is known but its data could not be loaded.
    #[error("{0}")]
    Load(String),
}

// ============================================================================
// SECTION: Catalog Trait
// ============================================================================

/// Resolves dataset identifiers to interaction frames.
pub trait DatasetCatalog {
    /// Returns true when `dataset_id` is served by this catalog.
    fn contains(&self, dataset_id: &str) -> bool;

    /// Loads the interaction log for `dataset_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Unknown`] for unknown identifiers and
    /// [`DatasetError::Load`] when the data cannot be read.
    fn load(&self, dataset_id: &str) -> Result<InteractionFrame, DatasetError>;
}

// ============================================================================
// SECTION: In-Memory Catalog
// ============================================================================

/// Catalog of frames registered in code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatasetCatalog {
    /// Frames keyed by dataset identifier.
    frames: BTreeMap<String, InteractionFrame>,
}

impl InMemoryDatasetCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a frame under `dataset_id`, replacing any previous one.
    #[must_use]
    pub fn with_frame(mut self, dataset_id: impl Into<String>, frame: InteractionFrame) -> Self {
        self.frames.insert(dataset_id.into(), frame);
        self
    }
}

impl DatasetCatalog for InMemoryDatasetCatalog {
    fn contains(&self, dataset_id: &str) -> bool {
        self.frames.contains_key(dataset_id)
    }

    fn load(&self, dataset_id: &str) -> Result<InteractionFrame, DatasetError> {
        self.frames.get(dataset_id).cloned().ok_or_else(|| DatasetError::Unknown(dataset_id.to_string()))
    }
}

// ============================================================================
// SECTION: Directory Catalog
// ============================================================================

/// Catalog reading JSON-lines files from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDatasetCatalog {
    /// Directory holding `<dataset_id>.jsonl` files.
    dir: PathBuf,
    /// Identifiers this catalog serves.
    allowed: BTreeSet<String>,
}

impl DirectoryDatasetCatalog {
    /// Creates a catalog over `dir` serving only `allowed` identifiers.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            dir: dir.into(),
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Returns the file path for a dataset identifier.
    fn path_for(&self, dataset_id: &str) -> PathBuf {
        self.dir.join(format!("{dataset_id}.jsonl"))
    }
}

impl DatasetCatalog for DirectoryDatasetCatalog {
    fn contains(&self, dataset_id: &str) -> bool {
        self.allowed.contains(dataset_id)
    }

    fn load(&self, dataset_id: &str) -> Result<InteractionFrame, DatasetError> {
        if !self.contains(dataset_id) {
            return Err(DatasetError::Unknown(dataset_id.to_string()));
        }
        let path = self.path_for(dataset_id);
        let file = std::fs::File::open(&path)
            .map_err(|err| DatasetError::Load(format!("{}: {err}", path.display())))?;
        let size = file
            .metadata()
            .map_err(|err| DatasetError::Load(format!("{}: {err}", path.display())))?
            .len();
        if size > MAX_DATASET_FILE_BYTES {
            return Err(DatasetError::Load(format!(
                "{} exceeds size limit: {size} bytes (max {MAX_DATASET_FILE_BYTES})",
                path.display()
            )));
        }
        let mut rows = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| DatasetError::Load(err.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: Interaction = serde_json::from_str(&line).map_err(|err| {
                DatasetError::Load(format!("{} line {}: {err}", path.display(), index + 1))
            })?;
            rows.push(row);
        }
        Ok(InteractionFrame::new(rows))
    }
}

// ============================================================================
// SECTION: Synthetic Catalog
// ============================================================================

/// Catalog generating a deterministic interaction log per dataset name.
#[derive(Debug, Clone)]
pub struct SyntheticDatasetCatalog {
    /// Identifiers this catalog serves.
    allowed: BTreeSet<String>,
}

impl Default for SyntheticDatasetCatalog {
    fn default() -> Self {
        Self::new(KNOWN_DATASETS.iter().map(ToString::to_string))
    }
}

impl SyntheticDatasetCatalog {
    /// Creates a catalog serving `allowed` identifiers.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl DatasetCatalog for SyntheticDatasetCatalog {
    fn contains(&self, dataset_id: &str) -> bool {
        self.allowed.contains(dataset_id)
    }

    fn load(&self, dataset_id: &str) -> Result<InteractionFrame, DatasetError> {
        if !self.contains(dataset_id) {
            return Err(DatasetError::Unknown(dataset_id.to_string()));
        }
        let mut rng = StdRng::seed_from_u64(seed_for(dataset_id));
        let mut rows: Vec<Interaction> = (0..SYNTHETIC_INTERACTIONS)
            .map(|_| Interaction {
                interactionid: 0,
                uid: rng.gen_range(0..SYNTHETIC_USERS),
                iid: rng.gen_range(0..SYNTHETIC_ITEMS),
                ts: SYNTHETIC_START_TS + rng.gen_range(0..SYNTHETIC_SPAN_SECS),
            })
            .collect();
        rows.sort_by_key(|row| row.ts);
        for (index, row) in rows.iter_mut().enumerate() {
            row.interactionid = i64::try_from(index)
                .map_err(|_| DatasetError::Load("interaction id overflow".to_string()))?;
        }
        Ok(InteractionFrame::new(rows))
    }
}

/// Derives a stable seed from a dataset identifier (FNV-1a).
fn seed_for(dataset_id: &str) -> u64 {
    dataset_id.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
