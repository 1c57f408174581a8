// crates/evalstream-engine/src/lib.rs
// ============================================================================
// Module: Evalstream Engine Library
// Description: Sliding-window recommender evaluation engine.
// Purpose: Provide the session object persisted by the evalstream registry.
// Dependencies: evalstream-core, rand, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The engine turns a timestamped interaction log into a sequence of
//! evaluation windows and scores algorithm predictions window by window.
//! [`EvaluatorStream`] implements the core session traits so the registry can
//! freeze, store, and thaw it between requests; [`EvaluatorFactory`] builds
//! new streams from a [`DatasetCatalog`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dataset;
pub mod evaluator;
pub mod metric;
pub mod prediction;
pub mod setting;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dataset::DatasetCatalog;
pub use dataset::DatasetError;
pub use dataset::DirectoryDatasetCatalog;
pub use dataset::InMemoryDatasetCatalog;
pub use dataset::Interaction;
pub use dataset::InteractionFrame;
pub use dataset::KNOWN_DATASETS;
pub use dataset::SyntheticDatasetCatalog;
pub use evaluator::AlgorithmHandle;
pub use evaluator::DataRelease;
pub use evaluator::EvaluatorConfig;
pub use evaluator::EvaluatorFactory;
pub use evaluator::EvaluatorStream;
pub use evaluator::MacroMetric;
pub use evaluator::MetricReport;
pub use evaluator::MicroMetric;
pub use evaluator::SESSION_SCHEMA_VERSION;
pub use evaluator::StreamSettings;
pub use metric::MetricKind;
pub use prediction::CsrMatrix;
pub use prediction::Prediction;
pub use setting::SettingKind;
pub use setting::SettingParams;
