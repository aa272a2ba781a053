//! Error types for the fatigue engine

use crate::types::MetricKind;
use thiserror::Error;

/// Errors surfaced by the engine and its collaborators.
///
/// Nothing here is fatal to scoring: `NoData` and provider failures degrade
/// the affected metric to a zero contribution, and persistence failures are
/// logged and skipped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Signal type not supported by the platform: {0}")]
    ProviderUnavailable(MetricKind),

    #[error("Access denied for signal type: {0}")]
    AccessDenied(MetricKind),

    #[error("Query succeeded but returned no samples")]
    NoData,

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
