//! Error types for data loading and persistence.

use thiserror::Error;

/// Errors that can occur while loading, validating or persisting data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PLY parsing error: {0}")]
    Ply(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing '{property}' at vertex {vertex}")]
    MissingProperty { property: &'static str, vertex: usize },

    #[error("Invalid face {face}: {reason}")]
    InvalidFace { face: usize, reason: String },

    #[error("Invalid GPC system for center {center}: {reason}")]
    InvalidGpcSystem { center: usize, reason: String },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Store format error: {0}")]
    Format(String),

    #[error("No GPC system stored for vertex {0}")]
    MissingRecord(usize),
}
