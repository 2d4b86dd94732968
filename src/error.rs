//! Error taxonomy for the detection pipeline
//!
//! Input defects (`InvalidLightCurve`, `InvalidFeatures`, `InvalidRequest`)
//! are raised where the invariant is checked and are never retried.
//! Artifact errors (`ModelLoad`, `ModelNotLoaded`) abort service readiness.
//! `InvalidProbability` means a model emitted a value outside `[0, 1]`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the detection pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Invalid light curve: {0}")]
    InvalidLightCurve(String),

    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Probability out of range: {0}")]
    InvalidProbability(String),

    #[error("Failed to load model artifact {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),
}

impl DetectionError {
    /// True for errors caused by caller input rather than process state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DetectionError::InvalidLightCurve(_)
                | DetectionError::InvalidFeatures(_)
                | DetectionError::InvalidRequest(_)
        )
    }

    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        DetectionError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectionError>;
