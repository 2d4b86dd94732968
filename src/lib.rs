//! exodetect - exoplanet transit detection
//!
//! Classifies transiting-object candidates from light curves or
//! pre-extracted catalogue features using a frozen, pre-fitted model.

pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod models;
pub mod request;

pub use classifier::{FeatureExtractor, FeaturePreprocessor, FeatureVector, ModelLoader};
pub use detector::DetectionService;
pub use error::{DetectionError, Result};
pub use models::{
    ConfidenceLevel, ConfidenceScore, DetectionResult, Disposition, LightCurve, Prediction,
};
pub use request::DetectionRequest;
