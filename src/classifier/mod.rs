//! Exoplanet disposition classifier
//!
//! Turns light curves or catalogue features into the ordered numeric rows a
//! frozen model expects, and reads the model's class distribution back as
//! a disposition.
//!
//! Pipeline: light curve → statistics → engineered features → schema
//! alignment → scaling → class probabilities → decision rule

pub mod decision;
pub mod features;
pub mod loader;
pub mod model;
pub mod preprocessor;
pub mod scaler;
pub mod stats;

pub use features::{FeatureExtractor, FeatureVector};
pub use loader::{ModelLoader, ModelMetadata};
pub use model::{GbdtClassifier, ModelKind, ProbabilisticClassifier, SoftmaxClassifier};
pub use preprocessor::{align_features, FeaturePreprocessor};
pub use scaler::{FittedScaler, ScaleTransform};
