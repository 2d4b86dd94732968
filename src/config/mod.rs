//! Configuration module for exodetect
//!
//! This module handles:
//! - Model artifact location and format
//! - Detection reporting thresholds

mod detector_config;

pub use detector_config::{
    DetectionConfig,
    DetectorConfig,
    ModelConfig,
    ENV_MODEL_DIR,
    ENV_MODEL_KIND,
    PROJECT_CONFIG_FILE,
};
