//! Fitted feature scaler
//!
//! Mirrors the scalers the disposition models are trained with. The
//! artifact optionally records the ordered feature names seen at fit time,
//! which the preprocessor uses for schema alignment.

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Per-column transform parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScaleTransform {
    /// `(x - mean) / scale`; a zero scale is treated as 1.
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

/// Scaler artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    transform: ScaleTransform,
}

impl FittedScaler {
    pub fn new(feature_names: Option<Vec<String>>, transform: ScaleTransform) -> Result<Self> {
        let scaler = Self {
            feature_names,
            transform,
        };
        scaler.check_shape()?;
        Ok(scaler)
    }

    /// Expected ordered feature names, when recorded at fit time.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Number of columns the transform expects.
    pub fn width(&self) -> usize {
        match &self.transform {
            ScaleTransform::Standard { mean, .. } => mean.len(),
            ScaleTransform::MinMax { min, .. } => min.len(),
        }
    }

    /// Internal consistency of the artifact.
    pub fn check_shape(&self) -> Result<()> {
        let (a, b) = match &self.transform {
            ScaleTransform::Standard { mean, scale } => (mean.len(), scale.len()),
            ScaleTransform::MinMax { min, scale } => (min.len(), scale.len()),
        };
        if a != b {
            return Err(DetectionError::InvalidFeatures(format!(
                "scaler parameters disagree in width ({a} vs {b})"
            )));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != a {
                return Err(DetectionError::InvalidFeatures(format!(
                    "scaler records {} feature names but has {} columns",
                    names.len(),
                    a
                )));
            }
        }
        Ok(())
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(DetectionError::InvalidFeatures(format!(
                "scaler expects {} features, got {}",
                self.width(),
                row.len()
            )));
        }
        let scaled = match &self.transform {
            ScaleTransform::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / if *s == 0.0 { 1.0 } else { *s })
                .collect(),
            ScaleTransform::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (lo, s))| x * s + lo)
                .collect(),
        };
        Ok(scaled)
    }
}
