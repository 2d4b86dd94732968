//! Frozen probabilistic classifiers
//!
//! Two artifact families are supported:
//! - [`SoftmaxClassifier`]: multinomial linear model, `softmax(W·x + b)`,
//!   stored as plain JSON. Two or three output classes.
//! - [`GbdtClassifier`]: binary gradient-boosted trees via the `gbdt`
//!   crate, loaded from gbdt-rs JSON or an XGBoost dump. The single
//!   exoplanet probability `p` is exposed as `[1 - p, p]`.
//!
//! Note: the gbdt crate works in `f32`; conversions happen at the boundary.

use std::io::Cursor;
use std::path::Path;

use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Source recorded on load errors for models parsed from strings.
const INLINE_SOURCE: &str = "<inline>";

/// Output widths the decision rule understands: binary or three-class.
const MIN_CLASSES: usize = 2;
const MAX_CLASSES: usize = 3;

/// Artifact family, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Softmax,
    Gbdt,
    Xgboost,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Softmax => write!(f, "softmax"),
            ModelKind::Gbdt => write!(f, "gbdt"),
            ModelKind::Xgboost => write!(f, "xgboost"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "softmax" => Ok(ModelKind::Softmax),
            "gbdt" => Ok(ModelKind::Gbdt),
            "xgboost" => Ok(ModelKind::Xgboost),
            other => Err(format!("unknown model kind '{other}' (expected softmax, gbdt or xgboost)")),
        }
    }
}

/// A frozen model producing a probability distribution over classes.
pub trait ProbabilisticClassifier: Send + Sync {
    /// Class probabilities for one preprocessed row, in the model's class order.
    fn predict_probabilities(&self, row: &[f64]) -> Result<Vec<f64>>;

    /// Number of input columns, when the artifact records it.
    fn input_width(&self) -> Option<usize>;

    /// Class labels in output order.
    fn classes(&self) -> Vec<String>;

    fn kind(&self) -> ModelKind;

    /// Name recorded in the artifact, if any.
    fn name(&self) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// Softmax (multinomial logistic) model
// ---------------------------------------------------------------------------

/// Multinomial linear classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxClassifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Class labels, e.g. `["FALSE_POSITIVE", "CANDIDATE", "CONFIRMED"]`
    classes: Vec<String>,
    /// One weight row per class `[n_classes x n_features]`
    weights: Vec<Vec<f64>>,
    /// One bias per class
    bias: Vec<f64>,
}

impl SoftmaxClassifier {
    pub fn new(classes: Vec<String>, weights: Vec<Vec<f64>>, bias: Vec<f64>) -> Result<Self> {
        let model = Self {
            name: None,
            classes,
            weights,
            bias,
        };
        model.check_shape()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)
            .map_err(|e| DetectionError::model_load(INLINE_SOURCE, format!("failed to parse softmax model: {e}")))?;
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<()> {
        let n = self.classes.len();
        if !(MIN_CLASSES..=MAX_CLASSES).contains(&n) {
            return Err(DetectionError::model_load(
                INLINE_SOURCE,
                format!("softmax model needs two or three classes, has {n}"),
            ));
        }
        if self.weights.len() != n || self.bias.len() != n {
            return Err(DetectionError::model_load(
                INLINE_SOURCE,
                format!(
                    "softmax model has {n} classes but {} weight rows and {} biases",
                    self.weights.len(),
                    self.bias.len()
                ),
            ));
        }
        let width = self.weights[0].len();
        if self.weights.iter().any(|row| row.len() != width) {
            return Err(DetectionError::model_load(
                INLINE_SOURCE,
                "softmax weight rows differ in width",
            ));
        }
        Ok(())
    }
}

impl ProbabilisticClassifier for SoftmaxClassifier {
    fn predict_probabilities(&self, row: &[f64]) -> Result<Vec<f64>> {
        let width = self.weights[0].len();
        if row.len() != width {
            return Err(DetectionError::InvalidFeatures(format!(
                "model expects {width} features, got {}",
                row.len()
            )));
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| b + w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>())
            .collect();

        Ok(softmax(&logits))
    }

    fn input_width(&self) -> Option<usize> {
        self.weights.first().map(Vec::len)
    }

    fn classes(&self) -> Vec<String> {
        self.classes.clone()
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Softmax
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// ---------------------------------------------------------------------------
// GBDT model
// ---------------------------------------------------------------------------

/// Binary boosted-tree classifier.
pub struct GbdtClassifier {
    model: GBDT,
    kind: ModelKind,
}

impl GbdtClassifier {
    /// Load a model from the gbdt-rs native JSON format on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DetectionError::model_load(path, "invalid UTF-8 in model path"))?;
        let model = GBDT::load_model(path_str)
            .map_err(|e| DetectionError::model_load(path, format!("failed to load GBDT model: {e}")))?;
        Ok(Self {
            model,
            kind: ModelKind::Gbdt,
        })
    }

    /// Load a model from an XGBoost JSON dump on disk (`binary:logistic`).
    pub fn load_xgboost(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DetectionError::model_load(path, "invalid UTF-8 in model path"))?;
        let model = GBDT::from_xgboost_dump(path_str, "binary:logistic")
            .map_err(|e| DetectionError::model_load(path, format!("failed to load XGBoost dump: {e}")))?;
        Ok(Self {
            model,
            kind: ModelKind::Xgboost,
        })
    }

    /// Load a model from a gbdt-rs JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let model: GBDT = serde_json::from_str(json)
            .map_err(|e| DetectionError::model_load(INLINE_SOURCE, format!("failed to parse GBDT JSON: {e}")))?;
        Ok(Self {
            model,
            kind: ModelKind::Gbdt,
        })
    }

    /// Load a model from an XGBoost JSON dump string.
    pub fn from_xgboost_json(json: &str) -> Result<Self> {
        let reader = std::io::BufReader::new(Cursor::new(json));
        let model = GBDT::from_xgboost_reader(reader, "binary:logistic")
            .map_err(|e| DetectionError::model_load(INLINE_SOURCE, format!("failed to parse XGBoost JSON: {e}")))?;
        Ok(Self {
            model,
            kind: ModelKind::Xgboost,
        })
    }

    /// Wrap an already-trained `GBDT` instance.
    pub fn from_trained(model: GBDT) -> Self {
        Self {
            model,
            kind: ModelKind::Gbdt,
        }
    }
}

impl ProbabilisticClassifier for GbdtClassifier {
    fn predict_probabilities(&self, row: &[f64]) -> Result<Vec<f64>> {
        let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        let data = vec![Data::new_test_data(features, None)];
        let preds = self.model.predict(&data);
        let exoplanet = preds.first().copied().ok_or_else(|| {
            DetectionError::InvalidFeatures("GBDT model returned no prediction".into())
        })? as f64;
        let exoplanet = exoplanet.clamp(0.0, 1.0);
        Ok(vec![1.0 - exoplanet, exoplanet])
    }

    fn input_width(&self) -> Option<usize> {
        None
    }

    fn classes(&self) -> Vec<String> {
        vec!["NOT_EXOPLANET".into(), "EXOPLANET".into()]
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }
}
