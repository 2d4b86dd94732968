//! Model artifact loader
//!
//! Loads the classifier and scaler from a model directory by filename
//! convention. Loading happens at most once per loader: concurrent first
//! calls are serialised by the `OnceCell`, and every caller observes the
//! same artifacts afterwards. A failed load leaves the loader empty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::debug;

use super::model::{GbdtClassifier, ModelKind, ProbabilisticClassifier, SoftmaxClassifier};
use super::scaler::FittedScaler;
use crate::config::ModelConfig;
use crate::error::{DetectionError, Result};

pub const DEFAULT_MODEL_FILE: &str = "exoplanet_model.json";
pub const DEFAULT_SCALER_FILE: &str = "scaler.json";

/// Descriptive metadata about the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub kind: ModelKind,
    pub path: PathBuf,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    pub scaled: bool,
}

/// Artifacts produced by a successful load.
pub struct LoadedArtifacts {
    model: Arc<dyn ProbabilisticClassifier>,
    scaler: Option<Arc<FittedScaler>>,
    metadata: ModelMetadata,
}

impl LoadedArtifacts {
    pub fn model(&self) -> Arc<dyn ProbabilisticClassifier> {
        Arc::clone(&self.model)
    }

    pub fn scaler(&self) -> Option<Arc<FittedScaler>> {
        self.scaler.clone()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// One-time loader for the frozen classifier and scaler.
pub struct ModelLoader {
    model_dir: PathBuf,
    model_file: String,
    scaler_file: Option<String>,
    kind: ModelKind,
    artifacts: OnceCell<LoadedArtifacts>,
}

impl ModelLoader {
    /// Loader using the default filenames and the softmax artifact format.
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            scaler_file: Some(DEFAULT_SCALER_FILE.to_string()),
            kind: ModelKind::default(),
            artifacts: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            model_dir: config.dir.clone(),
            model_file: config.model_file.clone(),
            scaler_file: config.scaler_file.clone().filter(|s| !s.is_empty()),
            kind: config.kind,
            artifacts: OnceCell::new(),
        }
    }

    pub fn with_model_file(mut self, name: impl Into<String>) -> Self {
        self.model_file = name.into();
        self
    }

    /// `None` disables scaling.
    pub fn with_scaler_file(mut self, name: Option<String>) -> Self {
        self.scaler_file = name;
        self
    }

    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn scaler_path(&self) -> Option<PathBuf> {
        self.scaler_file.as_ref().map(|f| self.model_dir.join(f))
    }

    /// Load model and scaler. A no-op once loaded.
    pub fn load_all(&self) -> Result<&LoadedArtifacts> {
        self.artifacts.get_or_try_init(|| self.read_artifacts())
    }

    pub fn is_loaded(&self) -> bool {
        self.artifacts.get().is_some()
    }

    fn loaded(&self, what: &str) -> Result<&LoadedArtifacts> {
        self.artifacts.get().ok_or_else(|| {
            DetectionError::ModelNotLoaded(format!("{what} requested before load_all() succeeded"))
        })
    }

    pub fn get_model(&self) -> Result<Arc<dyn ProbabilisticClassifier>> {
        Ok(self.loaded("model")?.model())
    }

    /// The fitted scaler, or `None` when scaling is disabled.
    pub fn get_scaler(&self) -> Result<Option<Arc<FittedScaler>>> {
        Ok(self.loaded("scaler")?.scaler())
    }

    pub fn model_info(&self) -> Result<&ModelMetadata> {
        Ok(self.loaded("model info")?.metadata())
    }

    fn read_artifacts(&self) -> Result<LoadedArtifacts> {
        let model_path = self.model_path();
        let model = self.read_model(&model_path)?;

        let scaler = match self.scaler_path() {
            Some(path) => Some(Arc::new(read_scaler(&path)?)),
            None => None,
        };

        let feature_names: Vec<String> = scaler
            .as_deref()
            .and_then(FittedScaler::feature_names)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let feature_count = match (&scaler, model.input_width()) {
            (Some(s), _) => s.width(),
            (None, Some(width)) => width,
            (None, None) => feature_names.len(),
        };

        if let (Some(s), Some(width)) = (&scaler, model.input_width()) {
            if s.width() != width {
                return Err(DetectionError::model_load(
                    &model_path,
                    format!("model expects {width} features but scaler produces {}", s.width()),
                ));
            }
        }

        let metadata = ModelMetadata {
            name: model.name().unwrap_or_else(|| self.model_file.clone()),
            kind: model.kind(),
            path: model_path,
            feature_count,
            feature_names,
            classes: model.classes(),
            scaled: scaler.is_some(),
        };

        debug!(
            "Loaded {} model {} ({} features, {} classes)",
            metadata.kind,
            metadata.path.display(),
            metadata.feature_count,
            metadata.classes.len()
        );

        Ok(LoadedArtifacts {
            model,
            scaler,
            metadata,
        })
    }

    fn read_model(&self, path: &Path) -> Result<Arc<dyn ProbabilisticClassifier>> {
        if !path.exists() {
            return Err(DetectionError::model_load(path, "model file not found"));
        }
        debug!("Reading {} model from {}", self.kind, path.display());

        let model: Arc<dyn ProbabilisticClassifier> = match self.kind {
            ModelKind::Softmax => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| DetectionError::model_load(path, e))?;
                let model =
                    SoftmaxClassifier::from_json(&content).map_err(|e| at_path(path, e))?;
                Arc::new(model)
            }
            ModelKind::Gbdt => Arc::new(GbdtClassifier::load(path)?),
            ModelKind::Xgboost => Arc::new(GbdtClassifier::load_xgboost(path)?),
        };
        Ok(model)
    }
}

fn read_scaler(path: &Path) -> Result<FittedScaler> {
    if !path.exists() {
        return Err(DetectionError::model_load(path, "scaler file not found"));
    }
    debug!("Reading scaler from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| DetectionError::model_load(path, e))?;
    let scaler: FittedScaler =
        serde_json::from_str(&content).map_err(|e| DetectionError::model_load(path, e))?;
    scaler.check_shape().map_err(|e| at_path(path, e))?;
    Ok(scaler)
}

/// Attribute an artifact error to the file it came from.
fn at_path(path: &Path, err: DetectionError) -> DetectionError {
    match err {
        DetectionError::ModelLoad { reason, .. } => DetectionError::model_load(path, reason),
        DetectionError::InvalidFeatures(reason) => DetectionError::model_load(path, reason),
        other => DetectionError::model_load(path, other),
    }
}
