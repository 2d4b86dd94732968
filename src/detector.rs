//! Detection service
//!
//! Wires extraction, preprocessing and the frozen classifier together and
//! turns raw class probabilities into a [`DetectionResult`]. The service
//! holds only read-only handles, so one instance can be shared across
//! threads.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::classifier::decision;
use crate::classifier::features::{FeatureExtractor, FeatureVector};
use crate::classifier::loader::{ModelLoader, ModelMetadata};
use crate::classifier::model::ProbabilisticClassifier;
use crate::classifier::preprocessor::FeaturePreprocessor;
use crate::error::Result;
use crate::models::{DetectionResult, LightCurve, Prediction, PredictionInput};
use crate::request::{DetectionRequest, RequestInput};

pub struct DetectionService {
    loader: Arc<ModelLoader>,
    model: Arc<dyn ProbabilisticClassifier>,
    extractor: FeatureExtractor,
    preprocessor: FeaturePreprocessor,
}

impl DetectionService {
    /// Build the service, loading the artifacts if that has not happened yet.
    pub fn new(loader: Arc<ModelLoader>) -> Result<Self> {
        loader.load_all()?;
        let model = loader.get_model()?;
        let preprocessor = FeaturePreprocessor::new(loader.get_scaler()?);
        Ok(Self {
            loader,
            model,
            extractor: FeatureExtractor::new(),
            preprocessor,
        })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    pub fn model_info(&self) -> Result<&ModelMetadata> {
        self.loader.model_info()
    }

    /// Extract features from a light curve and classify them.
    pub fn detect(&self, light_curve: &LightCurve) -> Result<DetectionResult> {
        let features = self.extractor.extract(light_curve);
        debug!(
            "Extracted {} features from {} observations",
            features.len(),
            light_curve.len()
        );
        self.detect_from_features(&features)
    }

    pub fn detect_from_features(&self, features: &FeatureVector) -> Result<DetectionResult> {
        self.preprocessor.validate(features)?;
        let row = self.preprocessor.preprocess(features)?;
        let result = self.score_row(&row)?;
        debug!(
            "Classified {} input features as {} (planet {:.3}, candidate {:.3})",
            features.len(),
            result.classification(),
            result.planet_probability(),
            result.candidate_probability()
        );
        Ok(result)
    }

    /// Score many feature vectors sharing one schema.
    ///
    /// Every row is validated before any scoring; the first invalid row fails
    /// the whole batch.
    pub fn detect_batch(&self, batch: &[FeatureVector]) -> Result<Vec<DetectionResult>> {
        for features in batch {
            self.preprocessor.validate(features)?;
        }
        let rows = self.preprocessor.preprocess_batch(batch)?;
        let results = rows
            .par_iter()
            .map(|row| self.score_row(row))
            .collect::<Result<Vec<_>>>()?;
        debug!("Scored batch of {} rows", results.len());
        Ok(results)
    }

    /// Resolve a request, run the pipeline and build the outbound record.
    pub fn execute(&self, request: DetectionRequest) -> Result<Prediction> {
        let prediction = match request.into_input()? {
            RequestInput::Features(features) => {
                let result = self.detect_from_features(&features)?;
                Prediction::new(&result, PredictionInput::Features(features))
            }
            RequestInput::LightCurve(light_curve) => {
                let result = self.detect(&light_curve)?;
                Prediction::new(&result, PredictionInput::LightCurve(light_curve))
            }
        };
        Ok(prediction)
    }

    fn score_row(&self, row: &[f64]) -> Result<DetectionResult> {
        // Output width is fixed to two or three classes at load.
        let probabilities = self.model.predict_probabilities(row)?;
        let clamped: Vec<f64> = probabilities
            .iter()
            .map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 })
            .collect();

        let interpretation = decision::interpret(&clamped);
        DetectionResult::new(
            interpretation.is_exoplanet,
            interpretation.planet_probability,
            interpretation.candidate_probability,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::features::names;
    use crate::classifier::loader::{DEFAULT_MODEL_FILE, DEFAULT_SCALER_FILE};
    use crate::error::DetectionError;
    use crate::models::Disposition;

    // Two classes, one input: logit difference is 4 * x.
    const BINARY_MODEL: &str = r#"{
        "classes": ["NOT_EXOPLANET", "EXOPLANET"],
        "weights": [[0.0], [4.0]],
        "bias": [0.0, 0.0]
    }"#;

    const BINARY_SCALER: &str = r#"{
        "feature_names": ["signal_to_noise"],
        "transform": {"kind": "standard", "mean": [10.0], "scale": [5.0]}
    }"#;

    fn service(model: &str, scaler: Option<&str>) -> (tempfile::TempDir, DetectionService) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_MODEL_FILE), model).unwrap();
        let loader = match scaler {
            Some(s) => {
                std::fs::write(dir.path().join(DEFAULT_SCALER_FILE), s).unwrap();
                ModelLoader::new(dir.path())
            }
            None => ModelLoader::new(dir.path()).with_scaler_file(None),
        };
        let service = DetectionService::new(Arc::new(loader)).unwrap();
        (dir, service)
    }

    fn fv(pairs: &[(&str, f64)]) -> FeatureVector {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_new_fails_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let err = DetectionService::new(Arc::new(ModelLoader::new(dir.path()))).err().unwrap();
        assert!(matches!(err, DetectionError::ModelLoad { .. }));
    }

    #[test]
    fn test_unsupported_output_width_fails_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_MODEL_FILE),
            r#"{
                "classes": ["A", "B", "C", "D"],
                "weights": [[0.0], [0.0], [0.0], [0.0]],
                "bias": [0.0, 0.0, 0.0, 0.0]
            }"#,
        )
        .unwrap();
        let loader = ModelLoader::new(dir.path()).with_scaler_file(None);
        let err = DetectionService::new(Arc::new(loader)).err().unwrap();
        assert!(matches!(err, DetectionError::ModelLoad { .. }));
    }

    #[test]
    fn test_binary_high_snr_is_confirmed() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        // scaled snr = (20 - 10) / 5 = 2, P(exoplanet) = sigmoid(8)
        let result = service
            .detect_from_features(&fv(&[(names::SIGNAL_TO_NOISE, 20.0)]))
            .unwrap();
        assert!(result.is_exoplanet());
        assert_eq!(result.classification(), Disposition::Confirmed);
        assert_eq!(result.planet_probability(), result.candidate_probability());
    }

    #[test]
    fn test_binary_low_snr_is_false_positive() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        let result = service
            .detect_from_features(&fv(&[(names::SIGNAL_TO_NOISE, 0.0)]))
            .unwrap();
        assert!(!result.is_exoplanet());
        assert_eq!(result.classification(), Disposition::FalsePositive);
    }

    #[test]
    fn test_empty_features_fail_validation() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        let err = service.detect_from_features(&FeatureVector::new()).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidFeatures(_)));
    }

    #[test]
    fn test_detect_from_light_curve_aligns_to_scaler_schema() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        let curve = LightCurve::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 0.95, 0.98, 1.0],
            None,
        )
        .unwrap();
        // signal_to_noise is absent from a light curve: aligned to 0, scaled to -2.
        let result = service.detect(&curve).unwrap();
        assert!(!result.is_exoplanet());
    }

    #[test]
    fn test_batch_matches_single_scoring_without_engineering() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        let batch = vec![
            fv(&[(names::SIGNAL_TO_NOISE, 20.0)]),
            fv(&[(names::SIGNAL_TO_NOISE, 0.0)]),
            fv(&[(names::SIGNAL_TO_NOISE, 12.0)]),
        ];
        let results = service.detect_batch(&batch).unwrap();
        assert_eq!(results.len(), 3);
        for (features, batched) in batch.iter().zip(&results) {
            assert_eq!(&service.detect_from_features(features).unwrap(), batched);
        }
    }

    #[test]
    fn test_batch_rejects_any_invalid_row() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        let batch = vec![fv(&[(names::SIGNAL_TO_NOISE, 20.0)]), FeatureVector::new()];
        assert!(service.detect_batch(&batch).is_err());
    }

    #[test]
    fn test_three_class_false_positive_mass_wins() {
        // Zero weights: probabilities follow the bias alone.
        let model = format!(
            r#"{{
                "classes": ["FALSE_POSITIVE", "CANDIDATE", "CONFIRMED"],
                "weights": [[0.0], [0.0], [0.0]],
                "bias": [{}, {}, {}]
            }}"#,
            0.6f64.ln(),
            0.3f64.ln(),
            0.1f64.ln()
        );
        let (_dir, service) = service(&model, None);
        let result = service.detect_from_features(&fv(&[("x", 1.0)])).unwrap();
        assert!(!result.is_exoplanet());
        assert_eq!(result.classification(), Disposition::FalsePositive);
        assert!((result.planet_probability() - 0.1).abs() < 1e-9);
        assert!((result.candidate_probability() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_execute_prefers_features_and_echoes_input() {
        let (_dir, service) = service(BINARY_MODEL, Some(BINARY_SCALER));
        let request = DetectionRequest::from_json(
            r#"{
                "light_curve": {"time": [0.0, 1.0], "flux": [1.0, 0.9]},
                "features": {"signal_to_noise": 20.0}
            }"#,
        )
        .unwrap();
        let prediction = service.execute(request).unwrap();
        assert!(prediction.light_curve.is_none());
        assert_eq!(
            prediction
                .input_features
                .as_ref()
                .and_then(|f| f.get(names::SIGNAL_TO_NOISE)),
            Some(20.0)
        );
        assert_eq!(prediction.classification(), Disposition::Confirmed);
    }

    #[test]
    fn test_service_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DetectionService>();
    }
}
