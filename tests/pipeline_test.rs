//! End-to-end pipeline tests
//!
//! Writes model artifacts to a temp dir, loads them through `ModelLoader`
//! and drives `DetectionService` from light curves, feature maps and raw
//! JSON requests.

use std::path::Path;
use std::sync::Arc;

use exodetect::classifier::features::names;
use exodetect::classifier::model::ModelKind;
use exodetect::{
    ConfidenceLevel, DetectionError, DetectionRequest, DetectionService, Disposition,
    FeatureExtractor, FeatureVector, LightCurve, ModelLoader, Prediction,
};
use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;

// Three classes over [transit_depth, transit_duration]. A flat curve leans
// FALSE_POSITIVE through the bias; a 10% dip lasting one time unit pushes
// the CONFIRMED logit to 18.
const THREE_CLASS_MODEL: &str = r#"{
    "name": "disposition-softmax",
    "classes": ["FALSE_POSITIVE", "CANDIDATE", "CONFIRMED"],
    "weights": [[0.0, 0.0], [0.0, 0.0], [200.0, 1.0]],
    "bias": [1.0, 0.0, -3.0]
}"#;

const IDENTITY_SCALER: &str = r#"{
    "feature_names": ["transit_depth", "transit_duration"],
    "transform": {"kind": "standard", "mean": [0.0, 0.0], "scale": [1.0, 1.0]}
}"#;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn three_class_service() -> (tempfile::TempDir, DetectionService) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "exoplanet_model.json", THREE_CLASS_MODEL);
    write(dir.path(), "scaler.json", IDENTITY_SCALER);
    let service = DetectionService::new(Arc::new(ModelLoader::new(dir.path()))).unwrap();
    (dir, service)
}

fn transit_curve() -> LightCurve {
    let time: Vec<f64> = (0..10).map(f64::from).collect();
    let mut flux = vec![1.0; 10];
    flux[4] = 0.9;
    flux[5] = 0.9;
    LightCurve::new(time, flux, None).unwrap()
}

fn flat_curve() -> LightCurve {
    let time: Vec<f64> = (0..10).map(f64::from).collect();
    LightCurve::new(time, vec![1.0; 10], None).unwrap()
}

#[test]
fn test_transit_curve_is_confirmed() {
    let (_dir, service) = three_class_service();
    let result = service.detect(&transit_curve()).unwrap();

    assert!(result.is_exoplanet());
    assert_eq!(result.classification(), Disposition::Confirmed);
    assert!(result.is_confirmed());
    assert!(result.is_high_confidence());
    assert_eq!(result.confidence().level(), ConfidenceLevel::VeryHigh);
}

#[test]
fn test_flat_curve_is_false_positive() {
    let (_dir, service) = three_class_service();
    let result = service.detect(&flat_curve()).unwrap();

    assert!(!result.is_exoplanet());
    assert_eq!(result.classification(), Disposition::FalsePositive);
    assert!(!result.is_confirmed());
}

#[test]
fn test_light_curve_and_extracted_features_agree() {
    let (_dir, service) = three_class_service();
    let curve = transit_curve();
    let features = FeatureExtractor::new().extract(&curve);

    assert_eq!(
        service.detect(&curve).unwrap(),
        service.detect_from_features(&features).unwrap()
    );
}

#[test]
fn test_reference_light_curve_features() {
    let curve = LightCurve::new(
        vec![0.0, 1.0, 2.0, 3.0],
        vec![1.0, 0.95, 0.98, 1.0],
        None,
    )
    .unwrap();
    let features = FeatureExtractor::new().extract(&curve);

    let get = |name: &str| features.get(name).unwrap();
    assert!((get(names::FLUX_RANGE) - 0.05).abs() < 1e-12);
    assert!((get(names::FLUX_RATIO) - 1.0 / 0.95).abs() < 1e-12);
    // median of [0.95, 0.98, 1.0, 1.0] is 0.99
    assert!((get(names::MEDIAN_FLUX) - 0.99).abs() < 1e-12);
    assert!((get(names::TRANSIT_DEPTH) - 0.04 / 0.99).abs() < 1e-12);
}

#[test]
fn test_execute_returns_serializable_prediction() {
    let (_dir, service) = three_class_service();
    let request = DetectionRequest::from_json(
        r#"{"light_curve": {
            "time": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            "flux": [1, 1, 1, 1, 0.9, 0.9, 1, 1, 1, 1],
            "metadata": {"target": "KOI-0001"}
        }}"#,
    )
    .unwrap();

    let prediction = service.execute(request).unwrap();
    assert!(prediction.input_features.is_none());
    let curve = prediction.light_curve.as_ref().unwrap();
    assert_eq!(curve.len(), 10);
    assert_eq!(
        curve.metadata().and_then(|m| m.get("target")).and_then(|v| v.as_str()),
        Some("KOI-0001")
    );

    let json = serde_json::to_value(&prediction).unwrap();
    assert_eq!(json["classification"], "CONFIRMED");
    assert_eq!(json["confidence_level"], "VERY_HIGH");
    assert_eq!(json["is_exoplanet"], true);

    let restored: Prediction = serde_json::from_value(json).unwrap();
    assert_eq!(restored, prediction);
    assert_eq!(restored.classification(), Disposition::Confirmed);
}

#[test]
fn test_feature_requests_from_catalogue_columns() {
    let (_dir, service) = three_class_service();
    // Catalogue rows carry no light-curve columns: alignment zero-fills them.
    let request = DetectionRequest::from_json(
        r#"{"features": {"orbital_period": 3.52, "planet_radius": 1.3, "signal_to_noise": 12.0}}"#,
    )
    .unwrap();
    let prediction = service.execute(request).unwrap();
    assert_eq!(prediction.classification(), Disposition::FalsePositive);
}

#[test]
fn test_client_errors_are_flagged() {
    let (_dir, service) = three_class_service();

    let err = service.detect_from_features(&FeatureVector::new()).unwrap_err();
    assert!(err.is_client_error());

    let err = DetectionRequest::from_json("{}").unwrap_err();
    assert!(err.is_client_error());

    let err = LightCurve::new(vec![], vec![], None).unwrap_err();
    assert!(matches!(err, DetectionError::InvalidLightCurve(_)));
    assert!(err.is_client_error());
}

#[test]
fn test_model_info_reports_schema() {
    let (dir, service) = three_class_service();
    let info = service.model_info().unwrap();

    assert_eq!(info.name, "disposition-softmax");
    assert_eq!(info.kind, ModelKind::Softmax);
    assert_eq!(info.path, dir.path().join("exoplanet_model.json"));
    assert_eq!(info.feature_count, 2);
    assert_eq!(info.feature_names, vec!["transit_depth", "transit_duration"]);
    assert_eq!(info.classes, vec!["FALSE_POSITIVE", "CANDIDATE", "CONFIRMED"]);
}

#[test]
fn test_shared_service_across_threads() {
    let (_dir, service) = three_class_service();
    let service = Arc::new(service);
    let expected = service.detect(&transit_curve()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.detect(&transit_curve()).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_gbdt_artifact_end_to_end() {
    let mut cfg = Config::new();
    cfg.set_feature_size(1);
    cfg.set_max_depth(2);
    cfg.set_iterations(20);
    cfg.set_shrinkage(0.3);
    cfg.set_loss("LogLikelyhood");
    cfg.set_debug(false);
    cfg.set_min_leaf_size(1);

    // High signal-to-noise is a planet.
    let mut training: Vec<Data> = (0..40)
        .map(|i| {
            let snr = i as f32;
            let label = if snr >= 20.0 { 1.0 } else { -1.0 };
            Data::new_training_data(vec![snr], 1.0, label, None)
        })
        .collect();
    let mut model = GBDT::new(&cfg);
    model.fit(&mut training);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.gbdt.json");
    model.save_model(path.to_str().unwrap()).unwrap();

    let loader = ModelLoader::new(dir.path())
        .with_model_file("model.gbdt.json")
        .with_scaler_file(None)
        .with_kind(ModelKind::Gbdt);
    let service = DetectionService::new(Arc::new(loader)).unwrap();

    let strong: FeatureVector = [(names::SIGNAL_TO_NOISE, 35.0)].into_iter().collect();
    let weak: FeatureVector = [(names::SIGNAL_TO_NOISE, 2.0)].into_iter().collect();
    let strong = service.detect_from_features(&strong).unwrap();
    let weak = service.detect_from_features(&weak).unwrap();

    assert!(strong.is_exoplanet());
    assert!(!weak.is_exoplanet());
    assert_eq!(strong.planet_probability(), strong.candidate_probability());
    assert_eq!(weak.classification(), Disposition::FalsePositive);
    assert_eq!(service.model_info().unwrap().classes.len(), 2);
}
