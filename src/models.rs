//! Core data models for exodetect
//!
//! Light curves, disposition results, confidence scores and the
//! prediction record handed to callers for storage or display.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::classifier::decision;
use crate::classifier::features::FeatureVector;
use crate::classifier::stats;
use crate::error::{DetectionError, Result};

/// Default relative dip used by [`LightCurve::has_transit_signal`].
pub const DEFAULT_TRANSIT_THRESHOLD: f64 = 0.01;

// ---------------------------------------------------------------------------
// Light curve
// ---------------------------------------------------------------------------

/// Raw light-curve payload as it arrives from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightCurvePayload {
    #[serde(default)]
    pub time: Vec<f64>,
    #[serde(default)]
    pub flux: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flux_err: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A validated time/brightness series.
///
/// Invariant: `time.len() == flux.len() > 0`, and `flux_err`, when present,
/// has the same length as `flux`. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LightCurvePayload", into = "LightCurvePayload")]
pub struct LightCurve {
    time: Vec<f64>,
    flux: Vec<f64>,
    flux_err: Option<Vec<f64>>,
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Shape summary of a light curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightCurveSummary {
    pub length: usize,
    pub time_span: f64,
    pub flux_min: f64,
    pub flux_max: f64,
}

impl LightCurve {
    pub fn new(time: Vec<f64>, flux: Vec<f64>, flux_err: Option<Vec<f64>>) -> Result<Self> {
        if time.len() != flux.len() {
            return Err(DetectionError::InvalidLightCurve(format!(
                "time and flux must have the same length ({} vs {})",
                time.len(),
                flux.len()
            )));
        }
        if time.is_empty() {
            return Err(DetectionError::InvalidLightCurve(
                "light curve must contain at least one sample".into(),
            ));
        }
        if let Some(err) = &flux_err {
            if err.len() != flux.len() {
                return Err(DetectionError::InvalidLightCurve(format!(
                    "flux_err must have the same length as flux ({} vs {})",
                    err.len(),
                    flux.len()
                )));
            }
        }
        Ok(Self {
            time,
            flux,
            flux_err,
            metadata: None,
        })
    }

    /// Attach free-form metadata (target id, mission, sector...).
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn flux_err(&self) -> Option<&[f64]> {
        self.flux_err.as_deref()
    }

    pub fn metadata(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.metadata.as_ref()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always false for a constructed curve; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Observation span, `max(time) - min(time)`; 0 for a single sample.
    pub fn time_span(&self) -> f64 {
        if self.time.len() < 2 {
            return 0.0;
        }
        stats::max(&self.time) - stats::min(&self.time)
    }

    /// `(min, max)` of the flux.
    pub fn flux_range(&self) -> (f64, f64) {
        (stats::min(&self.flux), stats::max(&self.flux))
    }

    /// Relative drop of the minimum below the median exceeds `threshold`.
    pub fn has_transit_signal(&self, threshold: f64) -> bool {
        let median = stats::median(&self.flux);
        if median == 0.0 {
            return false;
        }
        (median - stats::min(&self.flux)) / median > threshold
    }

    /// Divide flux by its median. Returns a new curve; `self` is untouched.
    ///
    /// `flux_err` is carried over unscaled.
    pub fn normalize(&self) -> Result<Self> {
        let median = stats::median(&self.flux);
        if median == 0.0 {
            return Err(DetectionError::InvalidLightCurve(
                "cannot normalize a light curve whose median flux is zero".into(),
            ));
        }
        Ok(Self {
            time: self.time.clone(),
            flux: self.flux.iter().map(|f| f / median).collect(),
            flux_err: self.flux_err.clone(),
            metadata: self.metadata.clone(),
        })
    }

    pub fn summary(&self) -> LightCurveSummary {
        let (flux_min, flux_max) = self.flux_range();
        LightCurveSummary {
            length: self.len(),
            time_span: self.time_span(),
            flux_min,
            flux_max,
        }
    }
}

impl TryFrom<LightCurvePayload> for LightCurve {
    type Error = DetectionError;

    fn try_from(payload: LightCurvePayload) -> Result<Self> {
        let curve = LightCurve::new(payload.time, payload.flux, payload.flux_err)?;
        Ok(match payload.metadata {
            Some(metadata) => curve.with_metadata(metadata),
            None => curve,
        })
    }
}

impl From<LightCurve> for LightCurvePayload {
    fn from(curve: LightCurve) -> Self {
        Self {
            time: curve.time,
            flux: curve.flux,
            flux_err: curve.flux_err,
            metadata: curve.metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Disposition and confidence
// ---------------------------------------------------------------------------

/// Disposition verdict for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Confirmed,
    LikelyConfirmed,
    Candidate,
    FalsePositive,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Confirmed => "CONFIRMED",
            Disposition::LikelyConfirmed => "LIKELY_CONFIRMED",
            Disposition::Candidate => "CANDIDATE",
            Disposition::FalsePositive => "FALSE_POSITIVE",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::VeryHigh => write!(f, "VERY_HIGH"),
            ConfidenceLevel::High => write!(f, "HIGH"),
            ConfidenceLevel::Medium => write!(f, "MEDIUM"),
            ConfidenceLevel::Low => write!(f, "LOW"),
            ConfidenceLevel::VeryLow => write!(f, "VERY_LOW"),
        }
    }
}

/// Confidence score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConfidenceScore(f64);

impl ConfidenceScore {
    /// Default threshold for [`ConfidenceScore::is_reliable`].
    pub const RELIABLE_THRESHOLD: f64 = 0.7;

    pub fn new(score: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&score) {
            return Err(DetectionError::InvalidProbability(format!(
                "confidence score must be within [0, 1], got {score}"
            )));
        }
        Ok(Self(score))
    }

    pub fn score(&self) -> f64 {
        self.0
    }

    pub fn level(&self) -> ConfidenceLevel {
        decision::confidence_level(self.0)
    }

    pub fn is_reliable(&self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl TryFrom<f64> for ConfidenceScore {
    type Error = DetectionError;

    fn try_from(score: f64) -> Result<Self> {
        Self::new(score)
    }
}

impl From<ConfidenceScore> for f64 {
    fn from(score: ConfidenceScore) -> Self {
        score.0
    }
}

impl std::fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}% ({})", self.0 * 100.0, self.level())
    }
}

// ---------------------------------------------------------------------------
// Detection result
// ---------------------------------------------------------------------------

/// Immutable outcome of one pipeline run.
///
/// `classification` is derived at construction from the three inputs and
/// cannot be set independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionResult {
    is_exoplanet: bool,
    classification: Disposition,
    planet_probability: f64,
    candidate_probability: f64,
}

impl DetectionResult {
    pub fn new(is_exoplanet: bool, planet_probability: f64, candidate_probability: f64) -> Result<Self> {
        check_probability("planet_probability", planet_probability)?;
        check_probability("candidate_probability", candidate_probability)?;
        Ok(Self {
            is_exoplanet,
            classification: decision::classify(
                is_exoplanet,
                planet_probability,
                candidate_probability,
            ),
            planet_probability,
            candidate_probability,
        })
    }

    pub fn is_exoplanet(&self) -> bool {
        self.is_exoplanet
    }

    pub fn classification(&self) -> Disposition {
        self.classification
    }

    pub fn planet_probability(&self) -> f64 {
        self.planet_probability
    }

    pub fn candidate_probability(&self) -> f64 {
        self.candidate_probability
    }

    /// CONFIRMED or LIKELY_CONFIRMED.
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.classification,
            Disposition::Confirmed | Disposition::LikelyConfirmed
        )
    }

    pub fn is_high_confidence(&self) -> bool {
        self.classification == Disposition::Confirmed
    }

    pub fn dominant_probability(&self) -> f64 {
        self.planet_probability.max(self.candidate_probability)
    }

    /// Confidence built from the dominant probability.
    pub fn confidence(&self) -> ConfidenceScore {
        // Both probabilities were range-checked in `new`.
        ConfidenceScore(self.dominant_probability())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DetectionError::InvalidProbability(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Prediction record
// ---------------------------------------------------------------------------

/// What a prediction was computed from.
#[derive(Debug, Clone)]
pub enum PredictionInput {
    LightCurve(LightCurve),
    Features(FeatureVector),
}

/// Outbound record of a detection, suitable for storage and display.
///
/// Neither the classification nor the confidence is stored: serialization,
/// [`Prediction::classification`] and [`Prediction::confidence`] recompute
/// them from the stored probabilities. Deserialization rejects
/// probabilities outside `[0, 1]` and ignores any stored derived values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "PredictionRecord")]
pub struct Prediction {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub light_curve: Option<LightCurve>,
    pub input_features: Option<FeatureVector>,
    pub is_exoplanet: bool,
    pub planet_probability: f64,
    pub candidate_probability: f64,
}

/// Stored shape of a [`Prediction`], before range checks.
#[derive(Deserialize)]
struct PredictionRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    #[serde(default)]
    light_curve: Option<LightCurve>,
    #[serde(default)]
    input_features: Option<FeatureVector>,
    is_exoplanet: bool,
    planet_probability: f64,
    candidate_probability: f64,
}

impl TryFrom<PredictionRecord> for Prediction {
    type Error = DetectionError;

    fn try_from(record: PredictionRecord) -> Result<Self> {
        check_probability("planet_probability", record.planet_probability)?;
        check_probability("candidate_probability", record.candidate_probability)?;
        Ok(Self {
            id: record.id,
            created_at: record.created_at,
            light_curve: record.light_curve,
            input_features: record.input_features,
            is_exoplanet: record.is_exoplanet,
            planet_probability: record.planet_probability,
            candidate_probability: record.candidate_probability,
        })
    }
}

impl Prediction {
    pub fn new(result: &DetectionResult, input: PredictionInput) -> Self {
        let (light_curve, input_features) = match input {
            PredictionInput::LightCurve(curve) => (Some(curve), None),
            PredictionInput::Features(features) => (None, Some(features)),
        };
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            light_curve,
            input_features,
            is_exoplanet: result.is_exoplanet(),
            planet_probability: result.planet_probability(),
            candidate_probability: result.candidate_probability(),
        }
    }

    pub fn classification(&self) -> Disposition {
        decision::classify(
            self.is_exoplanet,
            self.planet_probability,
            self.candidate_probability,
        )
    }

    /// Confidence from the dominant probability.
    ///
    /// The fields are public, so the value is clamped into `[0, 1]`.
    pub fn confidence(&self) -> ConfidenceScore {
        let dominant = self.planet_probability.max(self.candidate_probability);
        ConfidenceScore(if dominant.is_nan() { 0.0 } else { dominant.clamp(0.0, 1.0) })
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence().level()
    }

    pub fn is_high_confidence(&self, threshold: f64) -> bool {
        self.confidence().score() >= threshold
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Prediction", 10)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("created_at", &self.created_at)?;
        s.serialize_field("is_exoplanet", &self.is_exoplanet)?;
        s.serialize_field("classification", &self.classification())?;
        s.serialize_field("planet_probability", &self.planet_probability)?;
        s.serialize_field("candidate_probability", &self.candidate_probability)?;
        s.serialize_field("confidence_score", &self.confidence())?;
        s.serialize_field("confidence_level", &self.confidence_level())?;
        s.serialize_field("light_curve", &self.light_curve)?;
        s.serialize_field("input_features", &self.input_features)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn curve(time: Vec<f64>, flux: Vec<f64>) -> LightCurve {
        LightCurve::new(time, flux, None).unwrap()
    }

    #[test]
    fn test_light_curve_rejects_length_mismatch() {
        let err = LightCurve::new(vec![0.0, 1.0], vec![1.0], None).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidLightCurve(_)));
    }

    #[test]
    fn test_light_curve_rejects_empty() {
        let err = LightCurve::new(vec![], vec![], None).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidLightCurve(_)));
    }

    #[test]
    fn test_light_curve_rejects_flux_err_mismatch() {
        let err = LightCurve::new(vec![0.0, 1.0], vec![1.0, 1.0], Some(vec![0.1])).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidLightCurve(_)));
    }

    #[test]
    fn test_light_curve_derived_values() {
        let lc = curve(vec![3.0, 0.0, 1.0, 2.0], vec![1.0, 0.95, 0.98, 1.0]);
        assert_eq!(lc.len(), 4);
        assert_eq!(lc.time_span(), 3.0);
        assert_eq!(lc.flux_range(), (0.95, 1.0));
        // median 0.99, drop (0.99 - 0.95) / 0.99 ~ 4%
        assert!(lc.has_transit_signal(DEFAULT_TRANSIT_THRESHOLD));
        assert!(!lc.has_transit_signal(0.05));
    }

    #[test]
    fn test_single_sample_has_zero_span() {
        let lc = curve(vec![5.0], vec![1.0]);
        assert_eq!(lc.time_span(), 0.0);
    }

    #[test]
    fn test_normalize_returns_new_curve() {
        let lc = curve(vec![0.0, 1.0, 2.0], vec![2.0, 4.0, 2.0]);
        let normalized = lc.normalize().unwrap();
        assert_eq!(normalized.flux(), &[1.0, 2.0, 1.0]);
        assert_eq!(lc.flux(), &[2.0, 4.0, 2.0]);
        assert_eq!(normalized.time(), lc.time());
    }

    #[test]
    fn test_normalize_zero_median_fails() {
        let lc = curve(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 1.0]);
        assert!(lc.normalize().is_err());
        assert!(!lc.has_transit_signal(0.01));
    }

    #[test]
    fn test_light_curve_deserialization_validates() {
        let ok: LightCurve =
            serde_json::from_str(r#"{"time":[0,1],"flux":[1.0,0.9],"flux_err":[0.1,0.1]}"#).unwrap();
        assert_eq!(ok.flux_err(), Some(&[0.1, 0.1][..]));

        let bad = serde_json::from_str::<LightCurve>(r#"{"time":[0,1],"flux":[1.0]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_confidence_score_range() {
        assert!(ConfidenceScore::new(-0.01).is_err());
        assert!(ConfidenceScore::new(1.01).is_err());
        assert!(ConfidenceScore::new(f64::NAN).is_err());
        assert!(ConfidenceScore::new(0.0).is_ok());
        assert!(ConfidenceScore::new(1.0).is_ok());
    }

    #[test]
    fn test_confidence_score_display_and_reliability() {
        let score = ConfidenceScore::new(0.87).unwrap();
        assert_eq!(score.to_string(), "87.00% (HIGH)");
        assert!(score.is_reliable(ConfidenceScore::RELIABLE_THRESHOLD));
        assert!(!ConfidenceScore::new(0.5).unwrap().is_reliable(0.7));
    }

    #[test]
    fn test_detection_result_rejects_out_of_range() {
        assert!(DetectionResult::new(true, 1.2, 0.1).is_err());
        assert!(DetectionResult::new(true, 0.2, -0.1).is_err());
    }

    #[test]
    fn test_detection_result_helpers() {
        let r = DetectionResult::new(true, 0.65, 0.2).unwrap();
        assert_eq!(r.classification(), Disposition::LikelyConfirmed);
        assert!(r.is_confirmed());
        assert!(!r.is_high_confidence());
        assert_eq!(r.dominant_probability(), 0.65);
        assert_eq!(r.confidence().level(), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_prediction_serializes_recomputed_classification() {
        let r = DetectionResult::new(true, 0.9, 0.05).unwrap();
        let p = Prediction::new(&r, PredictionInput::Features(FeatureVector::new()));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["classification"], "CONFIRMED");
        assert_eq!(json["confidence_level"], "VERY_HIGH");
    }

    #[test]
    fn test_prediction_ignores_stale_stored_label() {
        // A record stored with an outdated label is re-derived on load.
        let stored = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "created_at": "2025-10-14T06:16:25Z",
            "is_exoplanet": true,
            "classification": "CANDIDATE",
            "confidence_score": 0.72,
            "planet_probability": 0.1,
            "candidate_probability": 0.72
        }"#;
        let p: Prediction = serde_json::from_str(stored).unwrap();
        assert_eq!(p.classification(), Disposition::LikelyConfirmed);
    }

    #[test]
    fn test_prediction_ignores_stale_stored_confidence() {
        let stored = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "created_at": "2025-10-14T06:16:25Z",
            "is_exoplanet": true,
            "confidence_score": 0.95,
            "confidence_level": "VERY_HIGH",
            "planet_probability": 0.1,
            "candidate_probability": 0.2
        }"#;
        let p: Prediction = serde_json::from_str(stored).unwrap();
        assert_eq!(p.confidence().score(), 0.2);
        assert_eq!(p.confidence_level(), ConfidenceLevel::VeryLow);
        assert!(!p.is_high_confidence(0.9));

        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["confidence_score"], 0.2);
        assert_eq!(json["confidence_level"], "VERY_LOW");
    }

    #[test]
    fn test_prediction_rejects_out_of_range_probabilities() {
        let stored = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "created_at": "2025-10-14T06:16:25Z",
            "is_exoplanet": true,
            "planet_probability": 1.4,
            "candidate_probability": 0.2
        }"#;
        assert!(serde_json::from_str::<Prediction>(stored).is_err());
    }

    proptest! {
        #[test]
        fn prop_light_curve_lengths_hold(n in 1usize..64, m in 0usize..64) {
            let time: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let flux: Vec<f64> = (0..m).map(|i| 1.0 + i as f64 * 1e-3).collect();
            let built = LightCurve::new(time, flux, None);
            if n == m {
                let lc = built.unwrap();
                prop_assert_eq!(lc.time().len(), lc.flux().len());
                prop_assert!(!lc.is_empty());
            } else {
                prop_assert!(matches!(built, Err(DetectionError::InvalidLightCurve(_))));
            }
        }

        #[test]
        fn prop_confidence_score_bounds(score in -2.0..2.0f64) {
            prop_assert_eq!(ConfidenceScore::new(score).is_ok(), (0.0..=1.0).contains(&score));
        }
    }
}
