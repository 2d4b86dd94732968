//! Feature preprocessing
//!
//! Turns an arbitrary [`FeatureVector`] into the ordered numeric row the
//! frozen classifier expects:
//!
//! 1. engineering: up to five derived ratios/products
//! 2. alignment: fill missing expected columns with 0, project and reorder
//! 3. sanitization: NaN and +/-inf become 0
//! 4. scaling: the fitted transform, or pass-through when none is configured

use std::sync::Arc;

use indexmap::IndexSet;

use super::features::{names, FeatureVector};
use super::scaler::FittedScaler;
use crate::error::{DetectionError, Result};

/// Added to denominators of engineered ratios.
pub const EPSILON: f64 = 1e-6;

/// Derive engineered features whose inputs are both present.
///
/// Engineered values overwrite same-named caller values.
pub fn engineer_features(features: &FeatureVector) -> FeatureVector {
    let mut out = features.clone();
    let pair = |a: &str, b: &str| Some((features.get(a)?, features.get(b)?));

    if let Some((depth, radius)) = pair(names::TRANSIT_DEPTH, names::PLANET_RADIUS) {
        out.insert(names::DEPTH_PER_RADIUS_SQ, depth / (radius * radius + EPSILON));
    }
    if let Some((period, duration)) = pair(names::ORBITAL_PERIOD, names::TRANSIT_DURATION) {
        out.insert(names::ORBIT_TRANSIT_PRODUCT, period * duration);
    }
    if let Some((snr, depth)) = pair(names::SIGNAL_TO_NOISE, names::TRANSIT_DEPTH) {
        out.insert(names::SIGNAL_STRENGTH, snr / (depth + EPSILON));
    }
    if let Some((planet_temp, star_temp)) = pair(names::EQUILIBRIUM_TEMP, names::STELLAR_TEMP) {
        out.insert(names::TEMP_RATIO, planet_temp / (star_temp + EPSILON));
    }
    if let Some((planet_radius, star_radius)) = pair(names::PLANET_RADIUS, names::STELLAR_RADIUS) {
        out.insert(names::PLANET_STAR_RADIUS_RATIO, planet_radius / (star_radius + EPSILON));
    }

    out
}

/// Reconcile `features` with an expected schema.
///
/// Missing expected features are inserted as 0; unexpected ones are
/// dropped; the result follows `expected` order exactly.
pub fn align_features(features: &FeatureVector, expected: &[String]) -> FeatureVector {
    expected
        .iter()
        .map(|name| (name.clone(), features.get(name).unwrap_or(0.0)))
        .collect()
}

/// Replace NaN and infinities with 0.
pub fn sanitize(values: &mut [f64]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

/// Accept only a non-empty vector of finite values.
pub fn validate_features(features: &FeatureVector) -> Result<()> {
    if features.is_empty() {
        return Err(DetectionError::InvalidFeatures(
            "feature set must not be empty".into(),
        ));
    }
    if let Some((name, value)) = features.iter().find(|(_, v)| !v.is_finite()) {
        return Err(DetectionError::InvalidFeatures(format!(
            "feature '{name}' must be a finite number, got {value}"
        )));
    }
    Ok(())
}

/// Preprocessor bound to the (optional) fitted scaler.
///
/// Holds no mutable state; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct FeaturePreprocessor {
    scaler: Option<Arc<FittedScaler>>,
}

impl FeaturePreprocessor {
    pub fn new(scaler: Option<Arc<FittedScaler>>) -> Self {
        Self { scaler }
    }

    pub fn scaler(&self) -> Option<&FittedScaler> {
        self.scaler.as_deref()
    }

    /// Expected feature order, if the scaler recorded one.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.scaler.as_deref().and_then(FittedScaler::feature_names)
    }

    pub fn validate(&self, features: &FeatureVector) -> Result<()> {
        validate_features(features)
    }

    /// Engineer, align, sanitize and scale a single feature vector.
    pub fn preprocess(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let engineered = engineer_features(features);
        let aligned = match self.feature_names() {
            Some(expected) => align_features(&engineered, expected),
            None => engineered,
        };

        let mut row = aligned.to_values();
        sanitize(&mut row);
        self.scale(row)
    }

    /// Batch variant for bulk scoring.
    ///
    /// Rows are expected to share one schema: columns are the union of all
    /// names in first-seen order, a row missing a column gets 0, and no
    /// engineering or per-row alignment is applied.
    pub fn preprocess_batch(&self, rows: &[FeatureVector]) -> Result<Vec<Vec<f64>>> {
        let columns: IndexSet<&str> = rows.iter().flat_map(FeatureVector::names).collect();

        rows.iter()
            .map(|features| {
                let mut row: Vec<f64> = columns
                    .iter()
                    .map(|name| features.get(name).unwrap_or(f64::NAN))
                    .collect();
                sanitize(&mut row);
                self.scale(row)
            })
            .collect()
    }

    fn scale(&self, row: Vec<f64>) -> Result<Vec<f64>> {
        match self.scaler.as_deref() {
            Some(scaler) => scaler.transform(&row),
            None => Ok(row),
        }
    }
}
