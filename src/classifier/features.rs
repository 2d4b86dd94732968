//! Feature vectors and light-curve feature extraction
//!
//! A [`FeatureVector`] is an insertion-ordered `name -> f64` map. It has two
//! provenances: the [`FeatureExtractor`] (statistics over a light curve) or a
//! caller that already holds catalogue features (orbital period, radii,
//! temperatures...). Column order is imposed later by the preprocessor
//! against the fitted schema.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::stats;
use crate::error::{DetectionError, Result};
use crate::models::{LightCurve, LightCurvePayload};

/// Known feature names.
pub mod names {
    // Extracted from light curves
    pub const MEAN_FLUX: &str = "mean_flux";
    pub const MEDIAN_FLUX: &str = "median_flux";
    pub const STD_FLUX: &str = "std_flux";
    pub const VAR_FLUX: &str = "var_flux";
    pub const MIN_FLUX: &str = "min_flux";
    pub const MAX_FLUX: &str = "max_flux";
    pub const FLUX_RANGE: &str = "flux_range";
    pub const FLUX_RATIO: &str = "flux_ratio";
    pub const SKEWNESS: &str = "skewness";
    pub const KURTOSIS: &str = "kurtosis";
    pub const FLUX_25_PERCENTILE: &str = "flux_25percentile";
    pub const FLUX_75_PERCENTILE: &str = "flux_75percentile";
    pub const FLUX_90_PERCENTILE: &str = "flux_90percentile";
    pub const COEFFICIENT_OF_VARIATION: &str = "coefficient_of_variation";
    pub const TRANSIT_DEPTH: &str = "transit_depth";
    pub const TRANSIT_DURATION: &str = "transit_duration";
    pub const MEAN_FLUX_ERR: &str = "mean_flux_err";
    pub const MAX_FLUX_ERR: &str = "max_flux_err";

    // Catalogue features supplied directly by callers
    pub const ORBITAL_PERIOD: &str = "orbital_period";
    pub const PLANET_RADIUS: &str = "planet_radius";
    pub const EQUILIBRIUM_TEMP: &str = "equilibrium_temp";
    pub const INSOLATION: &str = "insolation";
    pub const SIGNAL_TO_NOISE: &str = "signal_to_noise";
    pub const STELLAR_TEMP: &str = "stellar_temp";
    pub const STELLAR_LOGG: &str = "stellar_logg";
    pub const STELLAR_RADIUS: &str = "stellar_radius";

    // Engineered by the preprocessor
    pub const DEPTH_PER_RADIUS_SQ: &str = "depth_per_radius_sq";
    pub const ORBIT_TRANSIT_PRODUCT: &str = "orbit_transit_product";
    pub const SIGNAL_STRENGTH: &str = "signal_strength";
    pub const TEMP_RATIO: &str = "temp_ratio";
    pub const PLANET_STAR_RADIUS_RATIO: &str = "planet_star_radius_ratio";
}

/// Features always produced by [`FeatureExtractor::extract`], in order.
pub const LIGHT_CURVE_FEATURES: [&str; 16] = [
    names::MEAN_FLUX,
    names::MEDIAN_FLUX,
    names::STD_FLUX,
    names::VAR_FLUX,
    names::MIN_FLUX,
    names::MAX_FLUX,
    names::FLUX_RANGE,
    names::FLUX_RATIO,
    names::SKEWNESS,
    names::KURTOSIS,
    names::FLUX_25_PERCENTILE,
    names::FLUX_75_PERCENTILE,
    names::FLUX_90_PERCENTILE,
    names::COEFFICIENT_OF_VARIATION,
    names::TRANSIT_DEPTH,
    names::TRANSIT_DURATION,
];

/// Catalogue columns the disposition models are trained on.
pub const CATALOG_FEATURES: [&str; 10] = [
    names::ORBITAL_PERIOD,
    names::TRANSIT_DURATION,
    names::TRANSIT_DEPTH,
    names::PLANET_RADIUS,
    names::EQUILIBRIUM_TEMP,
    names::INSOLATION,
    names::SIGNAL_TO_NOISE,
    names::STELLAR_TEMP,
    names::STELLAR_LOGG,
    names::STELLAR_RADIUS,
];

/// Fraction of the median flux below which a sample counts as in-transit.
const IN_TRANSIT_FRACTION: f64 = 0.99;

// ---------------------------------------------------------------------------
// Feature vector
// ---------------------------------------------------------------------------

/// Named feature values, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: IndexMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object, rejecting any value that is not a number.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut features = Self::new();
        for (name, value) in object {
            let number = value.as_f64().ok_or_else(|| {
                DetectionError::InvalidFeatures(format!(
                    "feature '{name}' must be numeric, got {value}"
                ))
            })?;
            features.insert(name.clone(), number);
        }
        Ok(features)
    }

    /// Insert or overwrite a feature. Overwriting keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values in the vector's current order.
    pub fn to_values(&self) -> Vec<f64> {
        self.values.values().copied().collect()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Derives statistical and transit features from a light curve.
///
/// Deterministic and infallible for a validated curve: every ratio is
/// guarded and evaluates to 0 on a zero denominator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, light_curve: &LightCurve) -> FeatureVector {
        let flux = light_curve.flux();
        let time = light_curve.time();

        let mut sorted = flux.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = stats::mean(flux);
        let median = stats::percentile_sorted(&sorted, 50.0);
        let std = stats::std_dev(flux);
        let min = stats::min(flux);
        let max = stats::max(flux);

        let mut features = FeatureVector::new();
        features.insert(names::MEAN_FLUX, mean);
        features.insert(names::MEDIAN_FLUX, median);
        features.insert(names::STD_FLUX, std);
        features.insert(names::VAR_FLUX, stats::variance(flux));
        features.insert(names::MIN_FLUX, min);
        features.insert(names::MAX_FLUX, max);

        features.insert(names::FLUX_RANGE, max - min);
        features.insert(names::FLUX_RATIO, guarded_ratio(max, min));

        features.insert(names::SKEWNESS, stats::skewness(flux));
        features.insert(names::KURTOSIS, stats::excess_kurtosis(flux));

        features.insert(names::FLUX_25_PERCENTILE, stats::percentile_sorted(&sorted, 25.0));
        features.insert(names::FLUX_75_PERCENTILE, stats::percentile_sorted(&sorted, 75.0));
        features.insert(names::FLUX_90_PERCENTILE, stats::percentile_sorted(&sorted, 90.0));

        features.insert(names::COEFFICIENT_OF_VARIATION, guarded_ratio(std, mean));

        features.insert(names::TRANSIT_DEPTH, transit_depth(median, min));
        features.insert(names::TRANSIT_DURATION, transit_duration(flux, time, median));

        if let Some(flux_err) = light_curve.flux_err() {
            features.insert(names::MEAN_FLUX_ERR, stats::mean(flux_err));
            features.insert(names::MAX_FLUX_ERR, stats::max(flux_err));
        }

        features
    }

    /// Validate a raw payload and extract from it in one step.
    pub fn extract_from_payload(&self, payload: LightCurvePayload) -> Result<FeatureVector> {
        let light_curve = LightCurve::try_from(payload)?;
        Ok(self.extract(&light_curve))
    }
}

fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fractional dip of the minimum below the median.
fn transit_depth(median: f64, min: f64) -> f64 {
    guarded_ratio(median - min, median)
}

/// Time width of the samples dimmer than 99% of the median.
fn transit_duration(flux: &[f64], time: &[f64], median: f64) -> f64 {
    let threshold = median * IN_TRANSIT_FRACTION;
    let in_transit: Vec<f64> = flux
        .iter()
        .zip(time)
        .filter(|(f, _)| **f < threshold)
        .map(|(_, t)| *t)
        .collect();

    if in_transit.is_empty() {
        return 0.0;
    }
    stats::max(&in_transit) - stats::min(&in_transit)
}
