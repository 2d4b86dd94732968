//! Inbound detection request
//!
//! A request carries either a raw light curve or a pre-extracted feature
//! map. When both are present the features win.

use serde::{Deserialize, Serialize};

use crate::classifier::features::FeatureVector;
use crate::error::{DetectionError, Result};
use crate::models::{LightCurve, LightCurvePayload};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_curve: Option<LightCurvePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The validated input a request resolves to.
#[derive(Debug, Clone)]
pub enum RequestInput {
    LightCurve(LightCurve),
    Features(FeatureVector),
}

impl DetectionRequest {
    pub fn from_light_curve(payload: LightCurvePayload) -> Self {
        Self {
            light_curve: Some(payload),
            features: None,
        }
    }

    pub fn from_features(features: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            light_curve: None,
            features: Some(features),
        }
    }

    /// Parse a JSON request body.
    pub fn from_json(json: &str) -> Result<Self> {
        let request: Self = serde_json::from_str(json)
            .map_err(|e| DetectionError::InvalidRequest(format!("malformed request: {e}")))?;
        if !request.has_features() && !request.has_light_curve() {
            return Err(no_input());
        }
        Ok(request)
    }

    /// A non-empty feature map is present.
    pub fn has_features(&self) -> bool {
        self.features.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// A light curve with both time and flux samples is present.
    pub fn has_light_curve(&self) -> bool {
        self.light_curve
            .as_ref()
            .is_some_and(|lc| !lc.time.is_empty() && !lc.flux.is_empty())
    }

    /// Validate and resolve to a single input, features first.
    ///
    /// Empty sections count as absent.
    pub fn into_input(self) -> Result<RequestInput> {
        let use_features = self.has_features();
        let use_light_curve = self.has_light_curve();
        match (self.features, self.light_curve) {
            (Some(features), _) if use_features => Ok(RequestInput::Features(
                FeatureVector::from_json_object(&features)?,
            )),
            (_, Some(payload)) if use_light_curve => {
                Ok(RequestInput::LightCurve(LightCurve::try_from(payload)?))
            }
            _ => Err(no_input()),
        }
    }
}

fn no_input() -> DetectionError {
    DetectionError::InvalidRequest("either light_curve or features must be provided".into())
}
