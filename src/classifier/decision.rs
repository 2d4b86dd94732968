//! Probability interpretation and disposition rules
//!
//! The single source of truth for turning classifier output into a
//! disposition. Every place that reports a classification, including
//! records reloaded from storage, goes through [`classify`].

use crate::models::{ConfidenceLevel, Disposition};

/// `planet_probability` at or above this is CONFIRMED.
pub const CONFIRMED_THRESHOLD: f64 = 0.8;
/// `planet_probability` at or above this is LIKELY_CONFIRMED.
pub const LIKELY_PLANET_THRESHOLD: f64 = 0.6;
/// `candidate_probability` at or above this is LIKELY_CONFIRMED.
pub const LIKELY_CANDIDATE_THRESHOLD: f64 = 0.7;
/// Binary models call anything strictly above this an exoplanet.
pub const BINARY_DECISION_THRESHOLD: f64 = 0.5;

/// Class layout of a classifier's output distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[not_exoplanet, exoplanet]`
    Binary,
    /// `[false_positive, candidate, confirmed]`
    ThreeClass,
}

impl OutputLayout {
    pub fn for_width(width: usize) -> Self {
        if width == 2 {
            OutputLayout::Binary
        } else {
            OutputLayout::ThreeClass
        }
    }
}

/// Probabilities extracted from a raw class distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpretation {
    pub is_exoplanet: bool,
    pub planet_probability: f64,
    pub candidate_probability: f64,
}

/// Read a class distribution according to its layout.
///
/// Binary output collapses planet and candidate probability into the single
/// exoplanet probability. Three-class output calls an exoplanet whenever the
/// candidate and confirmed mass together outweighs the false-positive mass.
/// Missing trailing classes count as probability 0.
pub fn interpret(probabilities: &[f64]) -> Interpretation {
    let at = |i: usize| probabilities.get(i).copied().unwrap_or(0.0);

    match OutputLayout::for_width(probabilities.len()) {
        OutputLayout::Binary => {
            let exoplanet = at(1);
            Interpretation {
                is_exoplanet: exoplanet > BINARY_DECISION_THRESHOLD,
                planet_probability: exoplanet,
                candidate_probability: exoplanet,
            }
        }
        OutputLayout::ThreeClass => {
            let false_positive = at(0);
            let candidate = at(1);
            let confirmed = at(2);
            Interpretation {
                is_exoplanet: candidate + confirmed > false_positive,
                planet_probability: confirmed,
                candidate_probability: candidate,
            }
        }
    }
}

/// Four-tier disposition rule.
pub fn classify(is_exoplanet: bool, planet_probability: f64, candidate_probability: f64) -> Disposition {
    if !is_exoplanet {
        return Disposition::FalsePositive;
    }
    if planet_probability >= CONFIRMED_THRESHOLD {
        return Disposition::Confirmed;
    }
    if planet_probability >= LIKELY_PLANET_THRESHOLD
        || candidate_probability >= LIKELY_CANDIDATE_THRESHOLD
    {
        return Disposition::LikelyConfirmed;
    }
    Disposition::Candidate
}

/// Tier cut points, lower bound inclusive.
pub fn confidence_level(score: f64) -> ConfidenceLevel {
    if score >= 0.9 {
        ConfidenceLevel::VeryHigh
    } else if score >= 0.8 {
        ConfidenceLevel::High
    } else if score >= 0.6 {
        ConfidenceLevel::Medium
    } else if score >= 0.4 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::VeryLow
    }
}
