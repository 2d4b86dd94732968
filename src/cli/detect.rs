//! Detect, batch and features commands

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use exodetect::classifier::features::FeatureVector;
use exodetect::config::DetectorConfig;
use exodetect::models::LightCurvePayload;
use exodetect::{
    DetectionRequest, DetectionResult, DetectionService, Disposition, FeatureExtractor,
    LightCurve, Prediction,
};

use super::read_input;

/// Run the detect command
pub fn detect(service: &DetectionService, file: &Path, format: &str) -> Result<()> {
    let request = DetectionRequest::from_json(&read_input(file)?)
        .with_context(|| format!("Invalid request in {}", file.display()))?;
    let prediction = service.execute(request)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&prediction)?),
        _ => print_prediction(&prediction),
    }
    Ok(())
}

/// Run the batch command
pub fn batch(service: &DetectionService, file: &Path, format: &str) -> Result<()> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(&read_input(file)?)
            .with_context(|| format!("{} must hold a JSON array of objects", file.display()))?;
    let batch = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            FeatureVector::from_json_object(row).with_context(|| format!("Row {i} is invalid"))
        })
        .collect::<Result<Vec<_>>>()?;

    let results = service.detect_batch(&batch)?;

    match format {
        "json" => {
            let out: Vec<serde_json::Value> = results.iter().map(result_json).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            println!("\n{} {} rows\n", style("Batch").bold(), results.len());
            for (i, result) in results.iter().enumerate() {
                println!(
                    "  {:>4}  {}  planet {:.3}  candidate {:.3}  confidence {}",
                    i,
                    styled_disposition(result.classification()),
                    result.planet_probability(),
                    result.candidate_probability(),
                    result.confidence()
                );
            }
            let exoplanets = results.iter().filter(|r| r.is_exoplanet()).count();
            println!(
                "\n  {} of {} classified as exoplanet",
                style(exoplanets).cyan(),
                results.len()
            );
        }
    }
    Ok(())
}

/// Run the features command
pub fn features(config: &DetectorConfig, file: &Path, format: &str) -> Result<()> {
    let payload: LightCurvePayload = serde_json::from_str(&read_input(file)?)
        .with_context(|| format!("Invalid light curve in {}", file.display()))?;
    let curve = LightCurve::try_from(payload)?;
    let features = FeatureExtractor::new().extract(&curve);
    let threshold = config.detection.transit_threshold;

    match format {
        "json" => {
            let out = serde_json::json!({
                "summary": curve.summary(),
                "transit_signal": curve.has_transit_signal(threshold),
                "features": features,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            let summary = curve.summary();
            println!("\n{}\n", style("Light curve").bold());
            println!("  Observations: {}", style(summary.length).cyan());
            println!("  Time span:    {:.4}", summary.time_span);
            println!(
                "  Flux:         {:.6} .. {:.6}",
                summary.flux_min, summary.flux_max
            );
            let signal = if curve.has_transit_signal(threshold) {
                style("yes").green()
            } else {
                style("no").dim()
            };
            println!("  Transit dip:  {} (threshold {})", signal, threshold);

            println!("\n{}\n", style("Features").bold());
            for (name, value) in features.iter() {
                println!("  {:<26} {:>14.6}", name, value);
            }
        }
    }
    Ok(())
}

fn result_json(result: &DetectionResult) -> serde_json::Value {
    let confidence = result.confidence();
    serde_json::json!({
        "is_exoplanet": result.is_exoplanet(),
        "classification": result.classification(),
        "planet_probability": result.planet_probability(),
        "candidate_probability": result.candidate_probability(),
        "confidence_score": confidence.score(),
        "confidence_level": confidence.level(),
    })
}

fn print_prediction(prediction: &Prediction) {
    println!("\n{}\n", style("Detection").bold());
    println!("  Id:             {}", style(prediction.id).dim());
    println!(
        "  Classification: {}",
        styled_disposition(prediction.classification())
    );
    println!("  Exoplanet:      {}", prediction.is_exoplanet);
    println!("  Planet prob.:   {:.4}", prediction.planet_probability);
    println!("  Candidate prob: {:.4}", prediction.candidate_probability);
    println!("  Confidence:     {}", prediction.confidence());
    if !prediction
        .confidence()
        .is_reliable(exodetect::ConfidenceScore::RELIABLE_THRESHOLD)
    {
        println!("  {}", style("Low confidence, treat as provisional").yellow());
    }
}

fn styled_disposition(disposition: Disposition) -> console::StyledObject<&'static str> {
    let label = disposition.as_str();
    match disposition {
        Disposition::Confirmed => style(label).green().bold(),
        Disposition::LikelyConfirmed => style(label).green(),
        Disposition::Candidate => style(label).yellow(),
        Disposition::FalsePositive => style(label).red(),
    }
}
