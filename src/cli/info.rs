//! Info command - show the configured model

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;

use exodetect::config::DetectorConfig;
use exodetect::ModelLoader;

/// Run the info command
pub fn run(config: &DetectorConfig, format: &str) -> Result<()> {
    let loader = Arc::new(ModelLoader::from_config(&config.model));
    loader
        .load_all()
        .with_context(|| format!("Could not load model from {}", config.model.dir.display()))?;
    let info = loader.model_info()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("\n{}\n", style("Model").bold());
    println!("  Name:     {}", style(&info.name).cyan());
    println!("  Kind:     {}", info.kind);
    println!("  Path:     {}", style(info.path.display()).dim());
    println!("  Classes:  {}", info.classes.join(", "));
    println!("  Features: {}", info.feature_count);
    println!(
        "  Scaling:  {}",
        if info.scaled { "enabled" } else { "disabled" }
    );
    for name in &info.feature_names {
        println!("    - {}", name);
    }
    Ok(())
}
