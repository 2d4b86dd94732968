//! Init command - write an example config file

use anyhow::Result;
use console::style;
use std::path::Path;

use exodetect::config::{DetectorConfig, PROJECT_CONFIG_FILE};

/// Run the init command
pub fn run(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new(PROJECT_CONFIG_FILE));

    if DetectorConfig::init(path)? {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    } else {
        println!(
            "{} Already exists: {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }
    Ok(())
}
