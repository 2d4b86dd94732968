//! CLI command definitions and handlers

mod detect;
mod info;
mod init;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use exodetect::config::DetectorConfig;
use exodetect::{DetectionService, ModelLoader};
use std::sync::Arc;

/// exodetect - exoplanet transit detection
#[derive(Parser, Debug)]
#[command(name = "exodetect")]
#[command(
    version,
    about = "Classify transiting-object candidates from light curves or catalogue features",
    after_help = "\
Examples:
  exodetect init                              Write an example exodetect.toml
  exodetect info                              Show the loaded model
  exodetect features curve.json               Extract light-curve features
  exodetect detect request.json               Classify one request
  exodetect detect request.json --format json JSON prediction record
  exodetect batch rows.json                   Classify an array of feature maps"
)]
pub struct Cli {
    /// Directory holding the model artifacts (overrides config)
    #[arg(long, global = true, env = "EXODETECT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Config file (default: ./exodetect.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example exodetect.toml config file
    Init,

    /// Show metadata about the configured model
    Info {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Extract features from a light-curve JSON file
    Features {
        /// Light-curve file: {"time": [...], "flux": [...], "flux_err": [...]}
        file: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Classify a single detection request
    Detect {
        /// Request file: {"light_curve": {...}} or {"features": {...}}
        file: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Classify an array of feature maps sharing one schema
    Batch {
        /// JSON array of feature objects
        file: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

/// Run a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => init::run(cli.config.as_deref()),
        Commands::Info { ref format } => {
            let config = load_config(&cli)?;
            info::run(&config, format)
        }
        Commands::Features { ref file, ref format } => {
            let config = load_config(&cli)?;
            detect::features(&config, file, format)
        }
        Commands::Detect { ref file, ref format } => {
            let config = load_config(&cli)?;
            let service = build_service(&config)?;
            detect::detect(&service, file, format)
        }
        Commands::Batch { ref file, ref format } => {
            let config = load_config(&cli)?;
            let service = build_service(&config)?;
            detect::batch(&service, file, format)
        }
    }
}

/// Config from files and environment, with CLI flags applied last
fn load_config(cli: &Cli) -> Result<DetectorConfig> {
    let mut config = DetectorConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.model_dir {
        config.model.dir = dir.clone();
    }
    Ok(config)
}

fn build_service(config: &DetectorConfig) -> Result<DetectionService> {
    let loader = Arc::new(ModelLoader::from_config(&config.model));
    DetectionService::new(loader).with_context(|| {
        format!(
            "Model artifacts in {} are not usable",
            config.model.dir.display()
        )
    })
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "exodetect",
            "detect",
            "req.json",
            "--model-dir",
            "/tmp/models",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.model_dir, Some(PathBuf::from("/tmp/models")));
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Detect { .. }));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["exodetect", "detect", "x.json", "--format", "xml"]).is_err());
    }
}
