//! Command-line entry point for the starter-code generator.

use clap::Parser;
use tracing::{error, info, warn};

use startercode_core::logging::{LoggingDestination, init_logging};
use startercode_core::{ConfigSource, RunSummary, load_config, run};

/// The generator takes no options: configuration comes from `startercode.toml`
/// (or the file named by `STARTERCODE_CONFIG`) and `STARTERCODE_*` variables.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "startercode",
    author,
    version,
    about = "Generate starter-code notebooks and reports for every CSV dataset of a catalogue"
)]
pub struct Cli {}

/// Load configuration, install logging and run the whole pipeline once.
pub async fn execute(_cli: Cli) -> anyhow::Result<RunSummary> {
    let loaded = load_config()?;
    init_logging(LoggingDestination::from_log_dir(
        loaded.settings.paths.log_dir.as_deref(),
    ))?;

    match &loaded.source {
        ConfigSource::File(path) => info!(path = %path.display(), "Configuration loaded"),
        ConfigSource::Default => info!("No configuration file found; using defaults"),
    }
    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    info!("Starting starter code generation");
    match run(&loaded.settings, None).await {
        Ok(summary) => {
            for skipped in &summary.skipped {
                warn!(
                    identifier = %skipped.identifier,
                    flavor = ?skipped.flavor,
                    reason = %skipped.reason,
                    "File not generated"
                );
            }
            Ok(summary)
        }
        Err(err) => {
            error!(error = %err, "Starter code generation failed");
            Err(err.into())
        }
    }
}
