//! `eb export` command implementation.

use std::path::PathBuf;

use clap::Args;
use eb_config::{CliSettings, Config};
use eb_server::export_site;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the export command.
#[derive(Args)]
pub(crate) struct ExportArgs {
    /// Path to configuration file (default: auto-discover eb.toml).
    #[arg(short, long, env = "EB_CONFIG")]
    config: Option<PathBuf>,

    /// Blog root directory (overrides config).
    #[arg(short = 'r', long)]
    blog_root: Option<PathBuf>,

    /// Directory to write the static site to (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ExportArgs {
    /// Execute the export command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or a file cannot be written.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.info(&format!(
            "Exporting {} to {}",
            config.blog_resolved.root.display(),
            config.export_resolved.root.display()
        ));
        let summary = export_site(&config).await?;
        if summary.skipped > 0 {
            output.warning(&format!("Skipped {} unreadable paths", summary.skipped));
        }
        output.highlight(&format!("Exported {} items", summary.exported));
        Ok(())
    }

    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            blog_root: self.blog_root.clone(),
            export_enabled: Some(true),
            export_root: self.output.clone(),
            ..Default::default()
        }
    }
}
