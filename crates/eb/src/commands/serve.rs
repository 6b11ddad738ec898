//! `eb serve` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use eb_config::{CliSettings, Config};
use eb_server::run_server;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover eb.toml).
    #[arg(short, long, env = "EB_CONFIG")]
    config: Option<PathBuf>,

    /// Blog root directory (overrides config).
    #[arg(short = 'r', long)]
    blog_root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Write every served page to the export root.
    #[arg(long)]
    export: bool,

    /// Disable static export even if the config enables it.
    #[arg(long, conflicts_with = "export")]
    no_export: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host.clone(),
            port: self.port,
            blog_root: self.blog_root.clone(),
            export_enabled: self.resolve_export_enabled(),
            export_root: None,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        ensure_app_data_dir(&config.blog_resolved.app_data)?;

        output.highlight(&format!(
            "Serving http://{}:{}{}/",
            config.server.host, config.server.port, config.routes.blog
        ));
        output.info(&format!(
            "Blog root: {}",
            config.blog_resolved.root.display()
        ));
        match &config.blog_resolved.render_command {
            Some(command) => output.info(&format!("Renderer: {command}")),
            None => output.info("Renderer: pandoc"),
        }
        if config.export_resolved.enabled {
            output.warning(&format!(
                "Static export: writing to {}",
                config.export_resolved.root.display()
            ));
        }

        run_server(&config).await?;
        Ok(())
    }

    /// Resolve `export_enabled` from --export/--no-export flags.
    fn resolve_export_enabled(&self) -> Option<bool> {
        if self.no_export {
            Some(false)
        } else {
            self.export.then_some(true)
        }
    }
}

/// Ensure the application data directory exists with a `.gitignore`.
fn ensure_app_data_dir(app_data: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(app_data)?;

    let gitignore_path = app_data.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by eb\n*\n");
    }

    Ok(())
}
