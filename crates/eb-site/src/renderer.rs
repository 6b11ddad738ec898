//! External Markdown renderer.
//!
//! The renderer is a subprocess: Markdown goes in on stdin, a complete HTML
//! document comes out on stdout. A non-zero exit is a hard failure. There is
//! no timeout; a renderer that hangs stalls the request that invoked it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::command::{CommandError, split_command};

/// Placeholder replaced by the item title in a render command.
pub const TITLE_TOKEN: &str = "${TITLE}";
/// Placeholder replaced by the template path in a render command.
pub const TEMPLATE_TOKEN: &str = "${TEMPLATE}";

/// Error rendering Markdown.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid render command: {0}")]
    Command(#[from] CommandError),
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Renderer output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Markdown to HTML conversion.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &[u8], title: &str) -> Result<String, RenderError>;
}

/// Renderer that runs a configured command per document.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    argv: Vec<String>,
    template: PathBuf,
}

impl CommandRenderer {
    /// The built-in pandoc invocation.
    pub fn pandoc(template: impl Into<PathBuf>) -> Self {
        let argv = [
            "pandoc",
            "-s",
            "--template=${TEMPLATE}",
            "--toc",
            "--mathjax",
            "-f",
            "markdown",
            "-t",
            "html",
            "--metadata",
            "title=${TITLE}",
        ];
        Self {
            argv: argv.into_iter().map(str::to_owned).collect(),
            template: template.into(),
        }
    }

    /// A user-supplied command line, split with shell quoting rules.
    ///
    /// `${TITLE}` and `${TEMPLATE}` are substituted in every argument.
    pub fn from_command_line(line: &str, template: impl Into<PathBuf>) -> Result<Self, RenderError> {
        Ok(Self {
            argv: split_command(line)?,
            template: template.into(),
        })
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Argument vector for one document.
    fn argv_for(&self, title: &str) -> Vec<String> {
        let template = self.template.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace(TEMPLATE_TOKEN, &template)
                    .replace(TITLE_TOKEN, title)
            })
            .collect()
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, markdown: &[u8], title: &str) -> Result<String, RenderError> {
        let argv = self.argv_for(title);
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        tracing::debug!(program, ?args, "Running renderer");

        let spawn_error = |source| RenderError::Spawn {
            program: program.clone(),
            source,
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from a separate thread so a large document cannot
        // deadlock against a full stdout pipe.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    if let Err(e) = stdin.write_all(markdown) {
                        tracing::debug!(error = %e, "Renderer closed stdin early");
                    }
                });
            }
            child.wait_with_output()
        })
        .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            tracing::warn!(program, status = %output.status, %stderr, "Renderer failed");
            return Err(RenderError::Exit {
                program: program.clone(),
                status: output.status,
                stderr,
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}
