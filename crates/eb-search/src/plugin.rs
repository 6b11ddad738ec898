//! Searches delegated to an external command or HTTP endpoint.
//!
//! The plugin receives the blog root, keyword, cap and the ignore patterns
//! through `${BLOG_PATH}`, `${KEY_WORD}`, `${NUM}` and `${IGNORE}` tokens.
//! It answers with either a JSON array of paths or one path per line;
//! relative paths are taken relative to the blog root. Paths outside the
//! root, hidden or private are dropped before results leave this module.

use std::collections::HashSet;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use ureq::Agent;

use eb_config::{PluginConfig, PluginKind};
use eb_site::{CommandError, split_command};
use eb_storage::clean_path;

use crate::{SearchContext, SearchError, Searcher};

const BLOG_PATH_TOKEN: &str = "${BLOG_PATH}";
const KEY_WORD_TOKEN: &str = "${KEY_WORD}";
const NUM_TOKEN: &str = "${NUM}";
const IGNORE_TOKEN: &str = "${IGNORE}";

/// Timeout for a whole plugin HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

enum Invocation {
    Command(Vec<String>),
    Url { template: String, agent: Agent },
}

pub struct PluginSearcher {
    name: String,
    brief: String,
    invocation: Invocation,
    ctx: Arc<SearchContext>,
}

/// Token values for one search.
struct Substitution {
    blog_path: String,
    keyword: String,
    num: String,
    ignore: String,
}

impl Substitution {
    fn apply(&self, template: &str, encode: bool) -> String {
        let value = |raw: &str| {
            if encode {
                utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
            } else {
                raw.to_owned()
            }
        };
        template
            .replace(BLOG_PATH_TOKEN, &value(&self.blog_path))
            .replace(KEY_WORD_TOKEN, &value(&self.keyword))
            .replace(NUM_TOKEN, &value(&self.num))
            .replace(IGNORE_TOKEN, &value(&self.ignore))
    }
}

impl PluginSearcher {
    /// Build a searcher from its configuration.
    ///
    /// Command lines are split once here so that substituted values are
    /// always passed as single arguments.
    pub fn new(config: &PluginConfig, ctx: Arc<SearchContext>) -> Result<Self, SearchError> {
        let invocation = match config.kind {
            PluginKind::Command => Invocation::Command(split_command(&config.command)?),
            PluginKind::Url => Invocation::Url {
                template: config.command.clone(),
                agent: Agent::config_builder()
                    .timeout_global(Some(HTTP_TIMEOUT))
                    .build()
                    .into(),
            },
        };
        Ok(Self {
            name: config.name.clone(),
            brief: config.brief.clone(),
            invocation,
            ctx,
        })
    }

    fn substitution(&self, keyword: &str, num: usize) -> Substitution {
        Substitution {
            blog_path: self.ctx.crawler.root().trim_end_matches('/').to_owned(),
            keyword: keyword.to_owned(),
            num: num.to_string(),
            ignore: self.ctx.ignore.all_patterns().join(","),
        }
    }

    fn run(&self, subst: &Substitution) -> Result<String, SearchError> {
        match &self.invocation {
            Invocation::Command(argv) => {
                let argv: Vec<String> = argv.iter().map(|arg| subst.apply(arg, false)).collect();
                let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
                tracing::debug!(plugin = %self.name, program, ?args, "Running search plugin");
                let output = Command::new(program)
                    .args(args)
                    .output()
                    .map_err(|source| SearchError::Spawn {
                        name: self.name.clone(),
                        source,
                    })?;
                if !output.status.success() {
                    return Err(SearchError::PluginExit {
                        name: self.name.clone(),
                        status: output.status,
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                    });
                }
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Invocation::Url { template, agent } => {
                let url = subst.apply(template, true);
                tracing::debug!(plugin = %self.name, url, "Querying search plugin");
                let body = agent.get(&url).call()?.body_mut().read_to_string()?;
                Ok(body)
            }
        }
    }

    /// Turn raw plugin output into visible tracked paths.
    fn collect(&self, output: &str, num: usize) -> Result<Vec<String>, SearchError> {
        let trimmed = output.trim();
        let raw: Vec<String> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed)
                .map_err(|e| SearchError::Output(format!("{}: {e}", self.name)))?
        } else {
            trimmed
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect()
        };

        let root = self.ctx.crawler.root();
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for entry in raw {
            let joined = if entry.starts_with('/') {
                entry.clone()
            } else {
                format!("{root}{entry}")
            };
            let mut path = clean_path(&joined);
            if entry.ends_with('/') && !path.ends_with('/') {
                path.push('/');
            }
            if !path.starts_with(root) || !self.ctx.ignore.is_visible(&path) {
                tracing::debug!(plugin = %self.name, path, "Dropping plugin result");
                continue;
            }
            if seen.insert(path.clone()) {
                paths.push(path);
                if paths.len() == num {
                    break;
                }
            }
        }
        Ok(paths)
    }
}

impl Searcher for PluginSearcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn brief(&self) -> &str {
        &self.brief
    }

    fn search(&self, keyword: &str, num: usize) -> Result<Vec<String>, SearchError> {
        if num == 0 {
            return Ok(Vec::new());
        }
        let output = self.run(&self.substitution(keyword, num))?;
        self.collect(&output, num)
    }
}
