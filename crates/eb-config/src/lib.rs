//! Configuration management for easyblog.
//!
//! Parses `eb.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Host and path values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - a leading `~` - expands to the home directory
//!
//! Expanded fields:
//! - `server.host`
//! - `blog.root`
//! - `blog.template`
//! - `blog.app_data`
//! - `export.root`

mod expand;

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override blog root directory.
    pub blog_root: Option<PathBuf>,
    /// Override static export flag.
    pub export_enabled: Option<bool>,
    /// Override static export root directory.
    pub export_root: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "eb.toml";

/// Default number of search results.
pub const DEFAULT_SEARCH_NUM: usize = 12;

/// Application configuration.
///
/// Loaded once at startup and shared read-only afterwards.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Router prefixes.
    pub routes: RoutesConfig,
    /// Blog configuration (paths are relative strings from TOML).
    blog: BlogConfigRaw,
    /// Static export configuration (paths are relative strings from TOML).
    export: ExportConfigRaw,
    /// Request rate limits.
    pub rate_limit: RateLimitConfig,
    /// Search configuration.
    pub search: SearchConfig,

    /// Resolved blog configuration (set after loading).
    #[serde(skip)]
    pub blog_resolved: BlogConfig,
    /// Resolved export configuration (set after loading).
    #[serde(skip)]
    pub export_resolved: ExportConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 10000,
        }
    }
}

/// URL prefixes the blog and the API are mounted under.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Blog router prefix, e.g. `/blog`.
    pub blog: String,
    /// API router prefix, e.g. `/api`.
    pub api: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            blog: "/blog".to_owned(),
            api: "/api".to_owned(),
        }
    }
}

/// Raw blog configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BlogConfigRaw {
    root: Option<String>,
    template: Option<String>,
    render_command: Option<String>,
    hide: Vec<String>,
    private: Vec<String>,
    app_data: Option<String>,
    cache_capacity: Option<usize>,
}

/// Resolved blog configuration with absolute paths.
#[derive(Debug)]
pub struct BlogConfig {
    /// Directory served under the blog router.
    pub root: PathBuf,
    /// Template handed to the renderer.
    pub template: PathBuf,
    /// Renderer override. `None` means the built-in pandoc invocation.
    pub render_command: Option<String>,
    /// Patterns hidden from listings and search results.
    pub hide: Vec<String>,
    /// Patterns that are never served.
    pub private: Vec<String>,
    /// Application data directory (full-text index lives here).
    pub app_data: PathBuf,
    /// Capacity of each content cache.
    pub cache_capacity: usize,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("blog"),
            template: PathBuf::from("template.html"),
            render_command: None,
            hide: Vec::new(),
            private: Vec::new(),
            app_data: PathBuf::from(".eb"),
            cache_capacity: 1000,
        }
    }
}

impl BlogConfig {
    /// Directory holding the full-text index.
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.app_data.join("index")
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ExportConfigRaw {
    enabled: Option<bool>,
    root: Option<String>,
}

/// Resolved static export configuration.
#[derive(Debug)]
pub struct ExportConfig {
    /// Whether rendered pages are written to disk.
    pub enabled: bool,
    /// Export destination.
    pub root: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: PathBuf::from("public"),
        }
    }
}

/// Per-client request budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_second: u32,
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 5,
            per_minute: 30,
            per_hour: 1000,
        }
    }
}

/// Search configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result cap used when a request omits `num`.
    pub default_num: usize,
    /// External search plugins.
    pub plugins: Vec<PluginConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_num: DEFAULT_SEARCH_NUM,
            plugins: Vec::new(),
        }
    }
}

/// How a plugin is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Spawn a local process.
    Command,
    /// Issue an HTTP GET.
    Url,
}

/// External search plugin.
///
/// `command` is a command line or URL template; `${BLOG_PATH}`, `${KEY_WORD}`,
/// `${NUM}` and `${IGNORE}` are substituted per search.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default)]
    pub brief: String,
    #[serde(rename = "type")]
    pub kind: PluginKind,
    pub command: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`blog.root`").
        field: String,
        /// Error message (e.g., "${`BLOG_HOME`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a router prefix like `/blog`: leading slash, no trailing slash.
fn require_prefix(value: &str, field: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') || value.len() < 2 || value.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "{field} must start with / and must not end with /"
        )));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `eb.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the result does not validate.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            tracing::debug!(path = %discovered.display(), "Discovered config file");
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(root) = &settings.blog_root {
            self.blog_resolved.root.clone_from(root);
        }
        if let Some(enabled) = settings.export_enabled {
            self.export_resolved.enabled = enabled;
        }
        if let Some(root) = &settings.export_root {
            self.export_resolved.root.clone_from(root);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let blog = BlogConfig::default();
        let export = ExportConfig::default();
        Self {
            server: ServerConfig::default(),
            routes: RoutesConfig::default(),
            blog: BlogConfigRaw::default(),
            export: ExportConfigRaw::default(),
            rate_limit: RateLimitConfig::default(),
            search: SearchConfig::default(),
            blog_resolved: BlogConfig {
                root: base.join(&blog.root),
                template: base.join(&blog.template),
                app_data: base.join(&blog.app_data),
                ..blog
            },
            export_resolved: ExportConfig {
                root: base.join(&export.root),
                ..export
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_routes()?;
        self.validate_limits()?;
        self.validate_plugins()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 would let the OS pick, which a blog server never wants
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_routes(&self) -> Result<(), ConfigError> {
        require_prefix(&self.routes.blog, "routes.blog")?;
        require_prefix(&self.routes.api, "routes.api")?;
        if self.routes.blog == self.routes.api {
            return Err(ConfigError::Validation(
                "routes.blog and routes.api must differ".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let limits = &self.rate_limit;
        for (value, field) in [
            (limits.per_second, "rate_limit.per_second"),
            (limits.per_minute, "rate_limit.per_minute"),
            (limits.per_hour, "rate_limit.per_hour"),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{field} must be greater than 0"
                )));
            }
        }
        if self.blog_resolved.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "blog.cache_capacity must be greater than 0".to_owned(),
            ));
        }
        if self.search.default_num == 0 {
            return Err(ConfigError::Validation(
                "search.default_num must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_plugins(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for plugin in &self.search.plugins {
            require_non_empty(&plugin.name, "search.plugins.name")?;
            require_non_empty(&plugin.command, "search.plugins.command")?;
            if !seen.insert(plugin.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate search plugin: {}",
                    plugin.name
                )));
            }
            if plugin.kind == PluginKind::Url {
                require_http_url(&plugin.command, "search.plugins.command")?;
            }
        }
        Ok(())
    }

    /// Expand environment variable references in host and path values.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        let blog = &mut self.blog;
        for (value, field) in [
            (&mut blog.root, "blog.root"),
            (&mut blog.template, "blog.template"),
            (&mut blog.app_data, "blog.app_data"),
            (&mut self.export.root, "export.root"),
        ] {
            if let Some(raw) = value.as_deref() {
                *value = Some(expand::expand_env(raw, field)?);
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));
        let raw = &self.blog;

        self.blog_resolved = BlogConfig {
            root: resolve(raw.root.as_deref(), "blog"),
            template: resolve(raw.template.as_deref(), "template.html"),
            render_command: raw
                .render_command
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned),
            hide: raw.hide.clone(),
            private: raw.private.clone(),
            app_data: resolve(raw.app_data.as_deref(), ".eb"),
            cache_capacity: raw.cache_capacity.unwrap_or(1000),
        };

        self.export_resolved = ExportConfig {
            enabled: self.export.enabled.unwrap_or(false),
            root: resolve(self.export.root.as_deref(), "public"),
        };
    }
}
