//! Environment and home-directory expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - a leading `~` - expands to `$HOME`
//!
//! Plugin commands and render commands are never passed through here: their
//! `${KEY_WORD}`-style tokens are substituted per invocation, not at load time.

use crate::ConfigError;

/// Expand environment variable references and a leading `~` in a string.
///
/// Returns the original string unchanged if neither `${` nor a leading `~`
/// is present. Bare `$VAR` syntax is left alone.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") && !value.starts_with('~') {
        return Ok(value.to_owned());
    }

    shellexpand::full_with_context(
        value,
        || std::env::var("HOME").ok(),
        |var| -> Result<Option<String>, LookupError> {
            std::env::var(var).map(Some).map_err(|_| LookupError {
                var_name: var.to_owned(),
            })
        },
    )
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Error returned when environment variable lookup fails.
struct LookupError {
    var_name: String,
}
