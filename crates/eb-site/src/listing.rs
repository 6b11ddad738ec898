//! Directory listings.

use std::fmt::Write;
use std::path::Path;

use eb_storage::{IgnoreSet, tracked_path};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::mapping::UrlMapper;

/// Bytes that cannot appear literally in a URL path. `/` stays as is.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Build the link listing for directory `dir`.
///
/// One `<a href>` line per child, sorted by name. Hidden and private children
/// are skipped; subdirectories get a trailing slash on both URL and name.
/// Hrefs are percent-encoded, names are HTML-escaped.
pub fn render_listing(
    dir: &Path,
    ignore: &IgnoreSet,
    mapper: &UrlMapper,
) -> std::io::Result<String> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| -> std::io::Result<(String, bool)> {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            Ok((entry.file_name().to_string_lossy().into_owned(), is_dir))
        })
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    let mut listing = String::new();
    for (name, is_dir) in entries {
        let path = tracked_path(&dir.join(&name), is_dir);
        if !ignore.is_visible(&path) {
            tracing::debug!(path = %path, "Skipping ignored listing entry");
            continue;
        }
        let Some(url) = mapper.path_to_url(&path) else {
            continue;
        };
        let name = if is_dir { format!("{name}/") } else { name };
        let _ = writeln!(
            listing,
            "<a href=\"{}\">{}</a><br>",
            utf8_percent_encode(&url, PATH),
            escape_html(&name)
        );
    }
    Ok(listing)
}
