//! Target path derivation for enqueued recordings.
//!
//! An item's target is `<download_dir>/<expanded pattern>`. The pattern is a
//! `/`-separated relative path with placeholders:
//!
//! - `{title}`: sanitized recording title
//! - `{quality}`: `HD`, `HQ`, `NQ` or `UNKNOWN`
//! - `{date}`: day the recording was first listed, `YYYY-MM-DD` (UTC)
//! - `{id}`: recording id
//! - `{ext}`: extension of the variant URL, with its dot
//!
//! Without `{ext}` the extension is appended to the last component. Each
//! component has NUL, `:` and control characters replaced and is trimmed;
//! empty, `.` and `..` components are dropped so the result stays under the
//! download directory.

mod path;
mod sanitize;

pub use path::extension_from_url;
pub use sanitize::sanitize_title;

use std::path::{Path, PathBuf};

use crate::queue::{Quality, RecordingId};

/// Pattern used when the config does not set one.
pub const DEFAULT_FILE_NAME_PATTERN: &str = "{title} ({quality}){ext}";

/// Title used when the recording title sanitizes to nothing.
const DEFAULT_TITLE: &str = "recording";

/// Values a pattern can refer to.
#[derive(Debug, Clone, Copy)]
pub struct NameFields<'a> {
    pub recording_id: RecordingId,
    pub title: &'a str,
    pub quality: Quality,
    pub url: &'a str,
    /// Unix seconds.
    pub first_seen: i64,
}

fn format_date(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown-date".to_string())
}

/// Replaces `{key}` placeholders in one pass; unknown keys stay as written.
fn expand(component: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match lookup(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Relative target path for a recording variant.
///
/// # Examples
///
/// - `"{title} ({quality}){ext}"`, title `News: 20:00`, HQ, `https://x/r/1.mp4` → `News_ 20_00 (HQ).mp4`
/// - `"{title}/{date} {quality}"` → `News/2024-03-01 HQ.mp4`
pub fn target_file_name(pattern: &str, fields: &NameFields<'_>) -> PathBuf {
    let mut title = sanitize_title(fields.title);
    if title.is_empty() {
        title = DEFAULT_TITLE.to_string();
    }
    let ext = extension_from_url(fields.url).unwrap_or_default();
    let lookup = |key: &str| match key {
        "title" => Some(title.clone()),
        "quality" => Some(fields.quality.as_str().to_string()),
        "date" => Some(format_date(fields.first_seen)),
        "id" => Some(fields.recording_id.to_string()),
        "ext" => Some(ext.clone()),
        _ => None,
    };

    let mut rel = PathBuf::new();
    for component in pattern.split(|c: char| c == '/' || c == '\\') {
        let expanded = expand(component, &lookup);
        let cleaned: String = expanded
            .chars()
            .map(|c| if c == '\0' || c == ':' || c.is_control() { '_' } else { c })
            .collect();
        let name = cleaned.trim();
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }
        rel.push(name);
    }
    if rel.as_os_str().is_empty() {
        rel.push(format!("{} ({})", title, fields.quality.as_str()));
    }
    if pattern.contains("{ext}") {
        return rel;
    }
    let mut os = rel.into_os_string();
    os.push(&ext);
    PathBuf::from(os)
}

/// Full target path under `download_dir`.
pub fn target_path(download_dir: &Path, pattern: &str, fields: &NameFields<'_>) -> PathBuf {
    download_dir.join(target_file_name(pattern, fields))
}
