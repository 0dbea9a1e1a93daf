//! Extension extraction from a URL path.

/// Maximum extension length (including the dot) accepted from a URL.
const MAX_EXT_LEN: usize = 8;

/// Returns the extension (with leading `.`) of the last URL path segment.
///
/// Returns `None` if the URL cannot be parsed, the path is empty, or the segment
/// has no usable extension (hidden-file style names, overly long or non-alphanumeric suffixes).
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    let dot = segment.rfind('.')?;
    if dot == 0 {
        return None;
    }
    let ext = &segment[dot..];
    if ext.len() < 2 || ext.len() > MAX_EXT_LEN {
        return None;
    }
    if !ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
