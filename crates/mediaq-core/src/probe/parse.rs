//! Parse HTTP response header lines.

/// Headers of interest from a HEAD response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadInfo {
    pub content_length: Option<u64>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
}

pub fn parse_headers(lines: &[String]) -> HeadInfo {
    let mut info = HeadInfo::default();
    for line in lines {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            if let Ok(n) = value.parse::<u64>() {
                info.content_length = Some(n);
            }
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            info.accept_ranges = value.eq_ignore_ascii_case("bytes");
        }
    }
    info
}
