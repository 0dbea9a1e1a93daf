//! Filesystem-safe recording titles.

/// Maximum bytes kept from a title; leaves room for ` (QUALITY).ext`,
/// `(N)` disambiguation and the `.download` suffix within NAME_MAX.
const TITLE_MAX: usize = 200;

/// Sanitizes a recording title for use as a file name stem.
///
/// - Replaces NUL, `/`, `\`, `:` and control characters with `_`
/// - Collapses runs of whitespace into one space
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to `TITLE_MAX` bytes on a char boundary
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev_space = false;

    for c in title.chars() {
        if c == '\0' || c == '/' || c == '\\' || c == ':' || c.is_control() {
            out.push('_');
            prev_space = false;
        } else if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    let mut take = trimmed.len().min(TITLE_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_separators() {
        assert_eq!(sanitize_title("a/b\\c: d"), "a_b_c_ d");
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(sanitize_title("  ..Late   Show\t..  "), "Late Show");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let out = sanitize_title(&long);
        assert!(out.len() <= TITLE_MAX);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
