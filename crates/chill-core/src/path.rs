//! Request path normalization.
//!
//! Every path that reaches the Route table is normalized first, and exact
//! Route paths are stored normalized, so that `/one//two`, `/./one/two`,
//! `/one/foo/../two` and `/one/two/index.html` all name `/one/two/`.

/// The default document name stripped from the end of a path.
const INDEX_DOCUMENT: &str = "index.html";

/// Normalizes a request path.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment
/// (never climbing above the root), trailing `index.html` segments are
/// removed, and the result starts and ends with exactly one `/`.
pub fn normalize_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    while segments.last() == Some(&INDEX_DOCUMENT) {
        segments.pop();
    }
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut normalized = String::with_capacity(raw.len() + 2);
    for segment in segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    normalized.push('/');
    normalized
}
