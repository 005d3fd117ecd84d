//! JSON Pointer segment handling (RFC 6901).
//!
//! Node paths and reference-index fragments are built from `/`-separated
//! segments, with `~` escaped as `~0` and `/` escaped as `~1`.

/// Appends a segment to a pointer path in place, applying RFC 6901 escaping.
pub fn push_segment(path: &mut String, segment: &str) {
    path.push('/');
    for c in segment.chars() {
        match c {
            '~' => path.push_str("~0"),
            '/' => path.push_str("~1"),
            other => path.push(other),
        }
    }
}

/// Returns `path` with an escaped `segment` appended.
#[must_use]
pub fn append(path: &str, segment: &str) -> String {
    let mut result: String = path.to_string();
    push_segment(&mut result, segment);
    result
}
