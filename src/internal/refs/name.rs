//! Reference name validation (`spec.md` §3 "Invariants").
//!
//! A name is non-empty, slash-separated into components; no component starts
//! with `.`, ends with `.lock`, or is empty; the whole name never contains
//! `..`, `@{`, control characters, space, tab, or any of `*:?["^~`. A
//! single-component name must be all-uppercase/underscore (`HEAD`, `FETCH_HEAD`
//! and friends).

/// Checks whether `name` is a well-formed reference name.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut prev_component = 0usize;
    let mut seen_dot = false;
    let mut seen_at = false;
    let mut seen_slash = false;
    let bytes = name.as_bytes();

    for (position, &c) in bytes.iter().enumerate() {
        let position = position + 1;
        if c.is_ascii_control() {
            return false;
        }
        match c {
            b'*' | b':' | b'?' | b'[' | b'"' | b'^' | b'~' | b' ' | b'\t' => return false,
            b'.' => {
                if seen_dot {
                    return false; // ".." anywhere
                }
            }
            b'{' => {
                if seen_at {
                    return false; // "@{" anywhere
                }
            }
            b'/' => {
                if seen_slash {
                    return false; // empty component
                }
                let chunk = &name[prev_component..position - 1];
                prev_component = position;
                if chunk.starts_with('.') || chunk.ends_with(".lock") {
                    return false;
                }
            }
            _ => {}
        }
        seen_dot = c == b'.';
        seen_at = c == b'@';
        seen_slash = c == b'/';
    }

    if seen_slash {
        return false; // trailing slash, i.e. an empty final component
    }

    let chunk = &name[prev_component..];
    if chunk.starts_with('.') || chunk.ends_with(".lock") {
        return false;
    }

    if prev_component == 0 {
        return name.bytes().all(|c| c == b'_' || c.is_ascii_uppercase());
    }

    true
}
