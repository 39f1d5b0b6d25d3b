//! Fully-qualified name handling.
//!
//! An FQN is the `.`-joined list of names from the root to an item,
//! inclusive. Segments are never empty, so `"a..b"`, `".a"` and `""` do not
//! name anything.

use super::errors::TreeError;

/// Separator between FQN segments.
pub const DELIMITER: char = '.';

/// Split an FQN into its segments. `None` if any segment is empty.
pub fn segments(fqn: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = fqn.split(DELIMITER).collect();
    if parts.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(parts)
}

/// Split off the first segment, returning the remainder if there is one.
pub fn split_first(fqn: &str) -> Option<(&str, Option<&str>)> {
    let (head, tail) = match fqn.split_once(DELIMITER) {
        Some((head, tail)) => (head, Some(tail)),
        None => (fqn, None),
    };
    if head.is_empty() || tail.is_some_and(str::is_empty) {
        return None;
    }
    Some((head, tail))
}

/// Join segments with the delimiter.
pub fn join<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// Names must be non-empty and free of the delimiter.
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name.contains(DELIMITER) || name.trim() != name {
        return Err(TreeError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
