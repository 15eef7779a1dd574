//! Path helpers for the store's slash-separated namespace.

use crate::error::StoreError;

/// Width of the zero-padded suffix on sequential node names.
pub const SEQUENTIAL_SUFFIX_WIDTH: usize = 10;

/// Check that a path is absolute, has no empty segments, and no trailing slash.
pub fn validate(path: &str) -> Result<(), StoreError> {
    if !path.starts_with('/') {
        return Err(StoreError::BadArguments {
            reason: format!("path '{path}' must start with '/'"),
        });
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(StoreError::BadArguments {
            reason: format!("path '{path}' must not end with '/'"),
        });
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err(StoreError::BadArguments {
            reason: format!("path '{path}' contains an empty segment"),
        });
    }
    Ok(())
}

/// Join a parent path and a child name.
pub fn join(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Parent of a path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a path.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Name of the `seq`-th sequential child created from `prefix`.
pub fn sequential_name(prefix: &str, seq: i32) -> String {
    format!("{prefix}{seq:0width$}", width = SEQUENTIAL_SUFFIX_WIDTH)
}

/// Store-assigned sequence number of a sequential node name.
///
/// Reads the trailing run of digits, so `a0000000042` and `0000000042` both
/// yield 42. Names without a numeric suffix yield `None`.
pub fn sequence_suffix(name: &str) -> Option<u64> {
    let digits_start = name.rfind(|c: char| !c.is_ascii_digit()).map_or(0, |idx| idx + 1);
    let digits = &name[digits_start..];
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_absolute_paths() {
        assert!(validate("/").is_ok());
        assert!(validate("/counter").is_ok());
        assert!(validate("/a/b/c").is_ok());
    }

    #[test]
    fn validate_rejects_malformed_paths() {
        assert!(validate("counter").is_err());
        assert!(validate("/counter/").is_err());
        assert!(validate("/a//b").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn join_and_split() {
        assert_eq!(join("/", "k"), "/k");
        assert_eq!(join("/k", "lock"), "/k/lock");
        assert_eq!(parent("/k/lock"), Some("/k"));
        assert_eq!(parent("/k"), Some("/"));
        assert_eq!(parent("/"), None);
        assert_eq!(basename("/k/lock/a0000000001"), "a0000000001");
    }

    #[test]
    fn sequential_names_are_zero_padded() {
        assert_eq!(sequential_name("a", 0), "a0000000000");
        assert_eq!(sequential_name("a", 42), "a0000000042");
        assert_eq!(sequential_name("", 7), "0000000007");
    }

    #[test]
    fn suffix_parsing() {
        assert_eq!(sequence_suffix("a0000000042"), Some(42));
        assert_eq!(sequence_suffix("0000000003"), Some(3));
        assert_eq!(sequence_suffix("lock"), None);
        assert_eq!(sequence_suffix("x-lock-0000000010"), Some(10));
    }
}
