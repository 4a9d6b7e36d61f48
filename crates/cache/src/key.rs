//! Cache key validation.
//!
//! Keys become file names in the filesystem backend and key suffixes in the
//! Redis backend, so both backends share the same rules.

use crate::error::{ErrorKind, Result};

/// Validates a cache key.
///
/// Artifact and blob identifiers look like `sha256:9f86d08...`. Anything that
/// could address outside of a bucket directory is rejected.
///
/// # Examples
///
/// ```
/// use vigil_cache::validate_key;
/// // Valid keys
/// assert!(validate_key("sha256:9f86d081884c7d65").is_ok());
/// assert!(validate_key("artifact-1.json").is_ok());
/// // Invalid keys
/// assert!(validate_key("").is_err());
/// assert!(validate_key("..").is_err());
/// assert!(validate_key("a/b").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    if key.is_empty() || key == "." || key == ".." {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    // Null bytes cause truncation in C-based syscalls, separators would
    // escape the bucket directory.
    if key.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control()) {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sha256:9f86d081884c7d659a2feaa0c55ad015")]
    #[case("artifact.json")]
    #[case("...")]
    #[case("a b")]
    fn test_valid_keys(#[case] key: &str) {
        assert_eq!(validate(key).unwrap(), key);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("a\0b")]
    #[case("line\nbreak")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = validate(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }
}
