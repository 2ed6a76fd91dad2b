//! Cache key validation.

use std::borrow::Borrow;
use std::fmt;

use crate::error::CacheError;

/// A validated, non-empty cache key.
///
/// Keys are opaque: no case folding or trimming is applied, the exact string
/// is the identity used by both the store and the lock registry.
///
/// # Examples
///
/// ```
/// use readthrough_core::CacheKey;
///
/// let key = CacheKey::new("todo:1").unwrap();
/// assert_eq!(key.as_str(), "todo:1");
///
/// assert!(CacheKey::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates and wraps a key.
    pub fn new(key: impl Into<String>) -> Result<Self, CacheError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for CacheKey {
    type Error = CacheError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_rejected() {
        let err = CacheKey::new("").unwrap_err();
        assert!(err.is_invalid_key());

        assert!(CacheKey::try_from(String::new()).is_err());
    }

    #[test]
    fn test_key_is_not_normalized() {
        let lower = CacheKey::new("todo").unwrap();
        let upper = CacheKey::new("TODO").unwrap();
        let padded = CacheKey::new(" todo").unwrap();

        assert_ne!(lower, upper);
        assert_ne!(lower, padded);
        assert_eq!(padded.as_str(), " todo");
    }

    #[test]
    fn test_key_borrows_as_str() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(CacheKey::new("a:b").unwrap());

        assert!(set.contains("a:b"));
        assert_eq!(CacheKey::new("a:b").unwrap().to_string(), "a:b");
    }
}
