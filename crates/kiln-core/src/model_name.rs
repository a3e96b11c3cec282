//! Strongly-typed model name wrapper.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Unique name of a model, used as the dependency graph node key.
///
/// Always non-empty. Keeps model identifiers from mixing with table
/// identifiers or arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    /// Create a `ModelName`, failing on an empty string.
    pub fn parse(name: impl Into<String>, context: &str) -> CoreResult<Self> {
        Self::try_new(name).ok_or_else(|| CoreError::EmptyName {
            context: context.to_string(),
        })
    }

    /// Try to create a `ModelName`, returning `None` if the name is empty.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let s = name.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ModelName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ModelName::try_new(s).ok_or_else(|| serde::de::Error::custom("model name must not be empty"))
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ModelName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModelName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ModelName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModelName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty() {
        let err = ModelName::parse("", "test").unwrap_err();
        assert!(matches!(err, CoreError::EmptyName { .. }));
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        let result: Result<ModelName, _> = serde_yaml::from_str("''");
        assert!(result.is_err());

        let name: ModelName = serde_yaml::from_str("heart_rate").unwrap();
        assert_eq!(name, "heart_rate");
    }

    #[test]
    fn test_borrow_lookup() {
        let mut set = std::collections::HashSet::new();
        set.insert(ModelName::parse("health", "test").unwrap());
        assert!(set.contains("health"));
    }
}
