//! Restricted-alphabet identifier used for every storage key.
//!
//! # Responsibility
//! - Validate raw strings before they can reach any repository method.
//! - Carry the trimmed, validated form through the storage layer.
//!
//! # Invariants
//! - Only `A-Z a-z 0-9 - _` survive construction.
//! - Leading/trailing whitespace is trimmed; case is preserved.
//! - Values are immutable after construction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]*$").expect("valid identifier regex"));

/// Raised when a raw string contains characters outside the permitted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierError {
    /// Input exactly as the caller supplied it.
    pub raw: String,
}

impl Display for IdentifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "identifier `{}` contains characters that are not permitted; only A-Za-z0-9 and '_' and '-' are permitted",
            self.raw
        )
    }
}

impl Error for IdentifierError {}

/// Validated key component: namespace, local card id, processing tag or
/// feature-set tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Trims `raw` and validates every remaining character.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let raw = raw.as_ref();
        let trimmed = raw.trim();
        if !IDENTIFIER_RE.is_match(trimmed) {
            return Err(IdentifierError {
                raw: raw.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Eq, Ord and Hash all delegate to the inner string.
impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::Identifier;

    #[test]
    fn accepts_permitted_alphabet_and_trims() {
        let id = Identifier::new("  pet911ru_A-9 \t").unwrap();
        assert_eq!(id.as_str(), "pet911ru_A-9");
        assert_eq!(id.to_string(), "pet911ru_A-9");
    }

    #[test]
    fn preserves_case() {
        let id: Identifier = "RfAbC".parse().unwrap();
        assert_eq!(id.as_str(), "RfAbC");
        assert_ne!(id, Identifier::new("rfabc").unwrap());
    }

    #[test]
    fn rejects_foreign_characters_and_keeps_raw_input() {
        for raw in ["a b", "semi;colon", "quote'", "slash/", "dot.", "кошка", "a\nb"] {
            let err = Identifier::new(raw).unwrap_err();
            assert_eq!(err.raw, raw);
            assert!(err.to_string().contains("not permitted"));
        }
    }

    #[test]
    fn empty_after_trim_is_accepted() {
        assert_eq!(Identifier::new("   ").unwrap().as_str(), "");
    }

    #[test]
    fn serde_roundtrip_validates() {
        let id: Identifier = serde_json::from_str("\" embedding \"").unwrap();
        assert_eq!(id.as_str(), "embedding");
        assert!(serde_json::from_str::<Identifier>("\"bad tag\"").is_err());
    }
}
