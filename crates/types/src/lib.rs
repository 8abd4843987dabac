//! Validated text primitives shared across the fhirhub crates.
//!
//! These wrappers carry their invariant in the type: once constructed, a value is known to be
//! well-formed, so downstream code (terminology tables, identifier resolution) never re-checks.

use std::fmt;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input is not a dotted-decimal object identifier
    #[error("Invalid OID: '{0}'")]
    InvalidOid(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// An ISO object identifier in dotted-decimal form (for example `1.2.250.1.213.1.4.8`).
///
/// Regional health authorities name identifier and code systems with OIDs; HL7 v2 feeds carry
/// them in the universal-ID component of assigning authorities and coding-system fields.
/// Accepts an optional `urn:oid:` prefix, which is stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(String);

impl Oid {
    /// Parses an OID, rejecting empty arcs, non-digit characters and single-arc values.
    pub fn parse(input: &str) -> Result<Self, TextError> {
        let trimmed = input.trim();
        let bare = trimmed.strip_prefix("urn:oid:").unwrap_or(trimmed);

        if Self::is_oid(bare) {
            Ok(Self(bare.to_owned()))
        } else {
            Err(TextError::InvalidOid(input.to_owned()))
        }
    }

    /// Returns true if `input` is a bare dotted-decimal OID with at least two arcs.
    pub fn is_oid(input: &str) -> bool {
        let mut arcs = 0usize;
        for arc in input.split('.') {
            if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            arcs += 1;
        }
        arcs >= 2
    }

    /// Returns the bare dotted-decimal form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `urn:oid:` URI FHIR uses for systems that have no canonical URL.
    pub fn to_urn(&self) -> String {
        format!("urn:oid:{}", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Oid {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Oid::parse(s)
    }
}

impl serde::Serialize for Oid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Oid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Oid::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        let text = NonEmptyText::new("  CCAM ").expect("valid text");
        assert_eq!(text.as_str(), "CCAM");
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
    }

    #[test]
    fn non_empty_text_deserialize_rejects_blank() {
        let err = serde_json::from_str::<NonEmptyText>("\" \"").expect_err("blank rejected");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn oid_accepts_urn_prefix() {
        let oid = Oid::parse("urn:oid:1.2.250.1.213.1.4.8").expect("valid oid");
        assert_eq!(oid.as_str(), "1.2.250.1.213.1.4.8");
        assert_eq!(oid.to_urn(), "urn:oid:1.2.250.1.213.1.4.8");
    }

    #[test]
    fn oid_rejects_malformed_values() {
        for bad in ["", "1", "1..2", "1.2.a", "INS-NIR", "1.2."] {
            assert!(Oid::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
