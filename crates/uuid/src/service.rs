//! Internal implementation of resource identities and identity sources.

use crate::{UuidError, UuidResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

const URN_PREFIX: &str = "urn:uuid:";

/// Identity of a FHIR resource within a Bundle.
///
/// Once constructed the contained UUID always renders in canonical hyphenated lowercase form,
/// which is what both `Resource.id` and `Bundle.entry.fullUrl` carry.
///
/// # Construction
/// - [`ResourceId::new`] generates a fresh random (v4) identity.
/// - [`ResourceId::parse`] validates an externally supplied identity.
/// - [`ResourceId::from_urn`] reads the `urn:uuid:` form used in references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(Uuid);

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceId {
    /// Generates a new random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Validates and parses an identity that must already be in canonical form.
    ///
    /// Uppercase, simple (unhyphenated) and braced forms are rejected so that the same
    /// resource can never be referenced under two spellings.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "resource id must be a lowercase hyphenated UUID, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid resource id '{input}': {e}")))
    }

    /// Parses the `urn:uuid:` reference form.
    pub fn from_urn(input: &str) -> UuidResult<Self> {
        let bare = input.strip_prefix(URN_PREFIX).ok_or_else(|| {
            UuidError::InvalidInput(format!("expected '{URN_PREFIX}' prefix, got: '{input}'"))
        })?;
        Self::parse(bare)
    }

    /// Returns true if `input` is 36 characters of lowercase hex in 8-4-4-4-12 groups.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 36
            && input.bytes().enumerate().all(|(i, b)| match i {
                8 | 13 | 18 | 23 => b == b'-',
                _ => matches!(b, b'0'..=b'9' | b'a'..=b'f'),
            })
    }

    /// Returns the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the `urn:uuid:` form used for `fullUrl` and intra-Bundle references.
    pub fn urn(&self) -> String {
        format!("{URN_PREFIX}{}", self.0.hyphenated())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ResourceId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ResourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ResourceId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Allocator of resource identities.
///
/// Implementations must be safe to share between threads: a single engine serves concurrent
/// conversions.
pub trait IdSource: Send + Sync {
    /// Returns the next identity.
    fn next_id(&self) -> ResourceId;
}

/// Random v4 identities. The default source.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> ResourceId {
        ResourceId::new()
    }
}

/// Deterministic identities `00000000-0000-0000-0000-000000000001`, `...0002`, and so on.
///
/// Useful for reproducible output in tests and fixtures.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a source whose first identity is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> ResourceId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        ResourceId(Uuid::from_u128(u128::from(n)))
    }
}
