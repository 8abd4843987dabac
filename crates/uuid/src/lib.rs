//! Resource identity utilities.
//!
//! Every FHIR resource produced by a conversion gets a fresh identity, and resources refer to one
//! another only through that identity (`urn:uuid:<id>` inside a transaction Bundle).
//!
//! ## Canonical form
//! - Hyphenated, lowercase RFC 4122 text: `550e8400-e29b-41d4-a716-446655440000`
//! - This is a valid FHIR `id` (at most 64 characters from `[A-Za-z0-9\-\.]`)
//! - The Bundle `fullUrl` form is `urn:uuid:550e8400-e29b-41d4-a716-446655440000`
//!
//! Identities are allocated through an [`IdSource`], so the assembler can be driven by random
//! v4 identities in production and by a deterministic sequence in tests.

mod service;

// Re-export public types
pub use service::{IdSource, RandomIds, ResourceId, SequentialIds, Uuid};

/// Error type for identity operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identity operations.
pub type UuidResult<T> = Result<T, UuidError>;
