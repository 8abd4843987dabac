//! Terminology resolution for HL7 v2 to FHIR conversion.
//!
//! Two concerns live here:
//! - [`CodeSystemTable`]: the static, embedded table that turns local tokens (`CCAM`,
//!   `INS-NIR`, `LN`, an OID, ...) into FHIR canonical system URIs, plus the identifier-type
//!   codes used for `Identifier.type`
//! - [`TerminologyResolver`]: best-effort code validation through an optional
//!   [`TerminologyBackend`], with a process-lifetime cache
//!
//! Validation is advisory. Without a backend every code is valid, and a backend that fails or
//! times out degrades to "valid" instead of failing the conversion.

mod resolver;
mod snapshot;
mod table;

pub use resolver::{
    TerminologyBackend, TerminologyResolver, DEFAULT_LOOKUP_TIMEOUT, MAX_IN_FLIGHT_LOOKUPS,
};
pub use snapshot::SnapshotBackend;
pub use table::{CodeSystemEntry, CodeSystemTable, IdentifierTypeEntry, BUILTIN_TABLE_YAML};

use std::time::Duration;

/// Errors returned by the `terminology` crate.
#[derive(Debug, thiserror::Error)]
pub enum TerminologyError {
    #[error("code system not found: {0}")]
    NotFound(String),

    #[error("invalid code-system table: {0}")]
    InvalidTable(String),

    #[error("code system not known to the terminology backend: {0}")]
    UnknownSystem(String),

    #[error("terminology backend error: {0}")]
    Backend(String),

    #[error("terminology lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} terminology lookups already in flight")]
    Saturated(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// Type alias for Results that can fail with a [`TerminologyError`].
pub type TerminologyResult<T> = Result<T, TerminologyError>;
