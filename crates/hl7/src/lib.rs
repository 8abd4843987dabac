//! HL7 v2.x message structure.
//!
//! This crate turns raw HL7 v2 text into typed structure, without knowing anything about FHIR:
//! - [`RawMessage`] / [`tokenize`]: header detection, encoding characters, segment and field
//!   splitting, escape decoding
//! - [`Field`] / [`Repetition`] / [`Component`]: the three nesting levels of a field value,
//!   addressed with 1-based positions like the HL7 tables
//! - [`ParsedMessage`]: segments grouped by type tag, in message order
//! - [`Hl7Timestamp`]: `TS`/`DTM` values rendered as FHIR `date`/`dateTime`
//!
//! Everything here is pure and synchronous.

pub mod datetime;
pub mod encoding;
pub mod message;
pub mod segment;
pub mod tokenizer;
pub mod value;

pub use datetime::{Hl7Timestamp, Precision};
pub use encoding::{Encoding, HEADER_TAG, MIN_ENCODING_CHARS};
pub use message::ParsedMessage;
pub use segment::{Segment, SegmentTag};
pub use tokenizer::{tokenize, RawMessage, TokenizeWarning, Tokenized, SEGMENT_TERMINATOR};
pub use value::{Component, Field, Repetition};

/// Errors returned by the `hl7` crate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Hl7Error {
    #[error("message is empty")]
    Empty,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Type alias for Results that can fail with an [`Hl7Error`].
pub type Hl7Result<T> = Result<T, Hl7Error>;
