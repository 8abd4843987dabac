use hl7::Hl7Error;
use serde::Serialize;
use std::fmt;

/// States of one conversion, in the order they are visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Idle,
    Tokenizing,
    Grouping,
    Mapping,
    Assembling,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Tokenizing => "tokenizing",
            Stage::Grouping => "grouping",
            Stage::Mapping => "mapping",
            Stage::Assembling => "assembling",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a whole conversion failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("message is empty")]
    EmptyInput,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("no mappable segments while {stage}: {reason}")]
    NoMappableSegments { stage: Stage, reason: String },

    #[error("internal mapping error while {stage} ({segment}): {cause}")]
    InternalMappingError {
        stage: Stage,
        segment: String,
        cause: String,
    },
}

impl ConversionError {
    /// The pipeline state the conversion failed in.
    pub fn stage(&self) -> Stage {
        match self {
            ConversionError::EmptyInput | ConversionError::MalformedHeader(_) => Stage::Tokenizing,
            ConversionError::NoMappableSegments { stage, .. }
            | ConversionError::InternalMappingError { stage, .. } => *stage,
        }
    }

    pub(crate) fn internal(stage: Stage, segment: impl Into<String>, cause: impl fmt::Display) -> Self {
        ConversionError::InternalMappingError {
            stage,
            segment: segment.into(),
            cause: cause.to_string(),
        }
    }
}

impl From<Hl7Error> for ConversionError {
    fn from(err: Hl7Error) -> Self {
        match err {
            Hl7Error::Empty => ConversionError::EmptyInput,
            Hl7Error::MalformedHeader(reason) => ConversionError::MalformedHeader(reason),
            other @ Hl7Error::InvalidTimestamp(_) => {
                ConversionError::internal(Stage::Tokenizing, "MSH", other)
            }
        }
    }
}

/// Type alias for Results that can fail with a [`ConversionError`].
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Why a single segment could not be mapped. The segment is skipped, the conversion goes on.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("unsupported value type '{0}'")]
    UnsupportedValueType(String),

    #[error("invalid value in {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type MappingResult<T> = Result<T, MappingError>;

/// Startup configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("terminology error: {0}")]
    Terminology(#[from] terminology::TerminologyError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_errors_map_to_tokenizing_stage() {
        let empty: ConversionError = Hl7Error::Empty.into();
        assert_eq!(empty, ConversionError::EmptyInput);
        assert_eq!(empty.stage(), Stage::Tokenizing);

        let header: ConversionError = Hl7Error::MalformedHeader("too short".into()).into();
        assert_eq!(header, ConversionError::MalformedHeader("too short".into()));
        assert_eq!(header.stage(), Stage::Tokenizing);
    }

    #[test]
    fn structured_errors_carry_their_stage() {
        let err = ConversionError::NoMappableSegments {
            stage: Stage::Mapping,
            reason: "message has no PID segment".into(),
        };
        assert_eq!(err.stage(), Stage::Mapping);
        assert_eq!(
            err.to_string(),
            "no mappable segments while mapping: message has no PID segment"
        );

        let err = ConversionError::internal(Stage::Assembling, "Bundle", "duplicate identity");
        assert_eq!(err.stage(), Stage::Assembling);
        assert!(err.to_string().contains("(Bundle)"));
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Idle < Stage::Tokenizing);
        assert!(Stage::Mapping < Stage::Assembling);
        assert!(Stage::Assembling < Stage::Done);
    }
}
