//! # FHIR Hub Core
//!
//! HL7 v2.5 to FHIR R4 conversion.
//!
//! This crate owns the conversion pipeline and nothing else:
//! - [`ConversionEngine`]: tokenize, group, map, assemble; one call per message
//! - [`mappers`]: one [`mappers::SegmentMapper`] per supported segment (`MSH`, `PID`, `PV1`,
//!   `NK1`, `OBR`, `OBX`, `SPM`)
//! - [`BundleAssembler`]: identities, references and the transaction Bundle
//! - [`CoreConfig`]: startup configuration, read from the environment by the binaries
//!
//! **No transport concerns**: reading files, HTTP, or MLLP listeners belong in the binaries.
//! Everything here is synchronous and safe to share between threads.

pub mod assembler;
pub mod config;
pub mod constants;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod mappers;
pub mod name;

pub use assembler::{BundleAssembler, MappedResources, Positioned};
pub use config::{
    lookup_timeout_from_env_value, snapshot_path_from_env_value, utc_offset_from_env_value,
    ConvertOptions, CoreConfig,
};
pub use diagnostic::{Diagnostic, Severity};
pub use engine::{convert, Conversion, ConversionEngine};
pub use error::{
    ConfigError, ConfigResult, ConversionError, ConversionResult, MappingError, MappingResult,
    Stage,
};
pub use name::{resolve_names, NameRecord};
