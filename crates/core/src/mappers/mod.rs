//! Segment mappers.
//!
//! Each mapper turns one HL7 segment into one FHIR resource, without identity or references:
//! the assembler allocates identities and wires resources together afterwards. Field problems
//! that leave the resource usable (an unparseable timestamp, an unknown class code) become
//! diagnostics on the [`MappingContext`]; problems that make the resource meaningless return a
//! [`MappingError`](crate::MappingError) and the segment is skipped.

mod common;
pub mod msh;
pub mod nk1;
pub mod obr;
pub mod obx;
pub mod pid;
pub mod pv1;
pub mod spm;

pub use msh::{BundleMetadata, MshMapper};
pub use nk1::Nk1Mapper;
pub use obr::ObrMapper;
pub use obx::ObxMapper;
pub use pid::PidMapper;
pub use pv1::Pv1Mapper;
pub use spm::SpmMapper;

use crate::config::ConvertOptions;
use crate::diagnostic::Diagnostic;
use crate::MappingResult;
use fhir::CodeableConcept;
use hl7::{Encoding, Hl7Timestamp, Segment, SegmentTag};
use terminology::TerminologyResolver;

/// Maps one segment type to one resource type.
pub trait SegmentMapper {
    /// The segment type this mapper reads.
    const TAG: SegmentTag;

    type Output;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<Self::Output>;
}

/// Shared state for mapping the segments of one message.
pub struct MappingContext<'a> {
    terminology: &'a TerminologyResolver,
    options: &'a ConvertOptions,
    encoding: Encoding,
    location: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> MappingContext<'a> {
    pub fn new(
        terminology: &'a TerminologyResolver,
        options: &'a ConvertOptions,
        encoding: Encoding,
    ) -> Self {
        Self {
            terminology,
            options,
            encoding,
            location: String::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn terminology(&self) -> &TerminologyResolver {
        self.terminology
    }

    pub fn options(&self) -> &ConvertOptions {
        self.options
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Sets the location attached to diagnostics raised from now on (`OBX[2]`).
    pub fn enter(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(self.location.clone(), message);
        tracing::debug!(%diagnostic, "mapping warning");
        self.diagnostics.push(diagnostic);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::info(self.location.clone(), message));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// The FHIR `system` for a coding-system token (local key, OID or URI).
    pub fn system_uri(&self, token: Option<&str>) -> Option<String> {
        token.and_then(|t| self.terminology.table().system_uri_for(t))
    }

    /// A `TS`/`DT` value as a FHIR `date`. Invalid values warn and give `None`.
    pub fn date(&mut self, field: &str, raw: Option<&str>) -> Option<String> {
        self.timestamp(field, raw).map(|ts| ts.to_fhir_date())
    }

    /// A `TS`/`DTM` value as a FHIR `dateTime`. Invalid values warn and give `None`.
    pub fn date_time(&mut self, field: &str, raw: Option<&str>) -> Option<String> {
        let offset = self.options.default_offset;
        self.timestamp(field, raw)
            .map(|ts| ts.to_fhir_datetime(offset))
    }

    fn timestamp(&mut self, field: &str, raw: Option<&str>) -> Option<Hl7Timestamp> {
        let raw = raw?;
        match Hl7Timestamp::parse(raw) {
            Ok(ts) => Some(ts),
            Err(err) => {
                self.warn(format!("{field}: {err}"));
                None
            }
        }
    }

    /// Checks every coding of `concept` against the terminology backend when validation is on.
    pub fn check_codes(&mut self, field: &str, concept: &CodeableConcept) {
        if !self.options.validate_terminology {
            return;
        }
        for coding in &concept.coding {
            let (Some(system), Some(code)) = (coding.system.as_deref(), coding.code.as_deref())
            else {
                continue;
            };
            if !self.terminology.is_valid_code(system, code) {
                self.info(format!("{field}: code '{code}' is not defined in {system}"));
            }
        }
    }
}

/// Location label for the `index`th (0-based) segment with `tag`: `OBX[2]` for the second OBX.
pub fn segment_location(tag: SegmentTag, index: usize) -> String {
    format!("{tag}[{}]", index + 1)
}
