//! The conversion pipeline.
//!
//! One call walks `Idle → Tokenizing → Grouping → Mapping → Assembling → Done`. A failure in
//! any state ends the conversion with a [`ConversionError`] naming that state; there is no
//! retry and no partial Bundle. A single segment failing to map is not a failure: it is
//! skipped and reported as a [`Diagnostic`].

use crate::assembler::{BundleAssembler, MappedResources, Positioned};
use crate::config::ConvertOptions;
use crate::diagnostic::Diagnostic;
use crate::mappers::{
    segment_location, BundleMetadata, MappingContext, MshMapper, Nk1Mapper, ObrMapper,
    ObxMapper, PidMapper, Pv1Mapper, SegmentMapper, SpmMapper,
};
use crate::{ConversionError, ConversionResult, Stage};
use fhir::Bundle;
use fhirhub_uuid::{IdSource, RandomIds};
use hl7::{ParsedMessage, RawMessage, Segment, SegmentTag};
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use terminology::TerminologyResolver;

/// The result of a successful conversion.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub bundle: Bundle,
    pub resource_count: usize,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    pub duration: Duration,
    /// `MSH-9` as written (`ORU^R01`), when present.
    pub message_type: Option<String>,
}

impl Conversion {
    pub fn duration_nanos(&self) -> u128 {
        self.duration.as_nanos()
    }

    /// Diagnostics rendered as `LOCATION: message`.
    pub fn diagnostic_messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    pub fn to_json_pretty(&self) -> fhir::FhirResult<String> {
        self.bundle.to_json_pretty()
    }
}

/// Converts HL7 v2 messages to FHIR transaction Bundles.
///
/// Holds only shared, read-mostly state, so one engine can serve concurrent conversions
/// (`Arc<ConversionEngine>` across threads). Conversions never influence each other apart from
/// warming the terminology cache.
pub struct ConversionEngine {
    terminology: Arc<TerminologyResolver>,
    ids: Arc<dyn IdSource>,
}

impl std::fmt::Debug for ConversionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionEngine")
            .field("terminology", &self.terminology)
            .finish_non_exhaustive()
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new(Arc::new(TerminologyResolver::default()))
    }
}

static DEFAULT_ENGINE: LazyLock<ConversionEngine> = LazyLock::new(ConversionEngine::default);

/// Converts `raw` with a process-wide engine over the built-in code-system table.
pub fn convert(raw: &str, options: &ConvertOptions) -> ConversionResult<Conversion> {
    DEFAULT_ENGINE.convert(raw, options)
}

impl ConversionEngine {
    /// An engine allocating random identities.
    pub fn new(terminology: Arc<TerminologyResolver>) -> Self {
        Self {
            terminology,
            ids: Arc::new(RandomIds),
        }
    }

    /// Replaces the identity source (deterministic identities for fixtures and tests).
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn terminology(&self) -> &TerminologyResolver {
        &self.terminology
    }

    /// Runs the whole pipeline on one message.
    ///
    /// # Errors
    ///
    /// - [`ConversionError::EmptyInput`] / [`ConversionError::MalformedHeader`] while tokenizing
    /// - [`ConversionError::NoMappableSegments`] when there is no `PID` to build a Patient from
    /// - [`ConversionError::InternalMappingError`] when the header or patient segment cannot be
    ///   mapped, or the Bundle cannot be assembled
    pub fn convert(&self, raw: &str, options: &ConvertOptions) -> ConversionResult<Conversion> {
        let started = Instant::now();
        tracing::debug!(stage = %Stage::Tokenizing, bytes = raw.len(), "conversion started");

        let raw_message = RawMessage::parse(raw)?;
        let tokenized = raw_message.tokenize();
        let mut diagnostics: Vec<Diagnostic> = tokenized
            .warnings
            .iter()
            .map(|w| Diagnostic::warning(format!("line {}", w.line), w.message.clone()))
            .collect();

        tracing::debug!(stage = %Stage::Grouping, segments = tokenized.segments.len());
        if tokenized.segments.is_empty() {
            return Err(ConversionError::NoMappableSegments {
                stage: Stage::Grouping,
                reason: "message has no segments".into(),
            });
        }
        let message = ParsedMessage::group(tokenized);
        let message_type = message.message_type();

        tracing::debug!(stage = %Stage::Mapping, message_type = message_type.as_deref());
        let mut ctx = MappingContext::new(&self.terminology, options, *message.encoding());
        let mapped = map_message(&message, &mut ctx)?;
        diagnostics.extend(ctx.into_diagnostics());

        tracing::debug!(stage = %Stage::Assembling);
        let bundle = BundleAssembler::new(self.ids.as_ref()).assemble(mapped)?;

        let conversion = Conversion {
            resource_count: bundle.len(),
            bundle,
            diagnostics,
            duration: started.elapsed(),
            message_type,
        };
        tracing::info!(
            stage = %Stage::Done,
            message_type = conversion.message_type.as_deref(),
            resources = conversion.resource_count,
            diagnostics = conversion.diagnostics.len(),
            duration_us = conversion.duration.as_micros() as u64,
            "conversion finished"
        );
        Ok(conversion)
    }
}

/// Maps a mandatory segment; failure ends the conversion.
fn map_required<M: SegmentMapper>(
    segment: &Segment,
    ctx: &mut MappingContext<'_>,
) -> ConversionResult<M::Output> {
    ctx.enter(segment_location(M::TAG, 0));
    M::map(segment, ctx)
        .map_err(|err| ConversionError::internal(Stage::Mapping, M::TAG.as_str(), err))
}

/// Maps the `index`th segment of its type; a failure is skipped with a warning.
fn map_optional<M: SegmentMapper>(
    segment: &Segment,
    index: usize,
    ctx: &mut MappingContext<'_>,
) -> Option<Positioned<M::Output>> {
    ctx.enter(segment_location(M::TAG, index));
    match M::map(segment, ctx) {
        Ok(resource) => Some(Positioned::new(segment.position(), resource)),
        Err(err) => {
            tracing::warn!(location = ctx.location(), error = %err, "segment skipped");
            ctx.warn(format!("segment skipped: {err}"));
            None
        }
    }
}

/// Maps every segment of one type.
fn map_each<M: SegmentMapper>(
    message: &ParsedMessage,
    ctx: &mut MappingContext<'_>,
) -> Vec<Positioned<M::Output>> {
    message
        .segments(M::TAG)
        .iter()
        .enumerate()
        .filter_map(|(index, segment)| map_optional::<M>(segment, index, ctx))
        .collect()
}

/// Reports every segment of `tag` after the first as ignored.
fn ignore_extra(message: &ParsedMessage, tag: SegmentTag, ctx: &mut MappingContext<'_>) {
    for index in 1..message.segments(tag).len() {
        ctx.enter(segment_location(tag, index));
        ctx.info(format!("additional {tag} segment ignored"));
    }
}

fn map_message(
    message: &ParsedMessage,
    ctx: &mut MappingContext<'_>,
) -> ConversionResult<MappedResources> {
    let header_segment = message.first(SegmentTag::MSH).ok_or_else(|| {
        ConversionError::NoMappableSegments {
            stage: Stage::Mapping,
            reason: "message has no MSH segment".into(),
        }
    })?;
    let header = map_required::<MshMapper>(header_segment, ctx)?;
    let metadata = BundleMetadata::from_header(header_segment, ctx);

    let patient_segment =
        message
            .first(SegmentTag::PID)
            .ok_or_else(|| ConversionError::NoMappableSegments {
                stage: Stage::Mapping,
                reason: "message has no PID segment".into(),
            })?;
    let patient = map_required::<PidMapper>(patient_segment, ctx)?;
    ignore_extra(message, SegmentTag::PID, ctx);

    let encounter = message
        .first(SegmentTag::PV1)
        .and_then(|segment| map_optional::<Pv1Mapper>(segment, 0, ctx))
        .map(|p| p.resource);
    ignore_extra(message, SegmentTag::PV1, ctx);

    let unknown: Vec<&str> = message
        .tags()
        .iter()
        .filter(|tag| {
            ![
                SegmentTag::MSH,
                SegmentTag::PID,
                SegmentTag::PV1,
                SegmentTag::NK1,
                SegmentTag::OBR,
                SegmentTag::OBX,
                SegmentTag::SPM,
            ]
            .contains(tag)
        })
        .map(SegmentTag::as_str)
        .collect();
    if !unknown.is_empty() {
        tracing::debug!(tags = ?unknown, "segments without a mapper left as is");
    }

    Ok(MappedResources {
        header: Some(header),
        metadata,
        patient: Some(patient),
        encounter,
        related_persons: map_each::<Nk1Mapper>(message, ctx)
            .into_iter()
            .map(|p| p.resource)
            .collect(),
        orders: map_each::<ObrMapper>(message, ctx),
        observations: map_each::<ObxMapper>(message, ctx),
        specimens: map_each::<SpmMapper>(message, ctx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use fhir::{Resource, ResourceType};
    use fhirhub_uuid::SequentialIds;
    use std::thread;

    const ORU: &str = "MSH|^~\\&|LAB|HOSP|EHR|HOSP|20240315093000+0100||ORU^R01^ORU_R01|MSG0001|P|2.5\r\
PID|1||123456^^^HOSP^MR||DUPONT^JEAN^PIERRE||19800101|M|||12 RUE DE LA PAIX^^PARIS^^75001^FRA||0140000000\r\
PV1|1|I|CARDIO^101^A^HOSP||||1234^MARTIN^PAUL^^^DR\r\
NK1|1|DUPONT^MARIE|SPO^Spouse^HL70063\r\
OBR|1|CMD001|LAB001|GLU^Glucose^LN|||20240315080000|||||||||||||||||||F\r\
OBX|1|NM|GLU^Glucose^LN||5.4|mmol/L|3.9-6.1|N|||F|||20240315083000\r\
OBX|2|ST|COMMENT^Comment^L||fasting sample||||||F\r\
SPM|1|SP001||BLD^Whole blood^HL70487\r";

    fn engine() -> ConversionEngine {
        ConversionEngine::default().with_id_source(Arc::new(SequentialIds::default()))
    }

    fn types(conversion: &Conversion) -> Vec<ResourceType> {
        conversion
            .bundle
            .resources()
            .map(Resource::resource_type)
            .collect()
    }

    #[test]
    fn converts_lab_result_message() {
        let conversion = engine()
            .convert(ORU, &ConvertOptions::default())
            .expect("conversion");

        assert_eq!(
            types(&conversion),
            vec![
                ResourceType::MessageHeader,
                ResourceType::Patient,
                ResourceType::Encounter,
                ResourceType::RelatedPerson,
                ResourceType::ServiceRequest,
                ResourceType::Observation,
                ResourceType::Observation,
                ResourceType::Specimen,
            ]
        );
        assert_eq!(conversion.resource_count, 8);
        assert_eq!(conversion.message_type.as_deref(), Some("ORU^R01"));
        assert_eq!(
            conversion.bundle.timestamp.as_deref(),
            Some("2024-03-15T09:30:00+01:00")
        );
        assert!(conversion.diagnostics.is_empty(), "{:?}", conversion.diagnostics);

        let patient_url = conversion
            .bundle
            .resources()
            .find(|r| r.resource_type() == ResourceType::Patient)
            .and_then(Resource::id)
            .map(|id| id.urn())
            .expect("patient id");
        for resource in conversion.bundle.resources() {
            if let Resource::Observation(observation) = resource {
                let subject = observation.subject.as_ref().and_then(|s| s.reference.as_deref());
                assert_eq!(subject, Some(patient_url.as_str()));
                assert_eq!(observation.based_on.len(), 1);
            }
        }
    }

    #[test]
    fn same_input_and_ids_give_identical_output() {
        let first = engine()
            .convert(ORU, &ConvertOptions::default())
            .expect("first");
        let second = engine()
            .convert(ORU, &ConvertOptions::default())
            .expect("second");

        assert_eq!(
            first.to_json_pretty().expect("json"),
            second.to_json_pretty().expect("json")
        );
    }

    #[test]
    fn header_and_patient_only() {
        let conversion = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rPID|1||42^^^FAC^MR||DOE^JOHN",
                &ConvertOptions::default(),
            )
            .expect("conversion");
        assert_eq!(
            types(&conversion),
            vec![ResourceType::MessageHeader, ResourceType::Patient]
        );
        assert!(conversion.diagnostics.is_empty());
    }

    #[test]
    fn unknown_segments_are_tolerated() {
        let conversion = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rEVN|A01|20240101\rPID|1||42^^^FAC^MR||DOE^JOHN\rZBE|1|X",
                &ConvertOptions::default(),
            )
            .expect("conversion");
        assert_eq!(conversion.resource_count, 2);
        assert!(conversion.diagnostics.is_empty());
    }

    #[test]
    fn unmappable_observation_is_skipped_with_a_warning() {
        let conversion = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ORU^R01|1|P|2.5\rPID|1||42^^^FAC^MR||DOE^JOHN\rOBX|1|NM|||5\rOBX|2|NM|GLU^Glucose^LN||5.4",
                &ConvertOptions::default(),
            )
            .expect("conversion");

        assert_eq!(conversion.bundle.count(ResourceType::Observation), 1);
        let warning = conversion
            .diagnostics
            .iter()
            .find(|d| d.severity == Severity::Warning)
            .expect("warning");
        assert_eq!(warning.location, "OBX[1]");
        assert!(warning.message.contains("OBX-3"), "{}", warning.message);
    }

    #[test]
    fn extra_patient_segments_are_reported() {
        let conversion = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rPID|1||42^^^FAC^MR||DOE^JOHN\rPID|2||43^^^FAC^MR||ROE^JANE",
                &ConvertOptions::default(),
            )
            .expect("conversion");
        assert_eq!(conversion.bundle.count(ResourceType::Patient), 1);
        assert_eq!(
            conversion.diagnostic_messages(),
            vec!["PID[2]: additional PID segment ignored".to_string()]
        );
    }

    #[test]
    fn extra_visit_segments_are_not_mapped() {
        let conversion = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rPID|1||42^^^FAC^MR||DOE^JOHN\rPV1|1|I\rPV1|2|Z|||||||||||||||||||||||||||||||||||||||||||bad-date",
                &ConvertOptions::default(),
            )
            .expect("conversion");
        assert_eq!(conversion.bundle.count(ResourceType::Encounter), 1);
        assert_eq!(
            conversion.diagnostic_messages(),
            vec!["PV1[2]: additional PV1 segment ignored".to_string()]
        );
    }

    #[test]
    fn unparseable_lines_become_diagnostics() {
        let conversion = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rPID|1||42^^^FAC^MR||DOE^JOHN\r12|not a segment",
                &ConvertOptions::default(),
            )
            .expect("conversion");
        assert_eq!(conversion.resource_count, 2);
        assert_eq!(conversion.diagnostics.len(), 1);
        assert_eq!(conversion.diagnostics[0].location, "line 3");
    }

    #[test]
    fn empty_and_malformed_input_fail() {
        let engine = engine();
        assert_eq!(
            engine.convert("  \r\n", &ConvertOptions::default()).unwrap_err(),
            ConversionError::EmptyInput
        );
        let err = engine
            .convert("PID|1||42", &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConversionError::MalformedHeader(_)), "{err:?}");
        assert_eq!(err.stage(), Stage::Tokenizing);
    }

    #[test]
    fn message_without_patient_fails() {
        let err = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ORU^R01|1|P|2.5\rOBX|1|NM|GLU||5.4",
                &ConvertOptions::default(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::NoMappableSegments {
                stage: Stage::Mapping,
                reason: "message has no PID segment".into(),
            }
        );
    }

    #[test]
    fn unmappable_patient_fails_the_conversion() {
        let err = engine()
            .convert(
                "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rPID|1",
                &ConvertOptions::default(),
            )
            .unwrap_err();
        assert!(
            matches!(&err, ConversionError::InternalMappingError { segment, .. } if segment == "PID"),
            "{err:?}"
        );
    }

    #[test]
    fn module_level_convert_uses_shared_engine() {
        let conversion = convert(ORU, &ConvertOptions::default()).expect("conversion");
        assert_eq!(conversion.resource_count, 8);
    }

    #[test]
    fn one_engine_serves_concurrent_conversions() {
        let engine = Arc::new(ConversionEngine::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    engine
                        .convert(ORU, &ConvertOptions::default().with_validation(true))
                        .map(|c| c.resource_count)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().expect("thread"), Ok(8));
        }
    }
}
