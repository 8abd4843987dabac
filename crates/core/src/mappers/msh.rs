//! `MSH` → `MessageHeader`, plus the Bundle-level metadata the header carries.

use super::{MappingContext, SegmentMapper};
use crate::constants::{V2_EVENT_TYPE_SYSTEM, V2_MESSAGE_TYPE_SYSTEM};
use crate::{MappingError, MappingResult};
use fhir::{Coding, Identifier, MessageDestination, MessageHeader, MessageSource, Reference};
use hl7::{Hl7Timestamp, Segment, SegmentTag};

/// Endpoint used when the header names no application at all.
const UNKNOWN_ENDPOINT: &str = "unknown";

pub struct MshMapper;

impl SegmentMapper for MshMapper {
    const TAG: SegmentTag = SegmentTag::MSH;
    type Output = MessageHeader;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<MessageHeader> {
        let event_coding = event_coding(segment, ctx)?;

        let source_endpoint = endpoint(segment, 3).unwrap_or_else(|| {
            ctx.info("MSH-3: no sending application, source endpoint set to 'unknown'");
            UNKNOWN_ENDPOINT.to_owned()
        });
        let source = MessageSource {
            name: segment.component(3, 1).map(str::to_owned),
            software: None,
            endpoint: source_endpoint,
        };

        let destination = if segment.value(5).is_some() || segment.value(6).is_some() {
            vec![MessageDestination {
                name: segment.component(5, 1).map(str::to_owned),
                endpoint: endpoint(segment, 5).unwrap_or_else(|| UNKNOWN_ENDPOINT.to_owned()),
                receiver: segment.component(6, 1).map(Reference::display),
            }]
        } else {
            Vec::new()
        };

        Ok(MessageHeader {
            id: None,
            event_coding,
            destination,
            sender: segment.component(4, 1).map(Reference::display),
            source,
            focus: Vec::new(),
        })
    }
}

/// `MSH-9.2` trigger event in table 0003, or `MSH-9.1` message type in table 0076 when the
/// event is absent.
fn event_coding(segment: &Segment, ctx: &MappingContext<'_>) -> MappingResult<Coding> {
    let message_code = segment.component(9, 1);
    let trigger = segment.component(9, 2);
    let display = match (message_code, trigger) {
        (Some(code), Some(event)) => Some(format!("{code}{}{event}", ctx.encoding().component)),
        (Some(code), None) => Some(code.to_owned()),
        _ => None,
    };

    let coding = match (trigger, message_code) {
        (Some(event), _) => Coding::new(V2_EVENT_TYPE_SYSTEM, event),
        (None, Some(code)) => Coding::new(V2_MESSAGE_TYPE_SYSTEM, code),
        (None, None) => return Err(MappingError::MissingField("MSH-9")),
    };
    Ok(match display {
        Some(display) => coding.with_display(display),
        None => coding,
    })
}

/// `HD.2` universal id of a hierarchic designator field, else its `HD.1` namespace.
fn endpoint(segment: &Segment, n: usize) -> Option<String> {
    segment
        .component(n, 2)
        .or_else(|| segment.component(n, 1))
        .map(str::to_owned)
}

/// Bundle attributes read from the header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundleMetadata {
    /// `MSH-7` as a FHIR `instant`.
    pub timestamp: Option<String>,
    /// `MSH-10` message control id.
    pub identifier: Option<Identifier>,
}

impl BundleMetadata {
    pub fn from_header(segment: &Segment, ctx: &mut MappingContext<'_>) -> Self {
        let timestamp = segment
            .value(7)
            .and_then(|raw| match Hl7Timestamp::parse(raw) {
                Ok(ts) => Some(ts.to_fhir_instant(ctx.options().default_offset)),
                Err(err) => {
                    ctx.warn(format!("MSH-7: {err}"));
                    None
                }
            });

        Self {
            timestamp,
            identifier: segment.value(10).map(Identifier::value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::test_support::{map, segment};
    use crate::mappers::MappingContext;
    use crate::ConvertOptions;
    use hl7::Encoding;
    use terminology::TerminologyResolver;

    const HEADER: &str =
        "MSH|^~\\&|LABO^1.2.3.4^ISO|CHU NORD|DPI^DPI.EXAMPLE|CHU SUD|20240315143000+0100||ORU^R01^ORU_R01|MSG00042|P|2.5";

    #[test]
    fn maps_event_source_and_destination() {
        let (header, diagnostics) = map::<MshMapper>(HEADER);
        let header = header.expect("header");

        assert_eq!(header.event_coding.system.as_deref(), Some(V2_EVENT_TYPE_SYSTEM));
        assert_eq!(header.event_coding.code.as_deref(), Some("R01"));
        assert_eq!(header.event_coding.display.as_deref(), Some("ORU^R01"));
        assert_eq!(header.source.name.as_deref(), Some("LABO"));
        assert_eq!(header.source.endpoint, "1.2.3.4");
        assert_eq!(
            header.sender.and_then(|s| s.display).as_deref(),
            Some("CHU NORD")
        );
        assert_eq!(header.destination.len(), 1);
        assert_eq!(header.destination[0].endpoint, "DPI.EXAMPLE");
        assert_eq!(
            header.destination[0]
                .receiver
                .as_ref()
                .and_then(|r| r.display.as_deref()),
            Some("CHU SUD")
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn message_type_without_event_uses_table_0076() {
        let (header, _) = map::<MshMapper>("MSH|^~\\&|APP||||||ACK");
        let coding = header.expect("header").event_coding;
        assert_eq!(coding.system.as_deref(), Some(V2_MESSAGE_TYPE_SYSTEM));
        assert_eq!(coding.code.as_deref(), Some("ACK"));
    }

    #[test]
    fn missing_message_type_is_an_error() {
        let (header, _) = map::<MshMapper>("MSH|^~\\&|APP|FAC");
        assert_eq!(header, Err(MappingError::MissingField("MSH-9")));
    }

    #[test]
    fn missing_application_gets_placeholder_endpoint() {
        let (header, diagnostics) = map::<MshMapper>("MSH|^~\\&|||||||ADT^A01");
        let header = header.expect("header");
        assert_eq!(header.source.endpoint, "unknown");
        assert!(header.destination.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn bundle_metadata_reads_timestamp_and_control_id() {
        let terminology = TerminologyResolver::default();
        let options = ConvertOptions::default();
        let mut ctx = MappingContext::new(&terminology, &options, Encoding::default());

        let metadata = BundleMetadata::from_header(&segment(HEADER, SegmentTag::MSH), &mut ctx);
        assert_eq!(
            metadata.timestamp.as_deref(),
            Some("2024-03-15T14:30:00+01:00")
        );
        assert_eq!(
            metadata.identifier.and_then(|i| i.value).as_deref(),
            Some("MSG00042")
        );

        let metadata =
            BundleMetadata::from_header(&segment("MSH|^~\\&|APP||||2024-03-15", SegmentTag::MSH), &mut ctx);
        assert_eq!(metadata.timestamp, None);
        assert_eq!(ctx.diagnostics().len(), 1);
    }
}
