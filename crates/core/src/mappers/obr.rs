//! `OBR` → `ServiceRequest`.

use super::common::{coded_element, coded_field, entity_identifier, practitioner};
use super::{MappingContext, SegmentMapper};
use crate::{MappingError, MappingResult};
use fhir::{RequestIntent, ServiceRequest, ServiceRequestStatus};
use hl7::{Segment, SegmentTag};

pub struct ObrMapper;

impl SegmentMapper for ObrMapper {
    const TAG: SegmentTag = SegmentTag::OBR;
    type Output = ServiceRequest;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<ServiceRequest> {
        let code = coded_field(segment, 4, "OBR-4", ctx).ok_or(MappingError::MissingField("OBR-4"))?;

        let mut identifier = Vec::new();
        for (field, type_key) in [(2, "PLAC"), (3, "FILL")] {
            if let Some(repetition) = segment.field(field).and_then(|f| f.first()) {
                identifier.extend(entity_identifier(|n| repetition.value(n), type_key, ctx));
            }
        }

        let reason_code = segment
            .repetitions(31)
            .filter_map(|r| coded_element(r, ctx))
            .collect();

        Ok(ServiceRequest {
            id: None,
            identifier,
            status: segment.value(25).map(status).unwrap_or_default(),
            intent: RequestIntent::Order,
            code: Some(code),
            subject: None,
            occurrence_date_time: ctx.date_time("OBR-7", segment.value(7)),
            authored_on: ctx.date_time("OBR-6", segment.value(6)),
            requester: segment
                .field(16)
                .and_then(|f| f.first())
                .and_then(|r| practitioner(r, ctx)),
            reason_code,
        })
    }
}

/// `OBR-25` result status (table 0123).
fn status(code: &str) -> ServiceRequestStatus {
    match code {
        "F" | "C" => ServiceRequestStatus::Completed,
        "P" | "R" | "I" | "S" | "A" => ServiceRequestStatus::Active,
        "X" => ServiceRequestStatus::Revoked,
        _ => ServiceRequestStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::test_support::map;

    const HEADER: &str = "MSH|^~\\&|APP|FAC|||20240101||ORU^R01|1|P|2.5\r";

    #[test]
    fn maps_order() {
        let (result, diagnostics) = map::<ObrMapper>(&format!(
            "{HEADER}OBR|1|CMD001^DPI|LAB001^LABO|GLU^Glycemie^LN|||20240315080000|||||||||10001234567^HOUSE^GREGORY^^^DR^^^RPPS|||||||||F||||||E11^Diabete type 2^I10"
        ));
        let request = result.expect("service request");

        assert_eq!(request.intent, RequestIntent::Order);
        assert_eq!(request.status, ServiceRequestStatus::Completed);
        assert_eq!(request.identifier.len(), 2);
        assert_eq!(request.identifier[0].value.as_deref(), Some("CMD001"));
        assert_eq!(
            request.identifier[0]
                .type_
                .as_ref()
                .and_then(|t| t.codes().next()),
            Some("PLAC")
        );
        assert_eq!(
            request.identifier[1]
                .type_
                .as_ref()
                .and_then(|t| t.codes().next()),
            Some("FILL")
        );
        assert_eq!(
            request.code.as_ref().and_then(|c| c.codes().next()),
            Some("GLU")
        );
        assert_eq!(
            request.occurrence_date_time.as_deref(),
            Some("2024-03-15T08:00:00+00:00")
        );
        assert_eq!(request.authored_on, None);
        assert_eq!(
            request.requester.and_then(|r| r.display).as_deref(),
            Some("DR GREGORY HOUSE")
        );
        assert_eq!(request.reason_code.len(), 1);
        assert_eq!(
            request.reason_code[0].coding[0].system.as_deref(),
            Some("http://hl7.org/fhir/sid/icd-10")
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn status_codes_map_to_r4() {
        for (code, expected) in [
            ("P", ServiceRequestStatus::Active),
            ("C", ServiceRequestStatus::Completed),
            ("X", ServiceRequestStatus::Revoked),
            ("Y", ServiceRequestStatus::Unknown),
        ] {
            assert_eq!(status(code), expected, "{code}");
        }

        let (result, _) = map::<ObrMapper>(&format!("{HEADER}OBR|1|||GLU"));
        assert_eq!(
            result.expect("service request").status,
            ServiceRequestStatus::Unknown
        );
    }

    #[test]
    fn code_is_required() {
        let (result, _) = map::<ObrMapper>(&format!("{HEADER}OBR|1|CMD001"));
        assert_eq!(result, Err(MappingError::MissingField("OBR-4")));
    }
}
