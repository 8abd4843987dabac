//! `PV1` → `Encounter`.

use super::common::{cx_identifier, practitioner};
use super::{MappingContext, SegmentMapper};
use crate::constants::{V3_ACT_CODE_SYSTEM, V3_PARTICIPATION_TYPE_SYSTEM};
use crate::MappingResult;
use fhir::{
    CodeableConcept, Coding, Encounter, EncounterLocation, EncounterParticipant, EncounterStatus,
    Identifier, Period, Reference,
};
use hl7::{Segment, SegmentTag};

pub struct Pv1Mapper;

impl SegmentMapper for Pv1Mapper {
    const TAG: SegmentTag = SegmentTag::PV1;
    type Output = Encounter;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<Encounter> {
        let class = segment.value(2).and_then(|code| {
            let class = encounter_class(code);
            if class.is_none() {
                ctx.warn(format!("PV1-2: unknown patient class '{code}'"));
            }
            class
        });

        let period = Period {
            start: ctx.date_time("PV1-44", segment.value(44)),
            end: ctx.date_time("PV1-45", segment.value(45)),
        };

        let mut participant = Vec::new();
        for (field, role, display) in [
            (7, "ATND", "attender"),
            (8, "REF", "referrer"),
            (17, "ADM", "admitter"),
        ] {
            participant.extend(segment.repetitions(field).filter_map(|r| {
                practitioner(r, ctx).map(|individual| EncounterParticipant {
                    type_: vec![CodeableConcept::from_coding(
                        Coding::new(V3_PARTICIPATION_TYPE_SYSTEM, role).with_display(display),
                    )],
                    individual: Some(individual),
                })
            }));
        }

        Ok(Encounter {
            id: None,
            identifier: visit_number(segment, ctx).into_iter().collect(),
            status: status(segment),
            class,
            service_type: segment.value(10).map(CodeableConcept::from_text),
            subject: None,
            participant,
            period: (!period.is_empty()).then_some(period),
            location: location(segment)
                .map(|display| EncounterLocation {
                    location: Reference::display(display),
                })
                .into_iter()
                .collect(),
        })
    }
}

/// `PV1-2` patient class (table 0004) to a v3 ActCode.
fn encounter_class(code: &str) -> Option<Coding> {
    let (act, display) = match code {
        "I" | "R" => ("IMP", "inpatient encounter"),
        "O" => ("AMB", "ambulatory"),
        "E" => ("EMER", "emergency"),
        "P" => ("PRENC", "pre-admission"),
        "B" => ("OBSENC", "observation encounter"),
        _ => return None,
    };
    Some(Coding::new(V3_ACT_CODE_SYSTEM, act).with_display(display))
}

/// Status from `PV1-41` account status, else from the admit and discharge dates.
fn status(segment: &Segment) -> EncounterStatus {
    if let Some(raw) = segment.value(41) {
        let code = raw.trim().to_ascii_lowercase();
        return match code.as_str() {
            "completed" | "discharged" => EncounterStatus::Finished,
            "active" | "admitted" => EncounterStatus::InProgress,
            other => EncounterStatus::from_code(other).unwrap_or_default(),
        };
    }
    if segment.value(45).is_some() {
        EncounterStatus::Finished
    } else if segment.value(44).is_some() {
        EncounterStatus::InProgress
    } else {
        EncounterStatus::Unknown
    }
}

/// `PV1-19` visit number, typed `VN`.
fn visit_number(segment: &Segment, ctx: &MappingContext<'_>) -> Option<Identifier> {
    let repetition = segment.field(19)?.first()?;
    let mut identifier = cx_identifier(repetition, ctx)?;
    if identifier.type_.is_none() {
        identifier.type_ = ctx
            .terminology()
            .table()
            .identifier_type("VN")
            .map(CodeableConcept::from_coding);
    }
    Some(identifier)
}

/// `PV1-3` assigned location (`PL`): facility, point of care, room and bed joined with `/`.
fn location(segment: &Segment) -> Option<String> {
    let parts: Vec<&str> = [
        segment.component(3, 4),
        segment.component(3, 1),
        segment.component(3, 2),
        segment.component(3, 3),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::test_support::map;

    const HEADER: &str = "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\r";

    fn pv1(fields: &[(usize, &str)]) -> String {
        let mut line = vec![""; 46];
        line[0] = "PV1";
        for &(n, value) in fields {
            line[n] = value;
        }
        format!("{HEADER}{}", line.join("|"))
    }

    #[test]
    fn maps_class_location_participants_and_period() {
        let (result, diagnostics) = map::<Pv1Mapper>(&pv1(&[
            (2, "I"),
            (3, "CARDIO^101^A^CHU"),
            (7, "123^HOUSE^GREGORY^^^DR"),
            (8, "456^WILSON^JAMES"),
            (10, "CAR"),
            (19, "V0001^^^CHU"),
            (44, "20240101083000"),
        ]));
        let encounter = result.expect("encounter");

        let class = encounter.class.expect("class");
        assert_eq!(class.code.as_deref(), Some("IMP"));
        assert_eq!(class.system.as_deref(), Some(V3_ACT_CODE_SYSTEM));
        assert_eq!(
            encounter.location[0].location.display.as_deref(),
            Some("CHU/CARDIO/101/A")
        );
        assert_eq!(encounter.participant.len(), 2);
        assert_eq!(
            encounter.participant[0].type_[0].codes().next(),
            Some("ATND")
        );
        assert_eq!(
            encounter.participant[1]
                .individual
                .as_ref()
                .and_then(|r| r.display.as_deref()),
            Some("JAMES WILSON")
        );
        assert_eq!(
            encounter.service_type.and_then(|s| s.text).as_deref(),
            Some("CAR")
        );
        assert_eq!(
            encounter.identifier[0]
                .type_
                .as_ref()
                .and_then(|t| t.codes().next()),
            Some("VN")
        );
        assert_eq!(encounter.status, EncounterStatus::InProgress);
        let period = encounter.period.expect("period");
        assert_eq!(period.start.as_deref(), Some("2024-01-01T08:30:00+00:00"));
        assert_eq!(period.end, None);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn account_status_is_normalised() {
        for (raw, expected) in [
            ("discharged", EncounterStatus::Finished),
            ("COMPLETED", EncounterStatus::Finished),
            ("admitted", EncounterStatus::InProgress),
            ("cancelled", EncounterStatus::Cancelled),
            ("whatever", EncounterStatus::Unknown),
        ] {
            let (result, _) = map::<Pv1Mapper>(&pv1(&[(41, raw)]));
            assert_eq!(result.expect("encounter").status, expected, "{raw}");
        }
    }

    #[test]
    fn status_follows_dates_without_account_status() {
        let (result, _) = map::<Pv1Mapper>(&pv1(&[(44, "20240101"), (45, "20240105")]));
        assert_eq!(result.expect("encounter").status, EncounterStatus::Finished);

        let (result, _) = map::<Pv1Mapper>(&pv1(&[(2, "O")]));
        let encounter = result.expect("encounter");
        assert_eq!(encounter.status, EncounterStatus::Unknown);
        assert!(encounter.period.is_none());
    }

    #[test]
    fn unknown_class_warns_and_is_left_unset() {
        let (result, diagnostics) = map::<Pv1Mapper>(&pv1(&[(2, "Z")]));
        assert!(result.expect("encounter").class.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("'Z'"));
    }
}
