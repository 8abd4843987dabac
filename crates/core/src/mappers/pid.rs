//! `PID` → `Patient`.

use super::common::{addresses, cx_identifier, telecom};
use super::{MappingContext, SegmentMapper};
use crate::constants::MOTHERS_MAIDEN_NAME_URL;
use crate::name::resolve_names;
use crate::{MappingError, MappingResult};
use fhir::{AdministrativeGender, Extension, Patient};
use hl7::{Segment, SegmentTag};

pub struct PidMapper;

impl SegmentMapper for PidMapper {
    const TAG: SegmentTag = SegmentTag::PID;
    type Output = Patient;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<Patient> {
        let identifier: Vec<_> = segment
            .repetitions(3)
            .filter_map(|r| cx_identifier(r, ctx))
            .collect();
        let name: Vec<_> = resolve_names(segment.field(5))
            .iter()
            .map(|n| n.to_human_name())
            .collect();

        if identifier.is_empty() && name.is_empty() {
            return Err(MappingError::MissingField("PID-3/PID-5"));
        }

        let mut patient = Patient {
            identifier,
            name,
            extension: segment
                .component(6, 1)
                .map(|maiden| Extension::string(MOTHERS_MAIDEN_NAME_URL, maiden))
                .into_iter()
                .collect(),
            birth_date: ctx.date("PID-7", segment.value(7)),
            gender: segment.value(8).map(gender),
            address: addresses(segment, 11),
            telecom: telecom(segment, 13, 14),
            ..Patient::default()
        };

        // deceased[x] is a choice: the date wins over the indicator.
        match ctx.date_time("PID-29", segment.value(29)) {
            Some(date_time) => patient.deceased_date_time = Some(date_time),
            None => {
                patient.deceased_boolean = match segment.value(30) {
                    Some("Y") => Some(true),
                    Some("N") => Some(false),
                    _ => None,
                }
            }
        }

        Ok(patient)
    }
}

/// `PID-8` administrative sex (table 0001).
fn gender(code: &str) -> AdministrativeGender {
    match code {
        "M" => AdministrativeGender::Male,
        "F" => AdministrativeGender::Female,
        "O" => AdministrativeGender::Other,
        _ => AdministrativeGender::Unknown,
    }
}
