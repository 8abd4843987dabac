//! `OBX` → `Observation`.
//!
//! The value type in `OBX-2` decides which `value[x]` the `OBX-5` content lands in. A value that
//! cannot be represented faithfully skips the whole segment rather than emitting a partial
//! result.

use super::common::{coded_element, coded_field};
use super::{MappingContext, SegmentMapper};
use crate::constants::{UCUM_SYSTEM, V3_INTERPRETATION_SYSTEM};
use crate::{MappingError, MappingResult};
use fhir::{
    CodeableConcept, Coding, Observation, ObservationReferenceRange, ObservationStatus,
    ObservationValue, Quantity, QuantityComparator,
};
use hl7::{Hl7Timestamp, Repetition, Segment, SegmentTag};

pub struct ObxMapper;

impl SegmentMapper for ObxMapper {
    const TAG: SegmentTag = SegmentTag::OBX;
    type Output = Observation;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<Observation> {
        let code = coded_field(segment, 3, "OBX-3", ctx).ok_or(MappingError::MissingField("OBX-3"))?;
        let unit = Unit::from_segment(segment, ctx);
        let value = value(segment, &unit, ctx)?;

        let mut observation = Observation {
            code,
            status: segment.value(11).map(status).unwrap_or_default(),
            effective_date_time: ctx.date_time("OBX-14", segment.value(14)),
            interpretation: segment
                .repetitions(8)
                .filter_map(|r| r.value(1))
                .map(|code| CodeableConcept::from_coding(Coding::new(V3_INTERPRETATION_SYSTEM, code)))
                .collect(),
            reference_range: segment
                .value(7)
                .map(|raw| reference_range(raw, &unit))
                .into_iter()
                .collect(),
            ..Observation::default()
        };
        if let Some(value) = value {
            observation.set_value(value);
        }
        Ok(observation)
    }
}

/// `OBX-11` observation result status (table 0085).
fn status(code: &str) -> ObservationStatus {
    match code {
        "F" => ObservationStatus::Final,
        "P" | "R" | "S" => ObservationStatus::Preliminary,
        "C" => ObservationStatus::Corrected,
        "D" | "W" => ObservationStatus::EnteredInError,
        "X" => ObservationStatus::Cancelled,
        "I" => ObservationStatus::Registered,
        _ => ObservationStatus::Unknown,
    }
}

/// `OBX-6` units, copied into every quantity the segment produces.
#[derive(Clone, Debug, Default)]
struct Unit {
    unit: Option<String>,
    system: Option<String>,
    code: Option<String>,
}

impl Unit {
    fn from_segment(segment: &Segment, ctx: &MappingContext<'_>) -> Self {
        let Some(repetition) = segment.field(6).and_then(|f| f.first()) else {
            return Self::default();
        };
        let code = repetition.value(1);
        let system = match repetition.value(3) {
            Some(token) => ctx.system_uri(Some(token)),
            None => code.map(|_| UCUM_SYSTEM.to_owned()),
        };
        Self {
            unit: repetition.value(2).or(code).map(str::to_owned),
            system: code.and(system),
            code: code.map(str::to_owned),
        }
    }

    fn quantity(&self, value: serde_json::Number) -> Quantity {
        Quantity {
            value: Some(value),
            comparator: None,
            unit: self.unit.clone(),
            system: self.system.clone(),
            code: self.code.clone(),
        }
    }
}

/// Parses an HL7 `NM` value into a JSON number, keeping integers integral.
///
/// Accepts an optional sign, digits, and one decimal point (`+5`, `.5`, `5.`, `-0.25`).
fn number(raw: &str) -> Option<serde_json::Number> {
    let raw = raw.trim();
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !digits_only(int) || !digits_only(frac) {
        return None;
    }

    let negative = raw.starts_with('-');
    let int = if int.is_empty() { "0" } else { int };
    let text = match (negative, frac.is_empty()) {
        (false, true) => int.to_owned(),
        (false, false) => format!("{int}.{frac}"),
        (true, true) => format!("-{int}"),
        (true, false) => format!("-{int}.{frac}"),
    };
    text.parse().ok()
}

fn value(
    segment: &Segment,
    unit: &Unit,
    ctx: &mut MappingContext<'_>,
) -> MappingResult<Option<ObservationValue>> {
    let repetitions: Vec<&Repetition> = segment.repetitions(5).collect();
    let Some(first) = repetitions.first().copied() else {
        return Ok(None);
    };
    let value_type = segment
        .value(2)
        .ok_or(MappingError::MissingField("OBX-2"))?;

    let value = match value_type {
        "NM" => {
            let raw = first.value(1).unwrap_or_default();
            let number = number(raw).ok_or_else(|| MappingError::InvalidValue {
                field: "OBX-5",
                reason: format!("'{raw}' is not numeric"),
            })?;
            ObservationValue::Quantity(unit.quantity(number))
        }
        "SN" => structured_numeric(first, unit)?,
        "ST" | "TX" | "FT" => {
            // Text is not structured: put back any delimiters the sender left unescaped.
            let component = ctx.encoding().component.to_string();
            let subcomponent = ctx.encoding().subcomponent.to_string();
            let lines: Vec<String> = repetitions
                .iter()
                .map(|r| {
                    r.components()
                        .iter()
                        .map(|c| c.subcomponents().join(&subcomponent))
                        .collect::<Vec<_>>()
                        .join(&component)
                })
                .collect();
            ObservationValue::String(lines.join("\n"))
        }
        "CE" | "CWE" | "CNE" => {
            let concept = coded_element(first, ctx).ok_or_else(|| MappingError::InvalidValue {
                field: "OBX-5",
                reason: "coded value has neither code nor text".into(),
            })?;
            ctx.check_codes("OBX-5", &concept);
            ObservationValue::CodeableConcept(concept)
        }
        "DT" | "TS" | "DTM" => {
            let raw = first.value(1).unwrap_or_default();
            let timestamp = Hl7Timestamp::parse(raw).map_err(|err| MappingError::InvalidValue {
                field: "OBX-5",
                reason: err.to_string(),
            })?;
            ObservationValue::DateTime(timestamp.to_fhir_datetime(ctx.options().default_offset))
        }
        "TM" => {
            let raw = first.value(1).unwrap_or_default();
            let time = hl7::datetime::fhir_time(raw).map_err(|err| MappingError::InvalidValue {
                field: "OBX-5",
                reason: err.to_string(),
            })?;
            ObservationValue::Time(time)
        }
        other => return Err(MappingError::UnsupportedValueType(other.to_owned())),
    };
    Ok(Some(value))
}

/// `SN`: comparator, first number, separator or suffix, second number.
///
/// A plain or compared number becomes a quantity; ranges and ratios (`1-5`, `1:128`) have no
/// quantity form and are kept as text.
fn structured_numeric(repetition: &Repetition, unit: &Unit) -> MappingResult<ObservationValue> {
    let comparator = repetition.value(1);
    let first = repetition.value(2).unwrap_or_default();
    let separator = repetition.value(3);
    let second = repetition.value(4);

    if let (Some(separator), Some(second)) = (separator, second) {
        let text = format!("{}{first}{separator}{second}", comparator.unwrap_or_default());
        return Ok(ObservationValue::String(text));
    }

    let value = number(first).ok_or_else(|| MappingError::InvalidValue {
        field: "OBX-5",
        reason: format!("'{first}' is not numeric"),
    })?;
    let mut quantity = unit.quantity(value);
    quantity.comparator = comparator.and_then(QuantityComparator::parse);
    Ok(ObservationValue::Quantity(quantity))
}

/// `OBX-7`: `low-high`, `>low`, `<high`, anything else as text.
fn reference_range(raw: &str, unit: &Unit) -> ObservationReferenceRange {
    let raw = raw.trim();
    let bounds = if let Some(low) = raw.strip_prefix('>') {
        number(low.trim_start_matches('=')).map(|low| (Some(low), None))
    } else if let Some(high) = raw.strip_prefix('<') {
        number(high.trim_start_matches('=')).map(|high| (None, Some(high)))
    } else {
        // Skip a leading sign so "-5-5" splits at the second dash.
        raw.char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .and_then(|(at, _)| Some((number(&raw[..at])?, number(&raw[at + 1..])?)))
            .map(|(low, high)| (Some(low), Some(high)))
    };

    match bounds {
        Some((low, high)) => ObservationReferenceRange {
            low: low.map(|v| unit.quantity(v)),
            high: high.map(|v| unit.quantity(v)),
            text: None,
        },
        None => ObservationReferenceRange {
            low: None,
            high: None,
            text: Some(raw.to_owned()),
        },
    }
}
