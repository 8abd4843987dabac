//! Composite data types shared by several segments: `CE`/`CWE`, `CX`, `EI`, `XAD`, `XTN`, `XCN`.

use super::MappingContext;
use fhir::{
    Address, AddressUse, CodeableConcept, Coding, ContactPoint, ContactPointSystem,
    ContactPointUse, Identifier, Reference,
};
use hl7::{Repetition, Segment};

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}

/// A coded element: primary coding (components 1-3) and alternate coding (4-6).
///
/// Coding systems are resolved through the code-system table; unknown tokens leave `system`
/// unset. The primary text (component 2) also becomes `text`, falling back to the `CWE.9`
/// original text.
pub(crate) fn coded_element(
    repetition: &Repetition,
    ctx: &MappingContext<'_>,
) -> Option<CodeableConcept> {
    let mut coding = Vec::new();
    for offset in [0, 3] {
        if let Some(code) = repetition.value(1 + offset) {
            coding.push(Coding {
                system: ctx.system_uri(repetition.value(3 + offset)),
                code: Some(code.to_owned()),
                display: owned(repetition.value(2 + offset)),
            });
        }
    }
    let text = owned(repetition.value(2).or_else(|| repetition.value(9)));

    if coding.is_empty() && text.is_none() {
        return None;
    }
    Some(CodeableConcept { coding, text })
}

/// The first coded element of field `n`, checked against the terminology backend.
pub(crate) fn coded_field(
    segment: &Segment,
    n: usize,
    label: &str,
    ctx: &mut MappingContext<'_>,
) -> Option<CodeableConcept> {
    let concept = segment
        .field(n)
        .and_then(|f| f.first())
        .and_then(|r| coded_element(r, ctx))?;
    ctx.check_codes(label, &concept);
    Some(concept)
}

/// An extended composite identifier (`CX`).
///
/// The system comes from the assigning authority namespace (`CX.4.1`), then its universal id
/// (`CX.4.2`), then the identifier type code (`CX.5`). The type coding comes from `CX.5`, or
/// from the namespace when that is a known identifier type (`IPP`, `RPPS`, ...).
pub(crate) fn cx_identifier(repetition: &Repetition, ctx: &MappingContext<'_>) -> Option<Identifier> {
    let value = repetition.value(1)?;
    let namespace = repetition.subcomponent(4, 1);
    let universal_id = repetition.subcomponent(4, 2);
    let type_code = repetition.value(5);

    let system = ctx
        .system_uri(namespace)
        .or_else(|| ctx.system_uri(universal_id))
        .or_else(|| ctx.system_uri(type_code));

    let table = ctx.terminology().table();
    let type_ = type_code
        .and_then(|code| table.identifier_type(code))
        .or_else(|| namespace.and_then(|ns| table.identifier_type(ns)))
        .map(CodeableConcept::from_coding);

    Some(Identifier {
        type_,
        system,
        value: Some(value.to_owned()),
    })
}

/// An entity identifier (`EI`) whose parts sit at `id`, `id + 1` and `id + 2` of `part`.
///
/// `part` reads either components of a repetition (plain `EI` fields) or subcomponents of one
/// component (`EI` nested in `EIP`).
pub(crate) fn entity_identifier<'r>(
    part: impl Fn(usize) -> Option<&'r str>,
    type_key: &str,
    ctx: &MappingContext<'_>,
) -> Option<Identifier> {
    let value = part(1)?;
    let system = ctx.system_uri(part(2)).or_else(|| ctx.system_uri(part(3)));
    let type_ = ctx
        .terminology()
        .table()
        .identifier_type(type_key)
        .map(CodeableConcept::from_coding);

    Some(Identifier {
        type_,
        system,
        value: Some(value.to_owned()),
    })
}

fn address_use(code: &str) -> Option<AddressUse> {
    match code {
        "H" => Some(AddressUse::Home),
        "B" | "O" => Some(AddressUse::Work),
        "C" => Some(AddressUse::Temp),
        _ => None,
    }
}

/// An extended address (`XAD`). `None` when nothing but the type is present.
pub(crate) fn address(repetition: &Repetition) -> Option<Address> {
    let line: Vec<String> = [repetition.value(1), repetition.value(2)]
        .into_iter()
        .flatten()
        .map(str::to_owned)
        .collect();

    let address = Address {
        use_: repetition.value(7).and_then(address_use),
        line,
        city: owned(repetition.value(3)),
        state: owned(repetition.value(4)),
        postal_code: owned(repetition.value(5)),
        country: owned(repetition.value(6)),
    };
    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

/// Every address of field `n`.
pub(crate) fn addresses(segment: &Segment, n: usize) -> Vec<Address> {
    segment.repetitions(n).filter_map(address).collect()
}

/// An extended telecommunication number (`XTN`).
///
/// `default_use` applies when `XTN.2` is absent or unknown (home phone vs business phone
/// fields).
pub(crate) fn contact_point(
    repetition: &Repetition,
    default_use: ContactPointUse,
) -> Option<ContactPoint> {
    let equipment = repetition.value(3);
    let (system, value) = match equipment {
        Some("Internet") | Some("X.400") => (ContactPointSystem::Email, repetition.value(4)),
        Some("FX") => (ContactPointSystem::Fax, phone_number(repetition)),
        Some("BP") => (ContactPointSystem::Pager, phone_number(repetition)),
        _ => (ContactPointSystem::Phone, phone_number(repetition)),
    };
    let value = value?;

    let use_ = match (repetition.value(2), equipment) {
        (_, Some("CP")) => ContactPointUse::Mobile,
        (Some("PRN"), _) => ContactPointUse::Home,
        (Some("WPN"), _) => ContactPointUse::Work,
        _ => default_use,
    };

    Some(ContactPoint {
        system: Some(system),
        value: Some(value.to_owned()),
        use_: Some(use_),
    })
}

/// `XTN.1` (deprecated free-text number), else the unformatted `XTN.12`.
fn phone_number(repetition: &Repetition) -> Option<&str> {
    repetition.value(1).or_else(|| repetition.value(12))
}

/// Contact points from a home-phone field and a business-phone field.
pub(crate) fn telecom(segment: &Segment, home: usize, business: usize) -> Vec<ContactPoint> {
    segment
        .repetitions(home)
        .filter_map(|r| contact_point(r, ContactPointUse::Home))
        .chain(
            segment
                .repetitions(business)
                .filter_map(|r| contact_point(r, ContactPointUse::Work)),
        )
        .collect()
}

/// A person named by an extended composite id and name (`XCN`), as a display reference.
///
/// The display is "prefix given family"; the id number (`XCN.1`) becomes the reference
/// identifier, with its system from the assigning authority (`XCN.9`).
pub(crate) fn practitioner(repetition: &Repetition, ctx: &MappingContext<'_>) -> Option<Reference> {
    let display: Vec<&str> = [repetition.value(6), repetition.value(3), repetition.value(2)]
        .into_iter()
        .flatten()
        .collect();
    let identifier = repetition.value(1).map(|id| Identifier {
        type_: None,
        system: ctx.system_uri(repetition.subcomponent(9, 1)),
        value: Some(id.to_owned()),
    });

    if display.is_empty() && identifier.is_none() {
        return None;
    }
    Some(Reference {
        display: (!display.is_empty()).then(|| display.join(" ")),
        identifier,
        ..Reference::default()
    })
}
