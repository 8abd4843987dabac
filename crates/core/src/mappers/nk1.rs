//! `NK1` → `RelatedPerson`.

use super::common::{addresses, coded_element, telecom};
use super::{MappingContext, SegmentMapper};
use crate::constants::V2_RELATIONSHIP_SYSTEM;
use crate::name::resolve_names;
use crate::{MappingError, MappingResult};
use fhir::{CodeableConcept, RelatedPerson};
use hl7::{Segment, SegmentTag};

pub struct Nk1Mapper;

impl SegmentMapper for Nk1Mapper {
    const TAG: SegmentTag = SegmentTag::NK1;
    type Output = RelatedPerson;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<RelatedPerson> {
        let name: Vec<_> = resolve_names(segment.field(2))
            .iter()
            .map(|n| n.to_human_name())
            .collect();
        let relationship: Vec<CodeableConcept> = segment
            .field(3)
            .and_then(|f| f.first())
            .and_then(|r| coded_element(r, ctx))
            .map(with_relationship_system)
            .into_iter()
            .collect();

        if name.is_empty() && relationship.is_empty() {
            return Err(MappingError::MissingField("NK1-2/NK1-3"));
        }

        Ok(RelatedPerson {
            id: None,
            patient: None,
            relationship,
            name,
            telecom: telecom(segment, 5, 6),
            address: addresses(segment, 4),
        })
    }
}

/// Relationship codes without a resolvable system are table 0063 codes.
fn with_relationship_system(mut concept: CodeableConcept) -> CodeableConcept {
    if let Some(primary) = concept.coding.first_mut() {
        if primary.system.is_none() {
            primary.system = Some(V2_RELATIONSHIP_SYSTEM.to_owned());
        }
    }
    concept
}
