//! `SPM` → `Specimen`.

use super::common::{coded_field, entity_identifier};
use super::{MappingContext, SegmentMapper};
use crate::{MappingError, MappingResult};
use fhir::{Specimen, SpecimenCollection};
use hl7::{Segment, SegmentTag};

pub struct SpmMapper;

impl SegmentMapper for SpmMapper {
    const TAG: SegmentTag = SegmentTag::SPM;
    type Output = Specimen;

    fn map(segment: &Segment, ctx: &mut MappingContext<'_>) -> MappingResult<Specimen> {
        let type_ = coded_field(segment, 4, "SPM-4", ctx).ok_or(MappingError::MissingField("SPM-4"))?;

        // SPM-2 is an EIP: placer and filler EIs, their parts as subcomponents.
        let mut identifier = Vec::new();
        if let Some(repetition) = segment.field(2).and_then(|f| f.first()) {
            for (component, type_key) in [(1, "PLAC"), (2, "FILL")] {
                identifier.extend(entity_identifier(
                    |n| repetition.subcomponent(component, n),
                    type_key,
                    ctx,
                ));
            }
        }

        let collection = SpecimenCollection {
            collected_date_time: ctx.date_time("SPM-17", segment.component(17, 1)),
            body_site: coded_field(segment, 8, "SPM-8", ctx),
        };

        Ok(Specimen {
            id: None,
            identifier,
            type_: Some(type_),
            subject: None,
            received_time: ctx.date_time("SPM-18", segment.value(18)),
            request: Vec::new(),
            collection: (!collection.is_empty()).then_some(collection),
        })
    }
}
