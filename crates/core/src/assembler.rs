//! Bundle assembly.
//!
//! Mappers produce resources without identity. The assembler gives each one a fresh identity,
//! wires the references between them, and emits a transaction Bundle in a fixed entry order:
//! MessageHeader, Patient, Encounter, RelatedPerson*, ServiceRequest*, Observation*, Specimen*.

use crate::mappers::BundleMetadata;
use crate::{ConversionError, ConversionResult, Stage};
use fhir::{
    Bundle, Encounter, MessageHeader, Observation, Patient, Reference, RelatedPerson, Resource,
    ResourceId, ResourceType, ServiceRequest, Specimen,
};
use fhirhub_uuid::IdSource;
use std::collections::HashSet;

/// A mapped resource with the message position of the segment it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Positioned<T> {
    pub position: usize,
    pub resource: T,
}

impl<T> Positioned<T> {
    pub fn new(position: usize, resource: T) -> Self {
        Self { position, resource }
    }
}

/// Everything the mappers produced for one message, in message order within each type.
#[derive(Clone, Debug, Default)]
pub struct MappedResources {
    pub header: Option<MessageHeader>,
    pub metadata: BundleMetadata,
    pub patient: Option<Patient>,
    pub encounter: Option<Encounter>,
    pub related_persons: Vec<RelatedPerson>,
    pub orders: Vec<Positioned<ServiceRequest>>,
    pub observations: Vec<Positioned<Observation>>,
    pub specimens: Vec<Positioned<Specimen>>,
}

impl MappedResources {
    /// Whether anything besides the header and the patient was mapped.
    pub fn has_clinical_resources(&self) -> bool {
        self.encounter.is_some()
            || !self.related_persons.is_empty()
            || !self.orders.is_empty()
            || !self.observations.is_empty()
            || !self.specimens.is_empty()
    }
}

/// Hands out identities and refuses to hand out the same one twice.
struct Identities<'a> {
    source: &'a dyn IdSource,
    issued: HashSet<ResourceId>,
}

impl<'a> Identities<'a> {
    fn new(source: &'a dyn IdSource) -> Self {
        Self {
            source,
            issued: HashSet::new(),
        }
    }

    fn next(&mut self, label: &str) -> ConversionResult<ResourceId> {
        let id = self.source.next_id();
        if !self.issued.insert(id) {
            return Err(ConversionError::internal(
                Stage::Assembling,
                label,
                format!("identity {id} was allocated twice"),
            ));
        }
        Ok(id)
    }
}

/// The order reference for a segment at `position`: the nearest OBR before it.
fn preceding_order(orders: &[(usize, Reference)], position: usize) -> Option<Reference> {
    orders
        .iter()
        .rev()
        .find(|(at, _)| *at < position)
        .map(|(_, reference)| reference.clone())
}

pub struct BundleAssembler<'a> {
    ids: &'a dyn IdSource,
}

impl<'a> BundleAssembler<'a> {
    pub fn new(ids: &'a dyn IdSource) -> Self {
        Self { ids }
    }

    /// Builds the transaction Bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::InternalMappingError`] at [`Stage::Assembling`] when there is
    /// no header, when clinical resources have no Patient to refer to, or when the identity
    /// source repeats itself.
    pub fn assemble(&self, mapped: MappedResources) -> ConversionResult<Bundle> {
        if mapped.patient.is_none() && mapped.has_clinical_resources() {
            return Err(ConversionError::internal(
                Stage::Assembling,
                "PID",
                "clinical resources have no Patient to refer to",
            ));
        }

        let MappedResources {
            header,
            metadata,
            patient,
            encounter,
            related_persons,
            orders,
            observations,
            specimens,
        } = mapped;
        let mut header = header.ok_or_else(|| {
            ConversionError::internal(Stage::Assembling, "MSH", "no MessageHeader was mapped")
        })?;

        let mut ids = Identities::new(self.ids);
        let mut bundle = Bundle::transaction(ids.next("Bundle")?);
        bundle.timestamp = metadata.timestamp;
        bundle.identifier = metadata.identifier;

        let mut resources: Vec<Resource> = Vec::new();
        header.id = Some(ids.next("MessageHeader")?);

        let subject = match patient {
            Some(mut patient) => {
                let id = ids.next("Patient")?;
                patient.id = Some(id);
                let reference = Reference::to(ResourceType::Patient, id);
                header.focus.push(reference.clone());
                resources.push(header.into());
                resources.push(patient.into());
                Some(reference)
            }
            None => {
                resources.push(header.into());
                None
            }
        };

        if let Some(mut encounter) = encounter {
            encounter.id = Some(ids.next("Encounter")?);
            encounter.subject = subject.clone();
            resources.push(encounter.into());
        }

        for mut person in related_persons {
            person.id = Some(ids.next("RelatedPerson")?);
            person.patient = subject.clone();
            resources.push(person.into());
        }

        let mut order_refs: Vec<(usize, Reference)> = Vec::with_capacity(orders.len());
        for Positioned {
            position,
            resource: mut order,
        } in orders
        {
            let id = ids.next("ServiceRequest")?;
            order.id = Some(id);
            order.subject = subject.clone();
            order_refs.push((position, Reference::to(ResourceType::ServiceRequest, id)));
            resources.push(order.into());
        }

        for Positioned {
            position,
            resource: mut observation,
        } in observations
        {
            observation.id = Some(ids.next("Observation")?);
            observation.subject = subject.clone();
            observation.based_on = preceding_order(&order_refs, position).into_iter().collect();
            resources.push(observation.into());
        }

        for Positioned {
            position,
            resource: mut specimen,
        } in specimens
        {
            specimen.id = Some(ids.next("Specimen")?);
            specimen.subject = subject.clone();
            specimen.request = preceding_order(&order_refs, position).into_iter().collect();
            resources.push(specimen.into());
        }

        for resource in resources {
            let label = resource.resource_type().as_str();
            bundle
                .push(resource)
                .map_err(|err| ConversionError::internal(Stage::Assembling, label, err))?;
        }

        tracing::debug!(entries = bundle.len(), "bundle assembled");
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::{CodeableConcept, Coding, Identifier};
    use fhirhub_uuid::SequentialIds;

    fn header() -> MessageHeader {
        MessageHeader {
            event_coding: Coding::new("http://terminology.hl7.org/CodeSystem/v2-0003", "R01"),
            ..MessageHeader::default()
        }
    }

    fn patient() -> Patient {
        Patient {
            identifier: vec![Identifier::value("123")],
            ..Patient::default()
        }
    }

    fn order(code: &str) -> ServiceRequest {
        ServiceRequest {
            code: Some(CodeableConcept::from_text(code)),
            ..ServiceRequest::default()
        }
    }

    fn observation(code: &str) -> Observation {
        Observation {
            code: CodeableConcept::from_text(code),
            ..Observation::default()
        }
    }

    fn lab_message() -> MappedResources {
        MappedResources {
            header: Some(header()),
            metadata: BundleMetadata {
                timestamp: Some("2024-03-15T14:30:00+01:00".into()),
                identifier: Some(Identifier::value("MSG1")),
            },
            patient: Some(patient()),
            encounter: Some(Encounter::default()),
            related_persons: vec![RelatedPerson::default()],
            orders: vec![
                Positioned::new(3, order("first")),
                Positioned::new(6, order("second")),
            ],
            observations: vec![
                Positioned::new(4, observation("a")),
                Positioned::new(5, observation("b")),
                Positioned::new(7, observation("c")),
            ],
            specimens: vec![Positioned::new(8, Specimen::default())],
        }
    }

    fn types(bundle: &Bundle) -> Vec<ResourceType> {
        bundle.resources().map(Resource::resource_type).collect()
    }

    #[test]
    fn entries_follow_fixed_order() {
        let ids = SequentialIds::default();
        let bundle = BundleAssembler::new(&ids)
            .assemble(lab_message())
            .expect("bundle");

        assert_eq!(
            types(&bundle),
            vec![
                ResourceType::MessageHeader,
                ResourceType::Patient,
                ResourceType::Encounter,
                ResourceType::RelatedPerson,
                ResourceType::ServiceRequest,
                ResourceType::ServiceRequest,
                ResourceType::Observation,
                ResourceType::Observation,
                ResourceType::Observation,
                ResourceType::Specimen,
            ]
        );
        assert_eq!(bundle.timestamp.as_deref(), Some("2024-03-15T14:30:00+01:00"));
        assert_eq!(
            bundle.identifier.as_ref().and_then(|i| i.value.as_deref()),
            Some("MSG1")
        );
    }

    #[test]
    fn every_reference_resolves_inside_the_bundle() {
        let ids = SequentialIds::default();
        let bundle = BundleAssembler::new(&ids)
            .assemble(lab_message())
            .expect("bundle");

        let patient_url = bundle.entry[1].full_url.clone();
        for entry in &bundle.entry {
            let references: Vec<&Reference> = match &entry.resource {
                Resource::MessageHeader(r) => r.focus.iter().collect(),
                Resource::Patient(_) => Vec::new(),
                Resource::Encounter(r) => r.subject.iter().collect(),
                Resource::RelatedPerson(r) => r.patient.iter().collect(),
                Resource::ServiceRequest(r) => r.subject.iter().collect(),
                Resource::Observation(r) => r.subject.iter().chain(&r.based_on).collect(),
                Resource::Specimen(r) => r.subject.iter().chain(&r.request).collect(),
            };
            for reference in references {
                let target = reference.reference.as_deref().expect("literal reference");
                assert!(bundle.resolve(target).is_some(), "dangling {target}");
            }
            if !matches!(entry.resource, Resource::Patient(_)) {
                assert!(
                    serde_json::to_string(&entry.resource)
                        .expect("json")
                        .contains(&patient_url),
                    "{} does not point at the patient",
                    entry.resource.resource_type()
                );
            }
        }
    }

    #[test]
    fn observations_link_to_the_nearest_preceding_order() {
        let ids = SequentialIds::default();
        let bundle = BundleAssembler::new(&ids)
            .assemble(lab_message())
            .expect("bundle");

        let order_urls: Vec<&str> = bundle.entry[4..6]
            .iter()
            .map(|e| e.full_url.as_str())
            .collect();
        let based_on: Vec<Option<String>> = bundle
            .resources()
            .filter_map(|r| match r {
                Resource::Observation(o) => Some(o.based_on.first().and_then(|b| b.reference.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(
            based_on,
            vec![
                Some(order_urls[0].to_string()),
                Some(order_urls[0].to_string()),
                Some(order_urls[1].to_string()),
            ]
        );

        let Resource::Specimen(specimen) = &bundle.entry[9].resource else {
            panic!("expected a specimen last");
        };
        assert_eq!(
            specimen.request[0].reference.as_deref(),
            Some(order_urls[1])
        );
    }

    #[test]
    fn observation_before_any_order_has_no_basis() {
        let ids = SequentialIds::default();
        let mut mapped = lab_message();
        mapped.observations = vec![Positioned::new(2, observation("early"))];
        let bundle = BundleAssembler::new(&ids).assemble(mapped).expect("bundle");

        let observation = bundle
            .resources()
            .find_map(|r| match r {
                Resource::Observation(o) => Some(o),
                _ => None,
            })
            .expect("observation");
        assert!(observation.based_on.is_empty());
    }

    #[test]
    fn header_and_patient_alone_make_two_entries() {
        let ids = SequentialIds::default();
        let bundle = BundleAssembler::new(&ids)
            .assemble(MappedResources {
                header: Some(header()),
                patient: Some(patient()),
                ..MappedResources::default()
            })
            .expect("bundle");
        assert_eq!(bundle.len(), 2);
    }

    struct StuckIds(ResourceId);

    impl IdSource for StuckIds {
        fn next_id(&self) -> ResourceId {
            self.0
        }
    }

    #[test]
    fn repeated_identity_is_an_internal_error() {
        let stuck = StuckIds(ResourceId::new());
        let err = BundleAssembler::new(&stuck)
            .assemble(lab_message())
            .expect_err("duplicate identity");
        assert_eq!(err.stage(), Stage::Assembling);
        assert!(matches!(err, ConversionError::InternalMappingError { .. }));
    }

    #[test]
    fn clinical_resources_need_a_patient() {
        let ids = SequentialIds::default();
        let mut mapped = lab_message();
        mapped.patient = None;
        let err = BundleAssembler::new(&ids)
            .assemble(mapped)
            .expect_err("no patient");
        match err {
            ConversionError::InternalMappingError { stage, segment, .. } => {
                assert_eq!(stage, Stage::Assembling);
                assert_eq!(segment, "PID");
            }
            other => panic!("expected InternalMappingError, got {other:?}"),
        }
    }
}
