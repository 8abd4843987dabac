//! The resource union carried by Bundle entries.

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    Encounter, MessageHeader, Observation, Patient, RelatedPerson, ServiceRequest, Specimen,
};

/// Resource types this crate models.
///
/// The declaration order is the Bundle entry order a conversion produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    MessageHeader,
    Patient,
    Encounter,
    RelatedPerson,
    ServiceRequest,
    Observation,
    Specimen,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::MessageHeader,
        ResourceType::Patient,
        ResourceType::Encounter,
        ResourceType::RelatedPerson,
        ResourceType::ServiceRequest,
        ResourceType::Observation,
        ResourceType::Specimen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::MessageHeader => "MessageHeader",
            ResourceType::Patient => "Patient",
            ResourceType::Encounter => "Encounter",
            ResourceType::RelatedPerson => "RelatedPerson",
            ResourceType::ServiceRequest => "ServiceRequest",
            ResourceType::Observation => "Observation",
            ResourceType::Specimen => "Specimen",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any resource a Bundle entry can hold, tagged by `resourceType` on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    MessageHeader(MessageHeader),
    Patient(Patient),
    Encounter(Encounter),
    RelatedPerson(RelatedPerson),
    ServiceRequest(ServiceRequest),
    Observation(Observation),
    Specimen(Specimen),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::MessageHeader(_) => ResourceType::MessageHeader,
            Resource::Patient(_) => ResourceType::Patient,
            Resource::Encounter(_) => ResourceType::Encounter,
            Resource::RelatedPerson(_) => ResourceType::RelatedPerson,
            Resource::ServiceRequest(_) => ResourceType::ServiceRequest,
            Resource::Observation(_) => ResourceType::Observation,
            Resource::Specimen(_) => ResourceType::Specimen,
        }
    }

    pub fn id(&self) -> Option<ResourceId> {
        match self {
            Resource::MessageHeader(r) => r.id,
            Resource::Patient(r) => r.id,
            Resource::Encounter(r) => r.id,
            Resource::RelatedPerson(r) => r.id,
            Resource::ServiceRequest(r) => r.id,
            Resource::Observation(r) => r.id,
            Resource::Specimen(r) => r.id,
        }
    }

    pub fn set_id(&mut self, id: ResourceId) {
        let slot = match self {
            Resource::MessageHeader(r) => &mut r.id,
            Resource::Patient(r) => &mut r.id,
            Resource::Encounter(r) => &mut r.id,
            Resource::RelatedPerson(r) => &mut r.id,
            Resource::ServiceRequest(r) => &mut r.id,
            Resource::Observation(r) => &mut r.id,
            Resource::Specimen(r) => &mut r.id,
        };
        *slot = Some(id);
    }
}

macro_rules! impl_from_resource {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Resource {
                fn from(resource: $variant) -> Self {
                    Resource::$variant(resource)
                }
            }
        )*
    };
}

impl_from_resource!(
    MessageHeader,
    Patient,
    Encounter,
    RelatedPerson,
    ServiceRequest,
    Observation,
    Specimen,
);
