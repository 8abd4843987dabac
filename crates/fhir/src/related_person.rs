//! FHIR R4 `RelatedPerson` wire model (next of kin, emergency contacts).

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};

use crate::datatypes::{Address, CodeableConcept, ContactPoint, HumanName, Reference};

/// RelatedPerson resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPerson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,

    /// Set when the resource is assembled into a Bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Reference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationship: Vec<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub telecom: Vec<ContactPoint>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
}
