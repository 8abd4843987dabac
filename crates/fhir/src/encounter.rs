//! FHIR R4 `Encounter` wire model.

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};

use crate::datatypes::{CodeableConcept, Coding, Identifier, Period, Reference};

/// Encounter status, as constrained by the R4 value set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatus {
    Planned,
    Arrived,
    Triaged,
    InProgress,
    Onleave,
    Finished,
    Cancelled,
    EnteredInError,
    #[default]
    Unknown,
}

impl EncounterStatus {
    /// Parses an R4 status code (`in-progress`, `finished`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "planned" => Some(Self::Planned),
            "arrived" => Some(Self::Arrived),
            "triaged" => Some(Self::Triaged),
            "in-progress" => Some(Self::InProgress),
            "onleave" => Some(Self::Onleave),
            "finished" => Some(Self::Finished),
            "cancelled" => Some(Self::Cancelled),
            "entered-in-error" => Some(Self::EnteredInError),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Someone involved in the encounter, with their role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncounterParticipant {
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub type_: Vec<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual: Option<Reference>,
}

/// A location the patient visited during the encounter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncounterLocation {
    pub location: Reference,
}

/// Encounter resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    pub status: EncounterStatus,

    /// `v3-ActCode` class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participant: Vec<EncounterParticipant>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<EncounterLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_uses_r4_codes() {
        let value = serde_json::to_value(EncounterStatus::InProgress).expect("serialise");
        assert_eq!(value, json!("in-progress"));
        assert_eq!(EncounterStatus::from_code("in-progress"), Some(EncounterStatus::InProgress));
        assert_eq!(EncounterStatus::from_code("discharged"), None);
    }

    #[test]
    fn status_is_always_serialised() {
        let value = serde_json::to_value(Encounter::default()).expect("serialise");
        assert_eq!(value, json!({"status": "unknown"}));
    }
}
