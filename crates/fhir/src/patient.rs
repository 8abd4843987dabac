//! FHIR R4 `Patient` wire model.
//!
//! Demographics and identification of the person a message is about. The conversion fills it
//! from a `PID` segment; every other clinical resource in the Bundle references it.

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};

use crate::datatypes::{Address, ContactPoint, Extension, HumanName, Identifier, NameUse};

/// Administrative gender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeGender {
    Male,
    Female,
    Other,
    Unknown,
}

/// Patient resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub telecom: Vec<ContactPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<AdministrativeGender>,

    /// FHIR `date` (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_boolean: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_date_time: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
}

impl Patient {
    /// The first name with the given use, if any.
    pub fn name_with_use(&self, use_: NameUse) -> Option<&HumanName> {
        self.name.iter().find(|n| n.use_ == Some(use_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_r4_json_names() {
        let patient = Patient {
            name: vec![HumanName {
                use_: Some(NameUse::Official),
                family: Some("Williams".into()),
                given: vec!["Sarah".into(), "Jane".into()],
                ..HumanName::default()
            }],
            gender: Some(AdministrativeGender::Female),
            birth_date: Some("1992-03-20".into()),
            deceased_boolean: Some(false),
            ..Patient::default()
        };

        let value = serde_json::to_value(&patient).expect("serialise patient");
        assert_eq!(
            value,
            json!({
                "name": [{"use": "official", "family": "Williams", "given": ["Sarah", "Jane"]}],
                "gender": "female",
                "birthDate": "1992-03-20",
                "deceasedBoolean": false
            })
        );
    }

    #[test]
    fn rejects_wrong_types() {
        let input = json!({"name": [{"family": "Williams", "given": "not_an_array"}]});
        assert!(serde_json::from_value::<Patient>(input).is_err());
    }

    #[test]
    fn finds_names_by_use() {
        let patient = Patient {
            name: vec![
                HumanName {
                    use_: Some(NameUse::Official),
                    family: Some("SECLET".into()),
                    ..HumanName::default()
                },
                HumanName {
                    use_: Some(NameUse::Maiden),
                    family: Some("DURAND".into()),
                    ..HumanName::default()
                },
            ],
            ..Patient::default()
        };

        let maiden = patient.name_with_use(NameUse::Maiden).expect("maiden name");
        assert_eq!(maiden.family.as_deref(), Some("DURAND"));
        assert!(patient.name_with_use(NameUse::Nickname).is_none());
    }
}
