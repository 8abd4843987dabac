//! FHIR R4 `Observation` wire model (a result, from an `OBX` segment).
//!
//! R4 encodes the polymorphic `value[x]` as one JSON key per type. The struct keeps one
//! optional field per supported type; [`ObservationValue`] is the typed view used to set or
//! read them, so at most one is ever populated through the API.

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};

use crate::datatypes::{CodeableConcept, Identifier, Quantity, Reference};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationStatus {
    Registered,
    Preliminary,
    Final,
    Amended,
    Corrected,
    Cancelled,
    EnteredInError,
    #[default]
    Unknown,
}

/// The typed value of an observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservationValue {
    Quantity(Quantity),
    CodeableConcept(CodeableConcept),
    String(String),
    DateTime(String),
    Time(String),
}

/// A reference range for interpreting a value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservationReferenceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Quantity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Quantity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Observation resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub based_on: Vec<Reference>,

    pub status: ObservationStatus,

    pub code: CodeableConcept,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_codeable_concept: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_date_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_time: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interpretation: Vec<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_range: Vec<ObservationReferenceRange>,
}

impl Observation {
    /// Replaces any existing value.
    pub fn set_value(&mut self, value: ObservationValue) {
        self.value_quantity = None;
        self.value_codeable_concept = None;
        self.value_string = None;
        self.value_date_time = None;
        self.value_time = None;

        match value {
            ObservationValue::Quantity(q) => self.value_quantity = Some(q),
            ObservationValue::CodeableConcept(c) => self.value_codeable_concept = Some(c),
            ObservationValue::String(s) => self.value_string = Some(s),
            ObservationValue::DateTime(d) => self.value_date_time = Some(d),
            ObservationValue::Time(t) => self.value_time = Some(t),
        }
    }

    /// The populated value, if any.
    pub fn value(&self) -> Option<ObservationValue> {
        if let Some(q) = &self.value_quantity {
            return Some(ObservationValue::Quantity(q.clone()));
        }
        if let Some(c) = &self.value_codeable_concept {
            return Some(ObservationValue::CodeableConcept(c.clone()));
        }
        if let Some(s) = &self.value_string {
            return Some(ObservationValue::String(s.clone()));
        }
        if let Some(d) = &self.value_date_time {
            return Some(ObservationValue::DateTime(d.clone()));
        }
        self.value_time.clone().map(ObservationValue::Time)
    }
}
