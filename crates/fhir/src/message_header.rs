//! FHIR R4 `MessageHeader` wire model.
//!
//! The first entry of every converted Bundle: which event the source message carried, who
//! sent it, where it was going, and which resource it is about (`focus`).

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};

use crate::datatypes::{Coding, Reference};

/// Where a message was sent from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,

    pub endpoint: String,
}

/// One intended recipient of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDestination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub endpoint: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Reference>,
}

/// MessageHeader resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,

    pub event_coding: Coding,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination: Vec<MessageDestination>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Reference>,

    pub source: MessageSource,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus: Vec<Reference>,
}
