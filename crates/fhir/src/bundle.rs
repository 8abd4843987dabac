//! FHIR R4 transaction `Bundle`.
//!
//! Every entry carries a `urn:uuid:` full URL derived from its resource identity and a
//! `POST <resourceType>` request, so a FHIR server can create all resources atomically and
//! rewrite the intra-Bundle references.
//!
//! Responsibilities:
//! - build Bundles entry by entry, keeping insertion order
//! - render them as JSON
//! - parse them back with path-aware schema errors

use fhirhub_uuid::ResourceId;
use serde::{Deserialize, Serialize};

use crate::datatypes::Identifier;
use crate::resource::{Resource, ResourceType};
use crate::{FhirError, FhirResult};

const BUNDLE_RESOURCE_TYPE: &str = "Bundle";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    #[default]
    Transaction,
    Batch,
    Message,
    Collection,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

/// The transaction request for one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleRequest {
    pub method: HttpVerb,
    pub url: String,
}

impl BundleRequest {
    /// `POST <resourceType>`: create the resource.
    pub fn create(resource_type: ResourceType) -> Self {
        Self {
            method: HttpVerb::Post,
            url: resource_type.as_str().to_string(),
        }
    }
}

/// One Bundle entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Resource,
    pub request: BundleRequest,
}

/// Bundle resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Bundle {
    resource_type: String,

    pub id: ResourceId,

    #[serde(rename = "type")]
    pub type_: BundleType,

    /// FHIR `instant` the source message was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// An empty transaction Bundle.
    pub fn transaction(id: ResourceId) -> Self {
        Self {
            resource_type: BUNDLE_RESOURCE_TYPE.to_string(),
            id,
            type_: BundleType::Transaction,
            timestamp: None,
            identifier: None,
            entry: Vec::new(),
        }
    }

    /// Appends `resource` as a create entry.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if the resource has no identity yet.
    pub fn push(&mut self, resource: Resource) -> FhirResult<()> {
        let id = resource.id().ok_or_else(|| {
            FhirError::InvalidInput(format!(
                "{} has no id and cannot be added to a Bundle",
                resource.resource_type()
            ))
        })?;

        self.entry.push(BundleEntry {
            full_url: id.urn(),
            request: BundleRequest::create(resource.resource_type()),
            resource,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    /// Resources in entry order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entry.iter().map(|e| &e.resource)
    }

    /// Number of entries holding a resource of `resource_type`.
    pub fn count(&self, resource_type: ResourceType) -> usize {
        self.resources()
            .filter(|r| r.resource_type() == resource_type)
            .count()
    }

    /// The resource a `urn:uuid:` full URL points to.
    pub fn resolve(&self, full_url: &str) -> Option<&Resource> {
        self.entry
            .iter()
            .find(|e| e.full_url == full_url)
            .map(|e| &e.resource)
    }

    /// Parse a Bundle from JSON text.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort "path" (e.g.
    /// `entry.0.resource.status`) to the failing field when the JSON does not match the wire
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the JSON does not represent a Bundle of the supported resources,
    /// - `resourceType` is not `Bundle`,
    /// - an entry's `fullUrl` is not the `urn:uuid:` form of its resource id.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let bundle: Bundle = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "Bundle schema mismatch at {path}: {source}"
                )));
            }
        };

        if bundle.resource_type != BUNDLE_RESOURCE_TYPE {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                bundle.resource_type
            )));
        }

        for (index, entry) in bundle.entry.iter().enumerate() {
            let full_url = ResourceId::from_urn(&entry.full_url)
                .map_err(|e| FhirError::InvalidUuid(format!("entry {index}: {e}")))?;
            if entry.resource.id() != Some(full_url) {
                return Err(FhirError::InvalidInput(format!(
                    "entry {index}: fullUrl {} does not match the resource id",
                    entry.full_url
                )));
            }
        }

        Ok(bundle)
    }

    /// Render as compact JSON.
    pub fn to_json(&self) -> FhirResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render as indented JSON.
    pub fn to_json_pretty(&self) -> FhirResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Patient, Reference, Specimen};
    use serde_json::json;

    fn sample() -> Bundle {
        let mut bundle = Bundle::transaction(ResourceId::new());
        let patient_id = ResourceId::new();
        let mut patient = Resource::from(Patient::default());
        patient.set_id(patient_id);
        bundle.push(patient).expect("patient has an id");

        let mut specimen = Resource::from(Specimen {
            subject: Some(Reference::to(ResourceType::Patient, patient_id)),
            ..Specimen::default()
        });
        specimen.set_id(ResourceId::new());
        bundle.push(specimen).expect("specimen has an id");
        bundle
    }

    #[test]
    fn entries_are_transaction_creates() {
        let bundle = sample();
        let value = serde_json::to_value(&bundle).expect("serialise");

        assert_eq!(value["resourceType"], json!("Bundle"));
        assert_eq!(value["type"], json!("transaction"));
        let entries = value["entry"].as_array().expect("entries");
        assert_eq!(entries.len(), 2);
        for entry in entries {
            let full_url = entry["fullUrl"].as_str().expect("fullUrl");
            let id = entry["resource"]["id"].as_str().expect("id");
            assert_eq!(full_url, format!("urn:uuid:{id}"));
            assert_eq!(entry["request"]["method"], json!("POST"));
            assert_eq!(entry["request"]["url"], entry["resource"]["resourceType"]);
        }
    }

    #[test]
    fn references_resolve_inside_the_bundle() {
        let bundle = sample();
        let Some(Resource::Specimen(specimen)) = bundle.resources().nth(1) else {
            panic!("second entry should be the specimen");
        };
        let subject = specimen.subject.as_ref().and_then(|s| s.reference.as_deref());
        let target = bundle.resolve(subject.expect("subject reference"));
        assert_eq!(target.map(Resource::resource_type), Some(ResourceType::Patient));
    }

    #[test]
    fn round_trips_json() {
        let bundle = sample();
        let json = bundle.to_json_pretty().expect("render");
        let reparsed = Bundle::parse(&json).expect("reparse");
        assert_eq!(bundle, reparsed);
        assert_eq!(reparsed.count(ResourceType::Patient), 1);
    }

    #[test]
    fn push_requires_an_identity() {
        let mut bundle = Bundle::transaction(ResourceId::new());
        let err = bundle
            .push(Resource::from(Patient::default()))
            .expect_err("no id");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("Patient")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn parse_reports_the_failing_path() {
        let mut value = serde_json::to_value(sample()).expect("serialise");
        value["entry"][1]["resource"]["receivedTime"] = json!(42);

        let err = Bundle::parse(&value.to_string()).expect_err("wrong type");
        match err {
            FhirError::Translation(msg) => assert!(msg.contains("entry"), "{msg}"),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_other_resource_types() {
        let mut value = serde_json::to_value(sample()).expect("serialise");
        value["resourceType"] = json!("Parameters");

        match Bundle::parse(&value.to_string()).expect_err("not a bundle") {
            FhirError::InvalidInput(msg) => assert!(msg.contains("Parameters")),
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_mismatched_full_url() {
        let mut value = serde_json::to_value(sample()).expect("serialise");
        value["entry"][0]["fullUrl"] = json!(ResourceId::new().urn());

        assert!(matches!(
            Bundle::parse(&value.to_string()),
            Err(FhirError::InvalidInput(_))
        ));
    }
}
