//! FHIR R4 wire support for the HL7 v2 conversion engine.
//!
//! This crate provides the **wire models** a conversion produces and the JSON helpers around
//! them:
//! - datatypes (`Coding`, `CodeableConcept`, `Identifier`, `HumanName`, ...)
//! - the resources HL7 v2 segments map to (`MessageHeader`, `Patient`, `Encounter`,
//!   `RelatedPerson`, `ServiceRequest`, `Observation`, `Specimen`)
//! - the transaction [`Bundle`] that carries them, with path-aware parsing
//!
//! Resources refer to each other only by identity ([`Reference::to`]), never by pointer, so
//! every resource stays independently serialisable. Absent attributes are simply not emitted.
//!
//! This crate knows nothing about HL7 v2; translation lives in `fhirhub-core`.

pub mod bundle;
pub mod datatypes;
pub mod encounter;
pub mod message_header;
pub mod observation;
pub mod patient;
pub mod related_person;
pub mod resource;
pub mod service_request;
pub mod specimen;

pub use bundle::{Bundle, BundleEntry, BundleRequest, BundleType, HttpVerb};
pub use datatypes::{
    Address, AddressUse, CodeableConcept, Coding, ContactPoint, ContactPointSystem,
    ContactPointUse, Extension, HumanName, Identifier, NameUse, Period, Quantity, QuantityComparator,
    Reference,
};
pub use encounter::{Encounter, EncounterLocation, EncounterParticipant, EncounterStatus};
pub use message_header::{MessageDestination, MessageHeader, MessageSource};
pub use observation::{Observation, ObservationReferenceRange, ObservationStatus, ObservationValue};
pub use patient::{AdministrativeGender, Patient};
pub use related_person::RelatedPerson;
pub use resource::{Resource, ResourceType};
pub use service_request::{RequestIntent, ServiceRequest, ServiceRequestStatus};
pub use specimen::{Specimen, SpecimenCollection};

// Re-export ResourceId from fhirhub_uuid crate
pub use fhirhub_uuid::ResourceId;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid UUID: {0}")]
    InvalidUuid(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
