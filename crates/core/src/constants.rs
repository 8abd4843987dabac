//! Constants used throughout the conversion core.
//!
//! Terminology system URIs the mappers emit directly (HL7-defined tables that never come from
//! the configurable code-system table) and the environment variable names read at startup.

/// HL7 v2 table 0003, event type.
pub const V2_EVENT_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0003";

/// HL7 v2 table 0076, message type.
pub const V2_MESSAGE_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0076";

/// HL7 v2 table 0063, relationship.
pub const V2_RELATIONSHIP_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0063";

/// HL7 v3 ActCode, used for `Encounter.class`.
pub const V3_ACT_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";

/// HL7 v3 ParticipationType, used for encounter participants.
pub const V3_PARTICIPATION_TYPE_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ParticipationType";

/// HL7 v3 ObservationInterpretation.
pub const V3_INTERPRETATION_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation";

/// Unified Code for Units of Measure.
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// Core extension carrying the mother's maiden name on a Patient.
pub const MOTHERS_MAIDEN_NAME_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/patient-mothersMaidenName";

/// Path to a FHIR CodeSystem search Bundle used for offline code validation.
pub const TERMINOLOGY_SNAPSHOT_ENV: &str = "FHIRHUB_TERMINOLOGY_SNAPSHOT";

/// Bound on a single terminology lookup, in milliseconds.
pub const LOOKUP_TIMEOUT_ENV: &str = "FHIRHUB_LOOKUP_TIMEOUT_MS";

/// UTC offset applied to HL7 timestamps that carry a time but no zone.
pub const DEFAULT_UTC_OFFSET_ENV: &str = "FHIRHUB_DEFAULT_UTC_OFFSET";
