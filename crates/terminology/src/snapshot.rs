//! Offline terminology backend built from a FHIR `CodeSystem` search Bundle.
//!
//! Terminology servers answer `GET /CodeSystem` with a `searchset` Bundle whose entries hold
//! `CodeSystem` resources; saving that response gives a snapshot this backend can validate
//! against without network access. Nested concepts (hierarchical code systems) are flattened.

use crate::resolver::TerminologyBackend;
use crate::{TerminologyError, TerminologyResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Deserialize)]
struct SearchBundleWire {
    #[serde(default)]
    entry: Vec<EntryWire>,
}

#[derive(Deserialize)]
struct EntryWire {
    resource: Option<CodeSystemWire>,
}

#[derive(Deserialize)]
struct CodeSystemWire {
    #[serde(rename = "resourceType")]
    resource_type: String,
    url: Option<String>,
    #[serde(default)]
    concept: Vec<ConceptWire>,
}

#[derive(Deserialize)]
struct ConceptWire {
    code: Option<String>,
    #[serde(default)]
    concept: Vec<ConceptWire>,
}

fn collect_codes(concepts: Vec<ConceptWire>, codes: &mut HashSet<String>) {
    for concept in concepts {
        if let Some(code) = concept.code {
            codes.insert(code);
        }
        collect_codes(concept.concept, codes);
    }
}

/// Code validity from a saved CodeSystem snapshot.
#[derive(Clone, Debug, Default)]
pub struct SnapshotBackend {
    systems: HashMap<String, HashSet<String>>,
}

impl SnapshotBackend {
    /// Builds the backend from the JSON text of a CodeSystem search Bundle.
    ///
    /// Entries that are not `CodeSystem` resources, or have no `url`, are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TerminologyError::InvalidJson`] if the text is not a Bundle-shaped document;
    /// the message names the failing path.
    pub fn from_json(json_text: &str) -> TerminologyResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire: SearchBundleWire = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|err| {
                let path = err.path().to_string();
                TerminologyError::InvalidJson(format!("snapshot at {path}: {}", err.into_inner()))
            })?;

        let mut systems: HashMap<String, HashSet<String>> = HashMap::new();
        for resource in wire.entry.into_iter().filter_map(|e| e.resource) {
            if resource.resource_type != "CodeSystem" {
                continue;
            }
            let Some(url) = resource.url else {
                continue;
            };
            collect_codes(resource.concept, systems.entry(url).or_default());
        }

        tracing::debug!(systems = systems.len(), "loaded terminology snapshot");
        Ok(Self { systems })
    }

    /// Reads and parses a snapshot file.
    pub fn from_file(path: &Path) -> TerminologyResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Canonical URLs of the loaded code systems.
    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(String::as_str)
    }

    /// Number of codes loaded for `system`.
    pub fn code_count(&self, system: &str) -> usize {
        self.systems.get(system).map_or(0, HashSet::len)
    }
}

impl TerminologyBackend for SnapshotBackend {
    fn validate_code(&self, system: &str, code: &str) -> TerminologyResult<bool> {
        self.systems
            .get(system)
            .map(|codes| codes.contains(code))
            .ok_or_else(|| TerminologyError::UnknownSystem(system.to_string()))
    }
}
