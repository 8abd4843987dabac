//! The embedded code-system table.
//!
//! Loaded once from `data/code_systems.yaml` and read-only afterwards. Local keys and aliases
//! are matched case-insensitively; OIDs and canonical URIs exactly.

use crate::{TerminologyError, TerminologyResult};
use fhir::Coding;
use fhirhub_types::{NonEmptyText, Oid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

/// The built-in table, as shipped.
pub const BUILTIN_TABLE_YAML: &str = include_str!("../data/code_systems.yaml");

static BUILTIN: LazyLock<Arc<CodeSystemTable>> = LazyLock::new(|| {
    // The embedded table is validated by `builtin_table_loads`.
    Arc::new(
        CodeSystemTable::from_yaml(BUILTIN_TABLE_YAML)
            .expect("embedded code-system table is valid"),
    )
});

/// One code or identifier system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeSystemEntry {
    pub local_key: NonEmptyText,
    pub canonical_uri: NonEmptyText,
    #[serde(default)]
    pub oid: Option<Oid>,
}

/// An identifier-type code (`CX.5`) and the `Identifier.type` coding it maps to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifierTypeEntry {
    pub local_key: NonEmptyText,
    pub system: NonEmptyText,
    pub code: NonEmptyText,
    #[serde(default)]
    pub display: Option<String>,
}

impl IdentifierTypeEntry {
    pub fn to_coding(&self) -> Coding {
        let coding = Coding::new(self.system.as_str(), self.code.as_str());
        match &self.display {
            Some(display) => coding.with_display(display),
            None => coding,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TableWire {
    code_systems: Vec<CodeSystemEntry>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    identifier_types: Vec<IdentifierTypeEntry>,
}

/// Lookup table from local tokens to FHIR coding systems.
#[derive(Clone, Debug)]
pub struct CodeSystemTable {
    entries: Vec<CodeSystemEntry>,
    by_key: HashMap<String, usize>,
    by_oid: HashMap<String, usize>,
    by_uri: HashMap<String, usize>,
    identifier_types: Vec<IdentifierTypeEntry>,
    identifier_types_by_key: HashMap<String, usize>,
}

fn normalise_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

impl CodeSystemTable {
    /// The embedded table shipped with the crate.
    pub fn builtin() -> Arc<CodeSystemTable> {
        Arc::clone(&BUILTIN)
    }

    /// Loads a table from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`TerminologyError::InvalidTable`] if the YAML does not match the table schema
    /// (the message names the failing path, e.g. `code_systems[3].oid`), if a local key, OID
    /// or canonical URI appears twice, or if an alias targets an unknown key.
    pub fn from_yaml(yaml_text: &str) -> TerminologyResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire: TableWire = serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            TerminologyError::InvalidTable(format!(
                "schema mismatch at {path}: {}",
                err.into_inner()
            ))
        })?;

        let mut by_key = HashMap::new();
        let mut by_oid = HashMap::new();
        let mut by_uri = HashMap::new();

        for (index, entry) in wire.code_systems.iter().enumerate() {
            let key = normalise_key(entry.local_key.as_str());
            if by_key.insert(key, index).is_some() {
                return Err(duplicate("local key", entry.local_key.as_str()));
            }
            if by_uri
                .insert(entry.canonical_uri.as_str().to_string(), index)
                .is_some()
            {
                return Err(duplicate("canonical URI", entry.canonical_uri.as_str()));
            }
            if let Some(oid) = &entry.oid {
                if by_oid.insert(oid.as_str().to_string(), index).is_some() {
                    return Err(duplicate("OID", oid.as_str()));
                }
            }
        }

        for (alias, target) in &wire.aliases {
            let index = *by_key.get(&normalise_key(target)).ok_or_else(|| {
                TerminologyError::InvalidTable(format!(
                    "alias '{alias}' points at unknown key '{target}'"
                ))
            })?;
            if by_key.insert(normalise_key(alias), index).is_some() {
                return Err(duplicate("local key", alias));
            }
        }

        let mut identifier_types_by_key = HashMap::new();
        for (index, entry) in wire.identifier_types.iter().enumerate() {
            let key = normalise_key(entry.local_key.as_str());
            if identifier_types_by_key.insert(key, index).is_some() {
                return Err(duplicate("identifier type", entry.local_key.as_str()));
            }
        }

        Ok(Self {
            entries: wire.code_systems,
            by_key,
            by_oid,
            by_uri,
            identifier_types: wire.identifier_types,
            identifier_types_by_key,
        })
    }

    /// Resolves a local key or alias (`CCAM`, `ins-nir`, `LN`).
    ///
    /// # Errors
    ///
    /// Returns [`TerminologyError::NotFound`] if the key is not in the table.
    pub fn resolve_code_system(&self, local_key: &str) -> TerminologyResult<&CodeSystemEntry> {
        self.by_key
            .get(&normalise_key(local_key))
            .map(|&index| &self.entries[index])
            .ok_or_else(|| TerminologyError::NotFound(local_key.trim().to_string()))
    }

    /// Resolves a dotted OID, with or without the `urn:oid:` prefix.
    pub fn resolve_oid(&self, oid: &str) -> Option<&CodeSystemEntry> {
        let oid = Oid::parse(oid).ok()?;
        self.by_oid
            .get(oid.as_str())
            .map(|&index| &self.entries[index])
    }

    /// Resolves a canonical URI back to its entry.
    pub fn resolve_uri(&self, uri: &str) -> Option<&CodeSystemEntry> {
        self.by_uri.get(uri.trim()).map(|&index| &self.entries[index])
    }

    /// The FHIR `system` to emit for a coding-system token found in a message.
    ///
    /// - a known URI is returned as-is, a `urn:oid:` URI is canonicalised through the table
    /// - a bare OID maps to its table entry, or to `urn:oid:<oid>` when unknown
    /// - anything else is looked up as a local key; unknown keys give `None`
    pub fn system_uri_for(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if token.starts_with("urn:oid:") || Oid::is_oid(token) {
            let oid = Oid::parse(token).ok()?;
            return Some(match self.resolve_oid(oid.as_str()) {
                Some(entry) => entry.canonical_uri.as_str().to_string(),
                None => oid.to_urn(),
            });
        }

        if token.contains("://") || token.starts_with("urn:") {
            return Some(token.to_string());
        }

        self.resolve_code_system(token)
            .ok()
            .map(|entry| entry.canonical_uri.as_str().to_string())
    }

    /// The identifier-type entry for a `CX.5` code (`PI`, `INS-NIR`, `RPPS`, ...).
    pub fn identifier_type_entry(&self, local_key: &str) -> Option<&IdentifierTypeEntry> {
        self.identifier_types_by_key
            .get(&normalise_key(local_key))
            .map(|&index| &self.identifier_types[index])
    }

    /// The `Identifier.type` coding for a `CX.5` code.
    pub fn identifier_type(&self, local_key: &str) -> Option<Coding> {
        self.identifier_type_entry(local_key)
            .map(IdentifierTypeEntry::to_coding)
    }

    pub fn entries(&self) -> &[CodeSystemEntry] {
        &self.entries
    }

    pub fn identifier_types(&self) -> &[IdentifierTypeEntry] {
        &self.identifier_types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn duplicate(what: &str, value: &str) -> TerminologyError {
    TerminologyError::InvalidTable(format!("duplicate {what} '{value}'"))
}
