//! Person names from `XPN` fields.
//!
//! HL7 senders often repeat the first given name inside the "second and further given names"
//! component (`SECLET^MARYSE^MARYSE BERTHE ALICE`), and repeat the same name once per
//! repetition with more or fewer given names. Resolution keeps every distinct given name once,
//! in order, and keeps one name per `(family, use)`.

use fhir::{HumanName, NameUse};
use hl7::{Field, Repetition};

/// One resolved person name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRecord {
    pub family: Option<String>,
    pub given: Vec<String>,
    pub prefix: Vec<String>,
    pub suffix: Vec<String>,
    pub use_: NameUse,
}

impl NameRecord {
    /// Reads one `XPN` repetition. `None` when it carries neither a family nor a given name.
    pub fn from_repetition(repetition: &Repetition) -> Option<Self> {
        let family = repetition.value(1).map(str::to_owned);

        let mut given: Vec<String> = Vec::new();
        let first = repetition.value(2).into_iter();
        let further = repetition
            .value(3)
            .into_iter()
            .flat_map(str::split_whitespace);
        for name in first.chain(further) {
            let name = name.trim();
            if !name.is_empty() && !given.iter().any(|g| g == name) {
                given.push(name.to_owned());
            }
        }

        if family.is_none() && given.is_empty() {
            return None;
        }

        Some(Self {
            family,
            given,
            suffix: repetition.value(4).map(str::to_owned).into_iter().collect(),
            prefix: repetition.value(5).map(str::to_owned).into_iter().collect(),
            use_: name_use(repetition.value(7)),
        })
    }

    pub fn to_human_name(&self) -> HumanName {
        HumanName {
            use_: Some(self.use_),
            family: self.family.clone(),
            given: self.given.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

/// `XPN.7` name type code to FHIR name use. Unknown or absent codes are `official`.
pub fn name_use(code: Option<&str>) -> NameUse {
    match code {
        Some("D") => NameUse::Usual,
        Some("M") => NameUse::Maiden,
        Some("N") => NameUse::Nickname,
        _ => NameUse::Official,
    }
}

/// Resolves every repetition of a name field.
///
/// Repetitions sharing a family name and use collapse to the one with the most given names
/// (the first one on a tie); they are never merged.
pub fn resolve_names(field: Option<&Field>) -> Vec<NameRecord> {
    let mut names: Vec<NameRecord> = Vec::new();

    for record in field
        .into_iter()
        .flat_map(Field::repetitions)
        .filter_map(NameRecord::from_repetition)
    {
        match names
            .iter_mut()
            .find(|n| n.family == record.family && n.use_ == record.use_)
        {
            Some(existing) if record.given.len() > existing.given.len() => *existing = record,
            Some(_) => {}
            None => names.push(record),
        }
    }

    names
}
