//! Nested field values.
//!
//! A field is a list of repetitions, a repetition a list of components, a component a list of
//! subcomponents. Every level is optional: absent or empty parts collapse to `None` in the
//! accessors, so mappers never deal with empty strings. Positions are 1-based, as in the HL7
//! data type tables (`XPN.1` is the family name).

use crate::encoding::Encoding;
use serde::Serialize;

/// The HL7 explicit null (`""`), treated as absent.
const HL7_NULL: &str = "\"\"";

fn leaf(raw: &str, encoding: &Encoding) -> String {
    if raw == HL7_NULL {
        return String::new();
    }
    encoding.unescape(raw).into_owned()
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// One component: its subcomponents, unescaped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Component(Vec<String>);

impl Component {
    pub(crate) fn parse(raw: &str, encoding: &Encoding) -> Self {
        Self(
            raw.split(encoding.subcomponent)
                .map(|s| leaf(s, encoding))
                .collect(),
        )
    }

    /// The `n`th subcomponent (1-based), if non-empty.
    pub fn subcomponent(&self, n: usize) -> Option<&str> {
        let index = n.checked_sub(1)?;
        self.0.get(index).and_then(|s| non_empty(s))
    }

    /// The first subcomponent, which is the whole value for simple components.
    pub fn value(&self) -> Option<&str> {
        self.subcomponent(1)
    }

    pub fn subcomponents(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }
}

/// One repetition of a field: its components.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Repetition(Vec<Component>);

impl Repetition {
    pub(crate) fn parse(raw: &str, encoding: &Encoding) -> Self {
        Self(
            raw.split(encoding.component)
                .map(|c| Component::parse(c, encoding))
                .collect(),
        )
    }

    /// The `n`th component (1-based).
    pub fn component(&self, n: usize) -> Option<&Component> {
        let index = n.checked_sub(1)?;
        self.0.get(index)
    }

    /// The value of the `n`th component (its first subcomponent), if non-empty.
    pub fn value(&self, n: usize) -> Option<&str> {
        self.component(n).and_then(Component::value)
    }

    /// Subcomponent `s` of component `n`, if non-empty.
    pub fn subcomponent(&self, n: usize, s: usize) -> Option<&str> {
        self.component(n).and_then(|c| c.subcomponent(s))
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Component::is_empty)
    }
}

/// A complete field value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Field(Vec<Repetition>);

impl Field {
    pub(crate) fn parse(raw: &str, encoding: &Encoding) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        Self(
            raw.split(encoding.repetition)
                .map(|r| Repetition::parse(r, encoding))
                .collect(),
        )
    }

    /// A field holding `value` verbatim, without splitting or unescaping (`MSH-1`, `MSH-2`).
    pub(crate) fn literal(value: &str) -> Self {
        Self(vec![Repetition(vec![Component(vec![value.to_owned()])])])
    }

    /// Non-empty repetitions, in order.
    pub fn repetitions(&self) -> impl Iterator<Item = &Repetition> {
        self.0.iter().filter(|r| !r.is_empty())
    }

    /// The first non-empty repetition.
    pub fn first(&self) -> Option<&Repetition> {
        self.repetitions().next()
    }

    /// The first component of the first repetition.
    pub fn value(&self) -> Option<&str> {
        self.first().and_then(|r| r.value(1))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Repetition::is_empty)
    }
}
