//! Segments and segment tags.

use crate::value::{Field, Repetition};
use serde::{Serialize, Serializer};
use std::fmt;

/// A 3-character segment type tag (`MSH`, `PID`, `ZBE`, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentTag([u8; 3]);

impl SegmentTag {
    pub const MSH: SegmentTag = SegmentTag(*b"MSH");
    pub const PID: SegmentTag = SegmentTag(*b"PID");
    pub const PV1: SegmentTag = SegmentTag(*b"PV1");
    pub const NK1: SegmentTag = SegmentTag(*b"NK1");
    pub const OBR: SegmentTag = SegmentTag(*b"OBR");
    pub const OBX: SegmentTag = SegmentTag(*b"OBX");
    pub const SPM: SegmentTag = SegmentTag(*b"SPM");

    /// Parses a tag: exactly three ASCII uppercase letters or digits, starting with a letter.
    pub fn parse(input: &str) -> Option<Self> {
        let bytes: [u8; 3] = input.as_bytes().try_into().ok()?;
        let valid = bytes[0].is_ascii_uppercase()
            && bytes[1..]
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        valid.then_some(Self(bytes))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII bytes are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for SegmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SegmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentTag({})", self.as_str())
    }
}

impl Serialize for SegmentTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One tokenized segment.
///
/// Field numbering follows the HL7 position tables: `field(1)` is the first field after the
/// tag, and position 0 is the tag itself (never returned as a field). For `MSH`, `field(1)` is
/// the field separator and `field(2)` the encoding characters, so `MSH-9` is `field(9)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Segment {
    tag: SegmentTag,
    position: usize,
    fields: Vec<Field>,
}

impl Segment {
    pub(crate) fn new(tag: SegmentTag, position: usize, fields: Vec<Field>) -> Self {
        Self {
            tag,
            position,
            fields,
        }
    }

    pub fn tag(&self) -> SegmentTag {
        self.tag
    }

    /// 0-based position of this segment in the whole message.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of fields present (trailing empty fields included).
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field `n` (1-based).
    pub fn field(&self, n: usize) -> Option<&Field> {
        let index = n.checked_sub(1)?;
        self.fields.get(index)
    }

    /// First component of the first repetition of field `n`.
    pub fn value(&self, n: usize) -> Option<&str> {
        self.field(n).and_then(Field::value)
    }

    /// Component `c` of the first repetition of field `n`.
    pub fn component(&self, n: usize, c: usize) -> Option<&str> {
        self.field(n)
            .and_then(Field::first)
            .and_then(|r| r.value(c))
    }

    /// Non-empty repetitions of field `n`; empty when the field is absent.
    pub fn repetitions(&self, n: usize) -> impl Iterator<Item = &Repetition> {
        self.field(n).into_iter().flat_map(Field::repetitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    #[test]
    fn parses_valid_tags() {
        assert_eq!(SegmentTag::parse("PID"), Some(SegmentTag::PID));
        assert_eq!(SegmentTag::parse("PV1"), Some(SegmentTag::PV1));
        assert!(SegmentTag::parse("ZBE").is_some());
    }

    #[test]
    fn rejects_invalid_tags() {
        for bad in ["", "PI", "PIDX", "pid", "1AB", "P-D", "PÏ"] {
            assert!(SegmentTag::parse(bad).is_none(), "{bad} should be rejected");
        }
    }

    #[test]
    fn field_positions_are_one_based() {
        let enc = Encoding::default();
        let segment = Segment::new(
            SegmentTag::PID,
            1,
            vec![Field::parse("1", &enc), Field::parse("", &enc), Field::parse("ID^^^NS", &enc)],
        );

        assert!(segment.field(0).is_none());
        assert_eq!(segment.value(1), Some("1"));
        assert_eq!(segment.value(2), None);
        assert_eq!(segment.component(3, 4), Some("NS"));
        assert_eq!(segment.repetitions(3).count(), 1);
        assert_eq!(segment.repetitions(42).count(), 0);
    }

    #[test]
    fn tag_serializes_as_string() {
        let json = serde_json::to_string(&SegmentTag::OBX).expect("serialize");
        assert_eq!(json, "\"OBX\"");
    }
}
