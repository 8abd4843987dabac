//! Segment grouping.
//!
//! A [`ParsedMessage`] indexes the tokenized segments by type tag. Within a group segments keep
//! their message order, and each segment still carries its absolute position so callers can
//! relate segments across groups (an `OBX` to the `OBR` before it).

use crate::encoding::Encoding;
use crate::segment::{Segment, SegmentTag};
use crate::tokenizer::{RawMessage, Tokenized};
use crate::Hl7Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Segments of one message, grouped by tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    encoding: Encoding,
    groups: BTreeMap<SegmentTag, Vec<Segment>>,
    /// Tags in order of first appearance.
    #[serde(skip)]
    order: Vec<SegmentTag>,
    segment_count: usize,
}

impl ParsedMessage {
    /// Groups already tokenized segments.
    pub fn group(tokenized: Tokenized) -> Self {
        let segment_count = tokenized.segments.len();
        let mut groups: BTreeMap<SegmentTag, Vec<Segment>> = BTreeMap::new();
        let mut order = Vec::new();

        for segment in tokenized.segments {
            let tag = segment.tag();
            if !groups.contains_key(&tag) {
                order.push(tag);
            }
            groups.entry(tag).or_default().push(segment);
        }

        Self {
            encoding: tokenized.encoding,
            groups,
            order,
            segment_count,
        }
    }

    /// Tokenizes and groups `input`, discarding tokenizer warnings.
    pub fn parse(input: &str) -> Hl7Result<Self> {
        Ok(Self::group(RawMessage::parse(input)?.tokenize()))
    }

    /// Segments with `tag`, in message order; empty if there are none.
    pub fn segments(&self, tag: SegmentTag) -> &[Segment] {
        self.groups.get(&tag).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first segment with `tag`.
    pub fn first(&self, tag: SegmentTag) -> Option<&Segment> {
        self.segments(tag).first()
    }

    pub fn contains(&self, tag: SegmentTag) -> bool {
        self.groups.contains_key(&tag)
    }

    /// Distinct tags in order of first appearance.
    pub fn tags(&self) -> &[SegmentTag] {
        &self.order
    }

    /// Total number of segments across all groups.
    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn is_empty(&self) -> bool {
        self.segment_count == 0
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// `MSH-9` rendered as `TYPE^EVENT` (`ADT^A01`), or just the type if no event is given.
    pub fn message_type(&self) -> Option<String> {
        let msh = self.first(SegmentTag::MSH)?;
        let code = msh.component(9, 1)?;
        let separator = self.encoding.component;
        Some(match msh.component(9, 2) {
            Some(event) => format!("{code}{separator}{event}"),
            None => code.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORU: &str = "MSH|^~\\&|LAB|FAC|EHR|FAC|20240102||ORU^R01|42|P|2.5\r\
PID|1||ID1^^^HOSP\r\
OBR|1|P1|F1|GLU^Glucose^LN\r\
OBX|1|NM|GLU^Glucose^LN||5.4|mmol/L\r\
OBX|2|NM|NA^Sodium^LN||140|mmol/L\r\
OBR|2|P2|F2|K^Potassium^LN\r\
OBX|1|NM|K^Potassium^LN||4.1|mmol/L\r\
ZXY|custom";

    #[test]
    fn groups_by_tag_in_message_order() {
        let message = ParsedMessage::parse(ORU).expect("valid message");

        assert_eq!(message.segment_count(), 8);
        assert_eq!(message.segments(SegmentTag::OBX).len(), 3);
        assert_eq!(message.segments(SegmentTag::OBR).len(), 2);

        let obx_positions: Vec<_> = message
            .segments(SegmentTag::OBX)
            .iter()
            .map(Segment::position)
            .collect();
        assert_eq!(obx_positions, [3, 4, 6]);
    }

    #[test]
    fn group_sizes_sum_to_segment_count() {
        let message = ParsedMessage::parse(ORU).expect("valid message");
        let total: usize = message
            .tags()
            .iter()
            .map(|&tag| message.segments(tag).len())
            .sum();
        assert_eq!(total, message.segment_count());
    }

    #[test]
    fn tags_follow_first_appearance() {
        let message = ParsedMessage::parse(ORU).expect("valid message");
        let tags: Vec<_> = message.tags().iter().map(SegmentTag::as_str).collect();
        assert_eq!(tags, ["MSH", "PID", "OBR", "OBX", "ZXY"]);
    }

    #[test]
    fn missing_groups_are_empty() {
        let message = ParsedMessage::parse(ORU).expect("valid message");
        assert!(!message.contains(SegmentTag::PV1));
        assert!(message.segments(SegmentTag::PV1).is_empty());
        assert!(message.first(SegmentTag::SPM).is_none());
    }

    #[test]
    fn reads_message_type() {
        let message = ParsedMessage::parse(ORU).expect("valid message");
        assert_eq!(message.message_type().as_deref(), Some("ORU^R01"));

        let bare = ParsedMessage::parse("MSH|^~\\&|A|B|C|D|20240101||ACK|1|P|2.5")
            .expect("valid message");
        assert_eq!(bare.message_type().as_deref(), Some("ACK"));
    }
}
