//! Message tokenizer.
//!
//! Splits raw text into segments, fields, repetitions, components and subcomponents using the
//! delimiters the header declares. Line endings are normalised to the segment terminator first,
//! so `\r\n`, `\n\r` and bare `\n` feeds tokenize the same way as `\r` feeds.

use crate::encoding::{Encoding, HEADER_TAG};
use crate::segment::{Segment, SegmentTag};
use crate::value::Field;
use crate::{Hl7Error, Hl7Result};
use serde::Serialize;

/// HL7 segment terminator.
pub const SEGMENT_TERMINATOR: char = '\r';

const BOM: char = '\u{feff}';
const MLLP_START: char = '\u{0b}';
const MLLP_END: char = '\u{1c}';

/// Raw message text with its declared encoding characters. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    text: String,
    encoding: Encoding,
}

/// A line dropped during tokenization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenizeWarning {
    /// 1-based index among the non-empty lines of the message.
    pub line: usize,
    pub message: String,
}

/// Tokenizer output: segments in message order plus any dropped lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tokenized {
    pub encoding: Encoding,
    pub segments: Vec<Segment>,
    pub warnings: Vec<TokenizeWarning>,
}

impl RawMessage {
    /// Normalises `input` and reads the header's encoding characters.
    ///
    /// # Errors
    ///
    /// - [`Hl7Error::Empty`] if nothing but whitespace or framing bytes remain
    /// - [`Hl7Error::MalformedHeader`] if the first segment is not a usable `MSH`
    pub fn parse(input: &str) -> Hl7Result<Self> {
        let stripped = input.trim_matches(|c: char| {
            c == BOM || c == MLLP_START || c == MLLP_END || c.is_whitespace()
        });
        if stripped.is_empty() {
            return Err(Hl7Error::Empty);
        }

        let text = normalize_line_endings(stripped);
        let header = text
            .split(SEGMENT_TERMINATOR)
            .next()
            .unwrap_or_default();
        let encoding = Encoding::from_header(header)?;

        Ok(Self { text, encoding })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Non-empty raw segment strings, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.text
            .split(SEGMENT_TERMINATOR)
            .filter(|s| !s.trim().is_empty())
    }

    /// Splits every segment into nested fields.
    pub fn tokenize(&self) -> Tokenized {
        let mut segments = Vec::new();
        let mut warnings = Vec::new();

        for (index, line) in self.segments().enumerate() {
            match tokenize_segment(line, segments.len(), &self.encoding) {
                Ok(segment) => segments.push(segment),
                Err(message) => {
                    tracing::debug!(line = index + 1, %message, "dropping unparseable segment");
                    warnings.push(TokenizeWarning {
                        line: index + 1,
                        message,
                    });
                }
            }
        }

        Tokenized {
            encoding: self.encoding,
            segments,
            warnings,
        }
    }
}

/// Parses and tokenizes `input` in one step.
pub fn tokenize(input: &str) -> Hl7Result<Tokenized> {
    Ok(RawMessage::parse(input)?.tokenize())
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\r")
        .replace("\n\r", "\r")
        .replace('\n', "\r")
}

fn tokenize_segment(line: &str, position: usize, encoding: &Encoding) -> Result<Segment, String> {
    let tag_text = line.get(..3).unwrap_or(line);
    let tag = SegmentTag::parse(tag_text)
        .ok_or_else(|| format!("invalid segment tag '{}'", tag_text.escape_debug()))?;
    let rest = &line[3..];

    if tag.as_str() == HEADER_TAG {
        return Ok(Segment::new(tag, position, header_fields(rest, encoding)));
    }

    if rest.is_empty() {
        return Ok(Segment::new(tag, position, Vec::new()));
    }

    let body = rest.strip_prefix(encoding.field).ok_or_else(|| {
        format!("segment tag '{tag}' is not followed by the field separator")
    })?;

    let fields = body
        .split(encoding.field)
        .map(|raw| Field::parse(raw, encoding))
        .collect();
    Ok(Segment::new(tag, position, fields))
}

/// `MSH-1` is the separator itself and `MSH-2` the encoding characters; neither is split.
fn header_fields(rest: &str, encoding: &Encoding) -> Vec<Field> {
    let body = rest.strip_prefix(encoding.field).unwrap_or(rest);
    let mut parts = body.split(encoding.field);

    let mut fields = vec![Field::literal(&encoding.field.to_string())];
    fields.push(Field::literal(parts.next().unwrap_or_default()));
    fields.extend(parts.map(|raw| Field::parse(raw, encoding)));
    fields
}
