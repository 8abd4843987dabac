//! Encoding characters declared by the message header.
//!
//! An HL7 v2 message names its own delimiters: the character right after the `MSH` tag is the
//! field separator and `MSH-2` lists the component, repetition, escape and subcomponent
//! separators (plus a truncation character from v2.7 on).

use crate::{Hl7Error, Hl7Result};
use serde::Serialize;
use std::borrow::Cow;

/// Fixed tag of the header segment.
pub const HEADER_TAG: &str = "MSH";

/// Component and repetition separators must be declared; the rest have defaults.
pub const MIN_ENCODING_CHARS: usize = 2;

const MAX_ENCODING_CHARS: usize = 5;
const DEFAULT_ESCAPE: char = '\\';
const DEFAULT_SUBCOMPONENT: char = '&';

/// The delimiter set of one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<char>,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: DEFAULT_ESCAPE,
            subcomponent: DEFAULT_SUBCOMPONENT,
            truncation: None,
        }
    }
}

impl Encoding {
    /// Reads the delimiters from the header segment text (`MSH|^~\&|...`).
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::MalformedHeader`] if:
    /// - the segment does not start with `MSH`,
    /// - it is too short to carry a field separator and encoding characters,
    /// - fewer than [`MIN_ENCODING_CHARS`] or more than five encoding characters are declared,
    /// - any delimiter is alphanumeric, whitespace, or used twice.
    pub fn from_header(segment: &str) -> Hl7Result<Self> {
        let rest = segment.strip_prefix(HEADER_TAG).ok_or_else(|| {
            Hl7Error::MalformedHeader(format!("message must start with a {HEADER_TAG} segment"))
        })?;

        let mut chars = rest.chars();
        let field = chars.next().ok_or_else(|| {
            Hl7Error::MalformedHeader("header too short: no field separator".into())
        })?;

        let declared: Vec<char> = chars.take_while(|&c| c != field).collect();
        if declared.len() < MIN_ENCODING_CHARS {
            return Err(Hl7Error::MalformedHeader(format!(
                "header declares {} encoding characters, at least {} required",
                declared.len(),
                MIN_ENCODING_CHARS
            )));
        }
        if declared.len() > MAX_ENCODING_CHARS {
            return Err(Hl7Error::MalformedHeader(format!(
                "header declares {} encoding characters, at most {} allowed",
                declared.len(),
                MAX_ENCODING_CHARS
            )));
        }

        let encoding = Self {
            field,
            component: declared[0],
            repetition: declared[1],
            escape: declared.get(2).copied().unwrap_or(DEFAULT_ESCAPE),
            subcomponent: declared.get(3).copied().unwrap_or(DEFAULT_SUBCOMPONENT),
            truncation: declared.get(4).copied(),
        };
        encoding.validate()?;
        Ok(encoding)
    }

    fn validate(&self) -> Hl7Result<()> {
        let mut seen: Vec<char> = Vec::with_capacity(MAX_ENCODING_CHARS + 1);
        let all = [
            Some(self.field),
            Some(self.component),
            Some(self.repetition),
            Some(self.escape),
            Some(self.subcomponent),
            self.truncation,
        ];

        for c in all.into_iter().flatten() {
            if c.is_alphanumeric() || c.is_whitespace() {
                return Err(Hl7Error::MalformedHeader(format!(
                    "'{}' cannot be used as a delimiter",
                    c.escape_debug()
                )));
            }
            if seen.contains(&c) {
                return Err(Hl7Error::MalformedHeader(format!(
                    "delimiter '{c}' is declared more than once"
                )));
            }
            seen.push(c);
        }
        Ok(())
    }

    /// The `MSH-2` value these delimiters serialise to.
    pub fn encoding_characters(&self) -> String {
        let mut out = String::with_capacity(MAX_ENCODING_CHARS);
        out.push(self.component);
        out.push(self.repetition);
        out.push(self.escape);
        out.push(self.subcomponent);
        if let Some(t) = self.truncation {
            out.push(t);
        }
        out
    }

    /// Decodes escape sequences in a leaf value.
    ///
    /// Delimiter escapes (`\F\ \S\ \T\ \R\ \E\`), hexadecimal data (`\Xhh..\`) and the line
    /// break (`\.br\`) are decoded, highlighting (`\H\ \N\`) is dropped, and anything else is
    /// kept verbatim. Values without the escape character are returned borrowed.
    pub fn unescape<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        if !raw.contains(self.escape) {
            return Cow::Borrowed(raw);
        }

        let esc_len = self.escape.len_utf8();
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find(self.escape) {
            out.push_str(&rest[..start]);
            let after = &rest[start + esc_len..];

            let Some(end) = after.find(self.escape) else {
                // Unterminated sequence: keep the tail as-is.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let sequence = &after[..end];
            match self.decode_sequence(sequence) {
                Some(decoded) => out.push_str(&decoded),
                None => {
                    out.push(self.escape);
                    out.push_str(sequence);
                    out.push(self.escape);
                }
            }
            rest = &after[end + esc_len..];
        }

        out.push_str(rest);
        Cow::Owned(out)
    }

    fn decode_sequence(&self, sequence: &str) -> Option<String> {
        match sequence {
            "F" => Some(self.field.to_string()),
            "S" => Some(self.component.to_string()),
            "T" => Some(self.subcomponent.to_string()),
            "R" => Some(self.repetition.to_string()),
            "E" => Some(self.escape.to_string()),
            "H" | "N" => Some(String::new()),
            ".br" => Some("\n".to_string()),
            _ => {
                let hex = sequence.strip_prefix('X')?;
                decode_hex(hex).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
