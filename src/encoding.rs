//! Text encoding resolution for raw export files.
//!
//! Candidates are tried in a fixed order and the first one that decodes the
//! whole byte stream wins. UTF-8 goes first because it validates itself;
//! the single-byte encodings accept nearly any input and would otherwise
//! hide genuine UTF-8.

use crate::error::{Result, SalesInsightError};
use encoding_rs::{UTF_8, WINDOWS_1252};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Iso8859_1,
    Windows1252,
}

impl TextEncoding {
    /// Priority order used by [`resolve`].
    pub const CANDIDATES: [TextEncoding; 4] = [
        TextEncoding::Utf8,
        TextEncoding::Latin1,
        TextEncoding::Iso8859_1,
        TextEncoding::Windows1252,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Iso8859_1 => "iso-8859-1",
            TextEncoding::Windows1252 => "cp1252",
        }
    }

    /// Strict decode: `None` if any byte sequence is invalid for this encoding.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                UTF_8.decode_without_bom_handling_and_without_replacement(body)
            }
            // Latin-1 maps every byte to the code point of the same value.
            TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
                Some(encoding_rs::mem::decode_latin1(bytes))
            }
            TextEncoding::Windows1252 => {
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedText {
    pub text: String,
    pub encoding: TextEncoding,
}

pub fn resolve(bytes: &[u8]) -> Result<ResolvedText> {
    resolve_named(bytes, "input")
}

/// Like [`resolve`], naming the source in the error it returns.
pub fn resolve_named(bytes: &[u8], source_name: &str) -> Result<ResolvedText> {
    for encoding in TextEncoding::CANDIDATES {
        match encoding.decode(bytes) {
            Some(text) => {
                debug!("Decoded {} ({} bytes) as {}", source_name, bytes.len(), encoding.label());
                return Ok(ResolvedText {
                    text: text.into_owned(),
                    encoding,
                });
            }
            None => debug!("{} is not valid {}", source_name, encoding.label()),
        }
    }

    Err(SalesInsightError::UnreadableInput {
        source_name: source_name.to_string(),
        tried: TextEncoding::CANDIDATES
            .iter()
            .map(|e| e.label().to_string())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_wins_even_when_latin1_would_decode() {
        let bytes = "Café,Año".as_bytes();
        assert!(TextEncoding::Latin1.decode(bytes).is_some());

        let resolved = resolve(bytes).unwrap();
        assert_eq!(resolved.encoding, TextEncoding::Utf8);
        assert_eq!(resolved.text, "Café,Año");
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"Caf\xe9,A\xf1o";
        let resolved = resolve(bytes).unwrap();
        assert_eq!(resolved.encoding, TextEncoding::Latin1);
        assert_eq!(resolved.text, "Café,Año");
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"fecha,cliente");
        let resolved = resolve(&bytes).unwrap();
        assert_eq!(resolved.encoding, TextEncoding::Utf8);
        assert_eq!(resolved.text, "fecha,cliente");
    }

    #[test]
    fn test_windows_1252_decodes_euro_sign() {
        let text = TextEncoding::Windows1252.decode(b"\x80 5").unwrap();
        assert_eq!(text, "€ 5");
        assert!(TextEncoding::Utf8.decode(b"\x80 5").is_none());
    }

    #[test]
    fn test_candidate_order() {
        let labels: Vec<_> = TextEncoding::CANDIDATES.iter().map(|e| e.label()).collect();
        assert_eq!(labels, vec!["utf-8", "latin-1", "iso-8859-1", "cp1252"]);
    }
}
