use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::{debug, trace};

use crate::error::LoadError;

/// A text encoding the loader knows how to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// cp1252; the five undefined byte values count as decode errors.
    Windows1252,
    /// ISO-8859-1, every byte maps to the code point of the same value.
    Latin1,
    /// Any other WHATWG encoding handed in as a hint.
    Other(&'static Encoding),
}

/// Bytes with no assignment in Windows-1252.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Default fallback chain, tried after any byte-order mark.
pub fn default_candidates() -> Vec<TextEncoding> {
    vec![
        TextEncoding::Utf8,
        TextEncoding::Windows1252,
        TextEncoding::Latin1,
    ]
}

impl TextEncoding {
    /// Resolve a user-facing label such as `"utf-8"`, `"latin1"` or `"cp1252"`.
    ///
    /// `encoding_rs` folds ISO-8859-1 into windows-1252 (WHATWG rules), so the
    /// Latin-1 labels are intercepted first.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_ascii_lowercase();
        if matches!(
            l.as_str(),
            "latin1" | "latin-1" | "latin_1" | "iso-8859-1" | "iso8859-1" | "l1"
        ) {
            return Some(TextEncoding::Latin1);
        }
        if l == "utf-8-sig" || l == "utf_8_sig" {
            return Some(TextEncoding::Utf8);
        }
        Encoding::for_label(l.as_bytes()).map(Self::from_encoding)
    }

    fn from_encoding(enc: &'static Encoding) -> Self {
        if enc == UTF_8 {
            TextEncoding::Utf8
        } else if enc == UTF_16LE {
            TextEncoding::Utf16Le
        } else if enc == UTF_16BE {
            TextEncoding::Utf16Be
        } else if enc == WINDOWS_1252 {
            TextEncoding::Windows1252
        } else {
            TextEncoding::Other(enc)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Other(enc) => enc.name(),
        }
    }

    /// Strict decode of the whole buffer. `None` on the first malformed sequence.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                UTF_8
                    .decode_without_bom_handling_and_without_replacement(body)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Utf16Le => {
                let body = bytes.strip_prefix(b"\xFF\xFE").unwrap_or(bytes);
                UTF_16LE
                    .decode_without_bom_handling_and_without_replacement(body)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Utf16Be => {
                let body = bytes.strip_prefix(b"\xFE\xFF").unwrap_or(bytes);
                UTF_16BE
                    .decode_without_bom_handling_and_without_replacement(body)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Windows1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                WINDOWS_1252
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes).into_owned()),
            TextEncoding::Other(enc) => enc
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned()),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TextEncoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        TextEncoding::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown encoding `{}`", label)))
    }
}

/// The outcome of decoding: which encoding won, whether a BOM was seen, and the text.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub encoding: TextEncoding,
    pub had_bom: bool,
    pub text: String,
}

/// Decode `bytes` with the explicit `hint` only.
pub fn decode_with_hint(bytes: &[u8], hint: TextEncoding) -> Result<Decoded, LoadError> {
    let had_bom = bom_encoding(bytes).is_some_and(|(enc, _)| enc == hint);
    match hint.decode(bytes) {
        Some(text) => {
            debug!(encoding = %hint, "decoded with hinted encoding");
            Ok(Decoded {
                encoding: hint,
                had_bom,
                text,
            })
        }
        None => Err(LoadError::Decode {
            tried: vec![hint.name().to_string()],
        }),
    }
}

/// Walk the candidate chain: a BOM-signalled encoding alone when a BOM is
/// present, else `candidates` in order. The first one that decodes the entire
/// buffer wins.
pub fn detect_encoding(bytes: &[u8], candidates: &[TextEncoding]) -> Result<Decoded, LoadError> {
    // 1) byte-order mark names the encoding; a body that does not decode under it is an error
    if let Some((enc, bom_len)) = bom_encoding(bytes) {
        return match enc.decode(bytes) {
            Some(text) => {
                debug!(encoding = %enc, bom_len, "decoded via byte-order mark");
                Ok(Decoded {
                    encoding: enc,
                    had_bom: true,
                    text,
                })
            }
            None => {
                trace!(encoding = %enc, "byte-order mark present but body does not decode");
                Err(LoadError::Decode {
                    tried: vec![format!("{} (BOM)", enc.name())],
                })
            }
        };
    }

    let mut tried = Vec::with_capacity(candidates.len());

    // 2) ordered fallbacks
    for &cand in candidates {
        match cand.decode(bytes) {
            Some(text) => {
                debug!(encoding = %cand, "decoded");
                return Ok(Decoded {
                    encoding: cand,
                    had_bom: false,
                    text,
                });
            }
            None => {
                trace!(encoding = %cand, "candidate rejected");
                tried.push(cand.name().to_string());
            }
        }
    }

    Err(LoadError::Decode { tried })
}

fn bom_encoding(bytes: &[u8]) -> Option<(TextEncoding, usize)> {
    Encoding::for_bom(bytes).map(|(enc, len)| (TextEncoding::from_encoding(enc), len))
}
