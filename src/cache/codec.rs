//! Value and key encoding
//!
//! Storage-key sanitization for the disk tier, plus the JSON and numeric
//! decoding shared by every repository's typed accessors.

use std::fmt::Write;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Marker appended to every file written by the disk tier.
pub const STORAGE_KEY_SUFFIX: &str = ".cached-value";

// == Storage Keys ==
/// Longest file name the disk tier writes. Common file systems stop at 255 bytes.
pub const MAX_STORAGE_KEY_LENGTH: usize = 200;

/// Marks a file name derived from a key digest. Escaping never emits `%%`.
const DIGEST_MARKER: &str = "%%";

/// Suffix of the file holding the original key of a digest-named value.
pub const STORAGE_KEY_SIDECAR_SUFFIX: &str = ".cached-key";

/// Maps a cache key to the file name it is stored under.
///
/// `:` becomes `-` and a space becomes `~`. Any character that would make the
/// mapping ambiguous or the file name unsafe is percent-escaped first, so two
/// distinct keys never share a file. When the escaped name would exceed
/// [`MAX_STORAGE_KEY_LENGTH`], the name is the SHA-256 of the key followed by
/// a readable prefix, and the key itself lives in a sidecar file
/// (see [`storage_key_sidecar`]).
pub fn storage_key(key: &str) -> String {
    let escaped = escape_key(key);
    if escaped.len() + STORAGE_KEY_SUFFIX.len() <= MAX_STORAGE_KEY_LENGTH {
        return escaped + STORAGE_KEY_SUFFIX;
    }

    let digest = key_digest(key);
    let budget = MAX_STORAGE_KEY_LENGTH
        - STORAGE_KEY_SUFFIX.len()
        - DIGEST_MARKER.len()
        - digest.len()
        - 1;
    let mut cut = budget.min(escaped.len());
    while !escaped.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}{}-{}{}",
        DIGEST_MARKER,
        digest,
        &escaped[..cut],
        STORAGE_KEY_SUFFIX
    )
}

/// Name of the sidecar file recording the key of a digest-named value file.
/// `None` for names that decode on their own.
pub fn storage_key_sidecar(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(STORAGE_KEY_SUFFIX)?;
    stem.starts_with(DIGEST_MARKER)
        .then(|| format!("{}{}", stem, STORAGE_KEY_SIDECAR_SUFFIX))
}

/// Reverses [`storage_key`]. Returns `None` for names the disk tier did not
/// write and for digest names, whose key is kept in the sidecar file.
pub fn key_from_storage_key(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(STORAGE_KEY_SUFFIX)?;
    if stem.starts_with(DIGEST_MARKER) {
        return None;
    }
    let mut bytes = Vec::with_capacity(stem.len());
    let mut chars = stem.bytes();
    while let Some(b) = chars.next() {
        match b {
            b'-' => bytes.push(b':'),
            b'~' => bytes.push(b' '),
            b'%' => {
                let hi = chars.next()?;
                let lo = chars.next()?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).ok()?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
            }
            b => bytes.push(b),
        }
    }
    String::from_utf8(bytes).ok()
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + STORAGE_KEY_SUFFIX.len());
    for c in key.chars() {
        match c {
            ':' => out.push('-'),
            ' ' => out.push('~'),
            c if needs_escape(c) => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "%{:02X}", byte);
                }
            }
            c => out.push(c),
        }
    }
    out
}

fn key_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex_from_bytes(&hasher.finalize())
}

fn hex_from_bytes(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(output, "{:02x}", byte);
    }
    output
}

fn needs_escape(c: char) -> bool {
    matches!(
        c,
        '%' | '-' | '~' | '/' | '\\' | '<' | '>' | '"' | '|' | '?' | '*'
    ) || c.is_control()
}

// == Decoded ==
/// Result of a typed read that found the key.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// Stored text decoded as the requested type.
    Parsed(T),
    /// Stored text did not decode; returned verbatim because the caller
    /// asked for the raw fallback.
    Raw(String),
}

impl<T> Decoded<T> {
    /// The decoded value, dropping a raw fallback.
    pub fn parsed(self) -> Option<T> {
        match self {
            Decoded::Parsed(value) => Some(value),
            Decoded::Raw(_) => None,
        }
    }
}

impl<T: DeserializeOwned> Decoded<T> {
    /// Reinterprets a raw fallback as a JSON string literal.
    ///
    /// Succeeds when `T` can hold a plain string (`String`, `serde_json::Value`,
    /// untagged enums with a string arm).
    pub fn coerce(self) -> Option<T> {
        match self {
            Decoded::Parsed(value) => Some(value),
            Decoded::Raw(raw) => serde_json::from_value(Value::String(raw)).ok(),
        }
    }
}

// == JSON ==
/// Decodes stored text as JSON `T`.
pub fn decode_json<T: DeserializeOwned>(raw: String, fallback_raw: bool) -> Option<Decoded<T>> {
    match serde_json::from_str(&raw) {
        Ok(value) => Some(Decoded::Parsed(value)),
        Err(_) if fallback_raw => Some(Decoded::Raw(raw)),
        Err(_) => None,
    }
}

/// Encodes a value as JSON text.
pub fn encode_json<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

// == Numbers ==
/// Decodes stored text as a number.
pub fn decode_number(raw: String, fallback_raw: bool) -> Option<Decoded<f64>> {
    match parse_number(&raw) {
        Some(value) => Some(Decoded::Parsed(value)),
        None if fallback_raw => Some(Decoded::Raw(raw)),
        None => None,
    }
}

/// Formats a number the way it is stored: integral values carry no fraction.
pub fn encode_number(value: f64) -> String {
    value.to_string()
}

/// Parses the longest numeric prefix of `raw`, ignoring leading whitespace.
///
/// `"12px"` is 12, `"  -3.5e2 apples"` is -350. No numeric prefix, or a NaN
/// result, is a parse failure.
pub fn parse_number(raw: &str) -> Option<f64> {
    let text = raw.trim_start();

    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && text.len() - unsigned.len() <= 1 {
        return Some(if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let end = text
        .char_indices()
        .find(|(_, c)| !matches!(c, '0'..='9' | '+' | '-' | '.' | 'e' | 'E'))
        .map(|(index, _)| index)
        .unwrap_or(text.len());

    (1..=end)
        .rev()
        .filter_map(|len| text[..len].parse::<f64>().ok())
        .find(|value| !value.is_nan())
}
