//! PII masking and anonymization applied before audit persistence.
//!
//! Masking is a pure transform: the input value is never modified. Values
//! under sensitive keys are replaced by `{masked, hash, originalLength}`
//! where the hash is an HMAC keyed by the masking salt, so equal inputs stay
//! correlatable under one salt and unlinkable across salts.

use std::fmt::{Debug, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bastion_core::{AppError, AppResult};
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};

use crate::digest::keyed_hex;
use crate::hash_chain::canonicalize;

/// Normalized key fragments that mark a field as sensitive.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "passphrase",
    "secret",
    "token",
    "apikey",
    "authorization",
    "cookie",
    "ssn",
    "socialsecurity",
    "taxid",
    "creditcard",
    "cardnumber",
    "cvv",
    "cvc",
    "iban",
    "accountnumber",
    "routingnumber",
    "privatekey",
    "dateofbirth",
];

/// Normalized keys that are sensitive only on an exact match.
const SENSITIVE_EXACT_KEYS: &[&str] = &["pin", "dob", "otp"];

/// Stand-in for U+0000, which JSONB storage rejects.
pub const NUL_REPLACEMENT: &str = "\u{FFFD}";

/// Secret key for masking digests.
#[derive(Clone, PartialEq, Eq)]
pub struct MaskingSalt(Vec<u8>);

impl MaskingSalt {
    /// Creates a salt from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> AppResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AppError::Validation(
                "masking salt must not be empty".to_owned(),
            ));
        }

        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Debug for MaskingSalt {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("MaskingSalt(<redacted>)")
    }
}

/// Returns whether a payload key names sensitive content.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|character| character.to_ascii_lowercase())
        .collect::<String>();

    SENSITIVE_EXACT_KEYS.contains(&normalized.as_str())
        || SENSITIVE_KEY_FRAGMENTS
            .iter()
            .any(|fragment| normalized.contains(fragment))
}

/// Masks a single field value.
#[must_use]
pub fn mask_field(key: &str, value: &Value, salt: &MaskingSalt) -> Value {
    let plaintext = match value {
        Value::String(text) => text.clone(),
        other => canonicalize(other),
    };

    json!({
        "masked": true,
        "hash": keyed_hex(salt.as_bytes(), &[key, plaintext.as_str()]),
        "originalLength": plaintext.chars().count(),
    })
}

/// Recursive payload masker with value-level PII scrubbing.
pub struct PayloadMasker {
    email: Regex,
    ssn: Regex,
    card: Regex,
}

impl PayloadMasker {
    /// Compiles the scrubbing patterns.
    pub fn new() -> AppResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|error| {
                AppError::Internal(format!("invalid masking pattern '{pattern}': {error}"))
            })
        };

        Ok(Self {
            email: compile(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            ssn: compile(r"\b\d{3}-\d{2}-\d{4}\b")?,
            card: compile(r"\b(?:\d[ -]?){12,18}\d\b")?,
        })
    }

    /// Returns a masked copy of `value`.
    #[must_use]
    pub fn mask(&self, value: &Value, salt: &MaskingSalt) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, entry)| {
                        let masked = if is_sensitive_key(key) && !entry.is_null() {
                            mask_field(key, entry, salt)
                        } else {
                            self.mask(entry, salt)
                        };
                        (replace_nul(key), masked)
                    })
                    .collect::<Map<String, Value>>(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.mask(item, salt)).collect())
            }
            Value::String(text) => Value::String(self.scrub_text(text)),
            scalar => scalar.clone(),
        }
    }

    /// Replaces e-mail addresses, SSNs and Luhn-valid card numbers in free
    /// text. NUL characters become [`NUL_REPLACEMENT`].
    #[must_use]
    pub fn scrub_text(&self, text: &str) -> String {
        let text = replace_nul(text);
        let scrubbed = self.email.replace_all(&text, "[REDACTED:email]");
        let scrubbed = self.ssn.replace_all(&scrubbed, "[REDACTED:ssn]").into_owned();
        self.card
            .replace_all(&scrubbed, |captures: &Captures<'_>| {
                let candidate = &captures[0];
                if luhn_valid(candidate) {
                    "[REDACTED:card]".to_owned()
                } else {
                    candidate.to_owned()
                }
            })
            .into_owned()
    }
}

/// Returns `text` with every U+0000 replaced by [`NUL_REPLACEMENT`].
#[must_use]
pub fn replace_nul(text: &str) -> String {
    text.replace('\0', NUL_REPLACEMENT)
}

/// Applies [`replace_nul`] to every key and string of `value`.
#[must_use]
pub fn without_nul(value: Value) -> Value {
    match value {
        Value::String(text) if text.contains('\0') => Value::String(replace_nul(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(without_nul).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, entry)| (replace_nul(&key), without_nul(entry)))
                .collect(),
        ),
        other => other,
    }
}

/// Luhn checksum over the digits of `candidate`.
fn luhn_valid(candidate: &str) -> bool {
    let digits = candidate
        .chars()
        .filter_map(|character| character.to_digit(10))
        .collect::<Vec<_>>();
    if digits.len() < 13 {
        return false;
    }

    let sum = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(index, digit)| {
            if index % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                *digit
            }
        })
        .sum::<u32>();

    sum % 10 == 0
}

/// Truncates an IP address to its network prefix (IPv4 /24, IPv6 /48).
#[must_use]
pub fn anonymize_ip(value: &str) -> Option<String> {
    match value.trim().parse::<IpAddr>().ok()? {
        IpAddr::V4(address) => {
            let [first, second, third, _] = address.octets();
            Some(Ipv4Addr::new(first, second, third, 0).to_string())
        }
        IpAddr::V6(address) => {
            let segments = address.segments();
            Some(Ipv6Addr::new(segments[0], segments[1], segments[2], 0, 0, 0, 0, 0).to_string())
        }
    }
}
