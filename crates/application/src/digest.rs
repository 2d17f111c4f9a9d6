use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

const FIELD_SEPARATOR: u8 = 0x1f;

/// SHA-256 over the provided parts, separated so that `("ab", "c")` and
/// `("a", "bc")` never collide. Returns lowercase hex.
pub(crate) fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 keyed by `salt` over the provided parts. Returns lowercase hex.
pub(crate) fn keyed_hex(salt: &[u8], parts: &[&str]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match Hmac::<Sha256>::new_from_slice(salt) {
        Ok(mac) => mac,
        Err(_) => return sha256_hex(parts),
    };

    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            mac.update(&[FIELD_SEPARATOR]);
        }
        mac.update(part.as_bytes());
    }

    hex::encode(mac.finalize().into_bytes())
}
