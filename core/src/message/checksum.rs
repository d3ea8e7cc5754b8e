// Integrity stamp: SHA-256 over the canonical form minus the checksum field

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::canonical::{value_to_canonical_bytes, CanonicalError};

/// Name of the field that carries the digest
pub const CHECKSUM_FIELD: &str = "checksum";

/// Length of a rendered digest (hex characters)
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Compute the checksum of a message-shaped value.
///
/// Any existing `checksum` field is ignored, so stamping twice yields the
/// same digest.
pub fn compute_checksum<T: Serialize + ?Sized>(message: &T) -> Result<String, CanonicalError> {
    let value = serde_json::to_value(message)?;
    checksum_of_value(value)
}

/// Verify the stored checksum of a message-shaped value.
///
/// Returns false when the field is missing, is not a string, or does not
/// match. Never errors: a value that cannot be hashed simply fails.
pub fn verify<T: Serialize + ?Sized>(message: &T) -> bool {
    let value = match serde_json::to_value(message) {
        Ok(value) => value,
        Err(_) => return false,
    };
    let stored = match value.get(CHECKSUM_FIELD).and_then(Value::as_str) {
        Some(stored) => stored.to_owned(),
        None => return false,
    };
    match checksum_of_value(value) {
        Ok(computed) => constant_time_eq(stored.as_bytes(), computed.as_bytes()),
        Err(_) => false,
    }
}

fn checksum_of_value(mut value: Value) -> Result<String, CanonicalError> {
    if let Value::Object(map) = &mut value {
        map.remove(CHECKSUM_FIELD);
    }
    let bytes = value_to_canonical_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Lowercase hex SHA-256 of raw bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, PatchOp};
    use serde_json::json;

    #[test]
    fn test_known_digest() {
        // sha256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_covers_canonical_form() {
        let msg = Message::full(1, "hi");
        let expected = sha256_hex(br#"{"seq":1,"text":"hi","type":"full"}"#);
        assert_eq!(compute_checksum(&msg).unwrap(), expected);
    }

    #[test]
    fn test_checksum_field_is_excluded() {
        let mut msg = Message::full(4, "body");
        let before = compute_checksum(&msg).unwrap();
        msg.checksum = Some("f".repeat(CHECKSUM_HEX_LEN));
        assert_eq!(compute_checksum(&msg).unwrap(), before);
    }

    #[test]
    fn test_verify_after_stamp() {
        let msg = Message::patch(2, vec![PatchOp::replace(0, "x")]).stamped().unwrap();
        assert!(verify(&msg));
    }

    #[test]
    fn test_verify_fails_after_mutation() {
        let mut msg = Message::full(5, "original").stamped().unwrap();
        msg.seq = 6;
        assert!(!verify(&msg));

        let mut msg = Message::full(5, "original").stamped().unwrap();
        msg.body = crate::message::MessageBody::Full {
            text: "originaL".into(),
        };
        assert!(!verify(&msg));
    }

    #[test]
    fn test_verify_without_checksum_fails() {
        assert!(!verify(&Message::full(1, "x")));
        assert!(!verify(&json!({"seq": 1, "checksum": 12})));
    }

    #[test]
    fn test_verify_raw_value_with_extra_fields() {
        let mut value = json!({"seq": 1, "type": "full", "text": "a", "editor": "v2"});
        let digest = compute_checksum(&value).unwrap();
        value["checksum"] = json!(digest);
        assert!(verify(&value));

        value["editor"] = json!("v3");
        assert!(!verify(&value));
    }

    #[test]
    fn test_tampered_payload_changes_digest() {
        let canonical = br#"{"seq":1,"text":"abc","type":"full"}"#.to_vec();
        let mut tampered = canonical.clone();
        tampered[18] ^= 0x01;

        let original = sha256_hex(&canonical);
        assert_ne!(sha256_hex(&tampered), original);
        assert_eq!(sha256_hex(&tampered), sha256_hex(&tampered));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
