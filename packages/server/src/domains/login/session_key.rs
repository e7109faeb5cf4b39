//! Session-key generation.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive an opaque, collision-resistant session key for a completed flow.
///
/// Phone number + nanosecond timestamp + random nonce, hashed and truncated.
/// Keys are never reused across records.
pub fn generate(phone_number: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let nonce = Uuid::new_v4();

    let mut hasher = Sha256::new();
    hasher.update(phone_number.as_bytes());
    hasher.update(nanos.to_be_bytes());
    hasher.update(nonce.as_bytes());

    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_opaque_hex_of_fixed_length() {
        let key = generate("+15551234567");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!key.contains("5551234567"), "key must not leak the phone number");
    }

    #[test]
    fn ten_thousand_completions_yield_unique_keys() {
        let mut seen = HashSet::new();
        for i in 0..10_000 {
            let phone = format!("+1555{:07}", i % 50);
            assert!(seen.insert(generate(&phone)), "duplicate session key");
        }
    }
}
