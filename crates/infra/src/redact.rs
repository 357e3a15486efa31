//! Log-safe identifiers for personal data.

use sha2::{Digest, Sha256};

const EMAIL_HASH_SALT: &[u8] = b"fluffer-attendee-email-salt";

/// Stable token for an email address that never reveals the address itself.
pub fn redact_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(EMAIL_HASH_SALT);
    hasher.update(email.trim().to_ascii_lowercase().as_bytes());
    let digest = hasher.finalize();
    format!("email_hash={}", hex::encode(&digest[..8]))
}
