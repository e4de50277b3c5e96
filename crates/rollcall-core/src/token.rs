//! Session tokens.
//!
//! A token is 32 lowercase hex characters: the first 16 bytes of
//! BLAKE3(random ‖ unix-nanos ‖ display name ‖ user). Tokens are bearer
//! identifiers, not secrets.

use std::time::{SystemTime, UNIX_EPOCH};

/// Exact length, in characters, of every valid token.
pub const TOKEN_LEN: usize = 32;

/// Issue a fresh token for a client identity. Does not register anything.
pub fn issue_token(display_name: &str, user: &str) -> String {
    let entropy: [u8; 16] = rand::random();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&entropy);
    hasher.update(&nanos.to_le_bytes());
    hasher.update(display_name.as_bytes());
    hasher.update(&[0]);
    hasher.update(user.as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..TOKEN_LEN / 2])
}

/// True if `token` has the only shape the registrar accepts.
pub fn has_valid_length(token: &str) -> bool {
    token.chars().count() == TOKEN_LEN
}
