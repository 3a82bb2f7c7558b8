use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generates a new opaque bearer token.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Hex encoded SHA-256 of a bearer token, the only form that is stored.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Extracts the token from an `Authorization` header value.
///
/// The `Bearer ` scheme prefix is optional.
pub fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if header.eq_ignore_ascii_case("bearer") => "",
        _ => header,
    };
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
