use sha2::{Digest, Sha256};

const GRAVATAR_BASE: &str = "https://secure.gravatar.com/avatar";

/// Where users manage the image behind their gravatar.
pub const GRAVATAR_SETTINGS_URL: &str = "http://gravatar.com/emails";

/// Avatar URL keyed by the SHA-256 of the normalized email
pub fn gravatar_url(email: &str, size: u32) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());

    format!("{}/{}?s={}", GRAVATAR_BASE, hex::encode(digest), size)
}
