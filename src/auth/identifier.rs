use std::{fmt, sync::Arc};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::auth::validation::normalize_email;

type HmacSha256 = Hmac<Sha256>;

/// Derives the stored `username` from an email address.
///
/// HMAC-SHA256 keyed with a server secret: the same email always maps to the
/// same digest, so lookups can recompute it, but the email cannot be recovered
/// or brute-forced without the key. Emails are trimmed and lowercased first.
#[derive(Clone)]
pub struct IdentifierHasher {
    key: Arc<[u8]>,
}

impl IdentifierHasher {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
        }
    }

    /// Lowercase hex, 64 chars.
    pub fn digest(&self, email: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(normalize_email(email).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for IdentifierHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierHasher")
            .field("key", &"<redacted>")
            .finish()
    }
}
