//! HMAC-signed opaque session identifiers.
//!
//! The cookie value is `<token>.<hex(HMAC-SHA256(secret, token))>` where the
//! token is 32 random bytes in URL-safe base64. The token is opaque to the
//! user agent and names a cookie-jar partition; nothing else is derived from
//! it. Secret rotation is out of scope.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the signed session identifier.
pub const SESSION_COOKIE_NAME: &str = "px_session_id";

pub struct SessionManager {
    secret: Vec<u8>,
}

impl SessionManager {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn sign(&self, token: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Mint a fresh signed session cookie value.
    pub fn mint(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let signature = self.sign(&token);
        format!("{token}.{signature}")
    }

    /// Verify a signed cookie value and return the bare token.
    ///
    /// Split on the last `.`, recompute the HMAC, compare in constant time.
    /// Anything malformed returns `None`; the caller treats that as "no
    /// session presented".
    pub fn verify(&self, signed: &str) -> Option<String> {
        let (token, signature_hex) = signed.rsplit_once('.')?;
        if token.is_empty() {
            return None;
        }
        let provided = hex::decode(signature_hex).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(token.as_bytes());
        mac.verify_slice(&provided).ok()?;

        Some(token.to_string())
    }
}
