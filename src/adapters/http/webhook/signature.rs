//! `X-Hub-Signature-256` verification.
//!
//! Meta signs every notification body with the app secret:
//! `sha256=<hex(HMAC-SHA256(app_secret, body))>`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const PREFIX: &str = "sha256=";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing X-Hub-Signature-256 header")]
    Missing,

    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature does not match body")]
    Mismatch,
}

/// Checks `header` against the HMAC of `body`.
pub fn verify_signature(
    app_secret: &Secret<String>,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let provided = header
        .trim()
        .strip_prefix(PREFIX)
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(SignatureError::Malformed)?;

    let expected = sign(app_secret, body).ok_or(SignatureError::Mismatch)?;
    if expected.as_slice().ct_eq(&provided).unwrap_u8() != 1 {
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}

/// `sha256=<hex>` header value for `body`.
pub fn signature_header(app_secret: &Secret<String>, body: &[u8]) -> Option<String> {
    sign(app_secret, body).map(|digest| format!("{}{}", PREFIX, hex::encode(digest)))
}

fn sign(app_secret: &Secret<String>, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(app_secret.expose_secret().as_bytes()).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}
