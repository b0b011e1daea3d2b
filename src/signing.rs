//! Tamper-evident ticket tokens.
//!
//! Wire format: `<base64url(payload)>.<hex(hmac_sha256(secret, payload))>`.
//! The MAC is computed over the decoded payload bytes. Changing this format
//! invalidates every ticket already issued.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MAC_HEX_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Invalid signing key")]
    InvalidKey,
}

/// HMAC key. `Debug` never prints the value.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into().into_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(****)")
    }
}

#[derive(Clone, Debug)]
pub struct Signer {
    secret: SigningSecret,
}

impl Signer {
    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Result<HmacSha256, SigningError> {
        HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| SigningError::InvalidKey)
    }

    /// Sign already-canonicalized payload bytes.
    pub fn sign(&self, payload: &[u8]) -> Result<String, SigningError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", URL_SAFE.encode(payload), signature))
    }

    /// Verify a token and return the payload bytes it carries.
    pub fn verify(&self, token: &str) -> Result<Vec<u8>, SigningError> {
        let (encoded, signature_hex) = token
            .rsplit_once('.')
            .ok_or_else(|| SigningError::MalformedToken("expected two segments".to_string()))?;

        if encoded.is_empty() || encoded.contains('.') {
            return Err(SigningError::MalformedToken(
                "expected two segments".to_string(),
            ));
        }

        // Lowercase only: hex::decode accepts both cases, which would let a
        // case-flipped token verify.
        if signature_hex.len() != MAC_HEX_LEN
            || !signature_hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(SigningError::MalformedToken(
                "signature must be 64 lowercase hex characters".to_string(),
            ));
        }

        let payload = URL_SAFE
            .decode(encoded)
            .map_err(|e| SigningError::MalformedToken(format!("invalid base64: {}", e)))?;
        let expected = hex::decode(signature_hex)
            .map_err(|e| SigningError::MalformedToken(format!("invalid hex: {}", e)))?;

        // Constant-time comparison
        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&expected)
            .map_err(|_| SigningError::SignatureMismatch)?;

        Ok(payload)
    }
}
