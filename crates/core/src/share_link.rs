//! Signed, time-limited capability links for stored artifacts.
//!
//! A link grants read access to one stored file until its expiry. Validity is
//! a pure function of `(filename, expiry, signature, secret, now)`:
//!
//! ```text
//! signature = hex(HMAC-SHA256(secret, "{filename}:{expiry}"))
//! ```
//!
//! Verification never consults the metadata store.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime a link may be issued with by default (7 days).
pub const DEFAULT_MAX_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Why a presented link was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("invalid link signature")]
    InvalidSignature,

    #[error("link expired")]
    Expired,

    #[error("malformed link: {0}")]
    Malformed(String),
}

/// The three values embedded in a capability link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareToken {
    pub filename: String,
    /// Unix timestamp (seconds) after which the link is refused.
    pub expiry: i64,
    /// Lowercase hex HMAC-SHA256 digest.
    pub signature: String,
}

impl ShareToken {
    /// Render the token as `{base_url}/videos/share/{filename}?expiry=..&signature=..`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/videos/share/{}?expiry={}&signature={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&self.filename),
            self.expiry,
            self.signature
        )
    }
}

/// Issues and verifies capability links with a process-wide secret.
#[derive(Clone)]
pub struct ShareSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for ShareSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareSigner").finish_non_exhaustive()
    }
}

impl ShareSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, filename: &str, expiry: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(format!("{filename}:{expiry}").as_bytes());
        mac
    }

    /// Hex signature over `"{filename}:{expiry}"`.
    pub fn sign(&self, filename: &str, expiry: i64) -> String {
        hex::encode(self.mac(filename, expiry).finalize().into_bytes())
    }

    /// Build a token for `filename` valid for `ttl_secs` from `now`.
    pub fn issue(&self, filename: &str, ttl_secs: i64, now: i64) -> ShareToken {
        let expiry = now.saturating_add(ttl_secs);
        ShareToken {
            filename: filename.to_string(),
            expiry,
            signature: self.sign(filename, expiry),
        }
    }

    /// Check a presented link.
    ///
    /// The signature is compared in constant time and checked before the
    /// expiry. A link is still valid at exactly `now == expiry`.
    pub fn verify(
        &self,
        filename: &str,
        expiry: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), LinkError> {
        let presented = hex::decode(signature).ok_or(LinkError::InvalidSignature)?;
        self.mac(filename, expiry)
            .verify_slice(&presented)
            .map_err(|_| LinkError::InvalidSignature)?;

        if now > expiry {
            return Err(LinkError::Expired);
        }
        Ok(())
    }
}

/// Validate a requested link lifetime.
pub fn validate_ttl(ttl_secs: i64, max_ttl_secs: i64) -> Result<(), CoreError> {
    if ttl_secs <= 0 {
        return Err(CoreError::Validation(format!(
            "expiryTime must be a positive number of seconds, got {ttl_secs}"
        )));
    }
    if ttl_secs > max_ttl_secs {
        return Err(CoreError::Validation(format!(
            "expiryTime must not exceed {max_ttl_secs} seconds, got {ttl_secs}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// hex helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Decode a hex string, or `None` if it is not valid hex.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
            .collect()
    }
}
