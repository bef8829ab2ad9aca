use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::SessionError;

/// Opaque session identifier handed to the client inside the signed cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a new random token (32 bytes from the OS RNG, base64url).
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails.
    pub fn generate() -> Result<Self, SessionError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionError::Token(e.to_string()))?;
        Ok(Self(Base64UrlUnpadded::encode_string(&bytes)))
    }

    pub(super) fn from_raw(raw: &str) -> Self {
        Self(raw.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key: SHA-256 of the raw token. Raw tokens never reach the
    /// session table.
    #[must_use]
    pub fn storage_key(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}
