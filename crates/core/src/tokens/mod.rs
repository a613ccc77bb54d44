//! Bearer token codec.
//!
//! A [`SessionToken`] is the only capability a client holds. The server persists
//! nothing but its [`TokenHash`], so a leaked database cannot be replayed as
//! cookies.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::{Error, Result};

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of the unpadded URL-safe base64 form of [`TOKEN_BYTES`].
pub const TOKEN_ENCODED_LEN: usize = 43;

/// Length of the hex-encoded SHA-256 digest.
pub const TOKEN_HASH_LEN: usize = 64;

/// Opaque bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mints a fresh token from the operating system CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0_u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::Token(format!("entropy source unavailable: {}", e)))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Parses client input. Anything that is not a canonical token is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let value = input.trim();
        if value.len() != TOKEN_ENCODED_LEN {
            return None;
        }
        let decoded = URL_SAFE_NO_PAD.decode(value).ok()?;
        if decoded.len() != TOKEN_BYTES {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// The wire form handed to the client (cookie value, response body).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> TokenHash {
        TokenHash::of(self)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Storage key derived from a token: lowercase hex SHA-256 of its wire form.
///
/// Unsalted: the same cookie must resolve to the same row across restarts and
/// deployments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn of(token: &SessionToken) -> Self {
        let digest = Sha256::digest(token.as_str().as_bytes());
        Self(format!("{:x}", digest))
    }

    /// Rehydrates a hash read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix safe to put in log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
