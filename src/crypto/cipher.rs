//! Authenticated field encryption.
//!
//! Each sealed field is a single opaque blob:
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! A fresh random nonce is drawn for every call. Both suites take the same
//! 256-bit key produced by [`super::agreement`].

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::agreement::SymmetricKey;
use crate::types::{Result, TurnstileError};

// =============================================================================
// Constants
// =============================================================================

/// Nonce length for both suites (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Authentication tag length for both suites (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Smallest blob that can possibly open
pub const MIN_SEALED_LEN: usize = NONCE_LEN + AUTH_TAG_LEN;

// =============================================================================
// Cipher Suite
// =============================================================================

/// AEAD suite used to seal fields on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldCipher {
    /// AES-256 in Galois/Counter Mode
    #[default]
    Aes256Gcm,
    /// ChaCha20 with a Poly1305 authenticator
    ChaCha20Poly1305,
}

impl FieldCipher {
    /// Seal `plaintext` under `key`, returning `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = match self {
            Self::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into())
                .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext),
            Self::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.as_bytes().into())
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext),
        }
        .map_err(|e| TurnstileError::Internal(format!("Encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    /// Open a blob produced by [`FieldCipher::encrypt`].
    ///
    /// Returns `None` on any failure: short input, wrong key, or a modified
    /// byte anywhere in the blob. Callers cannot tell these apart.
    pub fn decrypt(&self, blob: &[u8], key: &SymmetricKey) -> Option<Zeroizing<Vec<u8>>> {
        if blob.len() < MIN_SEALED_LEN {
            return None;
        }
        let (nonce, sealed) = blob.split_at(NONCE_LEN);

        let opened = match self {
            Self::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into())
                .decrypt(aes_gcm::Nonce::from_slice(nonce), sealed),
            Self::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.as_bytes().into())
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce), sealed),
        };

        opened.ok().map(Zeroizing::new)
    }

    /// Configuration name of this suite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl fmt::Display for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldCipher {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-256-gcm" | "aes256gcm" | "aes-gcm" => Ok(Self::Aes256Gcm),
            "chacha20-poly1305" | "chacha20poly1305" | "chacha" => Ok(Self::ChaCha20Poly1305),
            other => Err(format!(
                "unknown field cipher '{other}' (expected aes-256-gcm or chacha20-poly1305)"
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
