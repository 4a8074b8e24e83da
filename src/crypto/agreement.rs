//! Elliptic-curve key agreement.
//!
//! # Algorithms
//!
//! - **Curve**: NIST P-384
//! - **Agreement**: ECDH over the affine x-coordinate
//! - **Derivation**: ANSI X9.63 KDF with SHA-512, empty shared info, 32-byte output
//!
//! Both sides compute the same key independently; no server-only secret
//! enters the derivation, so any standard client stack interoperates.

use p384::elliptic_curve::sec1::ToEncodedPoint;
use p384::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::AuthError;

// =============================================================================
// Constants
// =============================================================================

/// Raw `X || Y` public key length for P-384
pub const RAW_PUBLIC_KEY_LEN: usize = 96;

/// SEC1 uncompressed public key length (`0x04 || X || Y`)
pub const SEC1_UNCOMPRESSED_LEN: usize = 97;

/// Derived symmetric key length (256 bits)
pub const SYMMETRIC_KEY_LEN: usize = 32;

// =============================================================================
// Symmetric Key
// =============================================================================

/// A 256-bit symmetric key derived from an ECDH exchange.
///
/// Zeroized on drop; never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        // Only used by tests; fold without early exit
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SymmetricKey {}

// =============================================================================
// Key Generation and Encoding
// =============================================================================

/// Generate a fresh P-384 private key from the OS RNG.
pub fn generate_private_key() -> SecretKey {
    SecretKey::random(&mut OsRng)
}

/// Encode a public key in the 96-byte raw `X || Y` form handed to clients.
pub fn encode_public_key(public_key: &PublicKey) -> Vec<u8> {
    let point = public_key.to_encoded_point(false);
    // Uncompressed SEC1 always carries the 0x04 tag byte first
    point.as_bytes()[1..].to_vec()
}

/// Public half of a private key, raw-encoded.
pub fn public_key_bytes(private_key: &SecretKey) -> Vec<u8> {
    encode_public_key(&private_key.public_key())
}

/// Parse a client public key.
///
/// Accepts the raw 96-byte `X || Y` form as well as SEC1 uncompressed and
/// compressed encodings. Anything else, including points not on the curve,
/// fails with [`AuthError::InvalidKey`].
pub fn decode_public_key(bytes: &[u8]) -> Result<PublicKey, AuthError> {
    let parsed = if bytes.len() == RAW_PUBLIC_KEY_LEN {
        let mut sec1 = Vec::with_capacity(SEC1_UNCOMPRESSED_LEN);
        sec1.push(0x04);
        sec1.extend_from_slice(bytes);
        PublicKey::from_sec1_bytes(&sec1)
    } else {
        PublicKey::from_sec1_bytes(bytes)
    };

    parsed.map_err(|_| AuthError::InvalidKey)
}

// =============================================================================
// Agreement
// =============================================================================

/// Derive the shared symmetric key from our private key and the peer's
/// encoded public key.
pub fn derive_shared_key(
    private_key: &SecretKey,
    peer_public_key: &[u8],
) -> Result<SymmetricKey, AuthError> {
    let peer = decode_public_key(peer_public_key)?;
    Ok(derive_shared_key_with(private_key, &peer))
}

/// Derive the shared symmetric key from an already-parsed peer key.
pub fn derive_shared_key_with(private_key: &SecretKey, peer_public_key: &PublicKey) -> SymmetricKey {
    let shared = p384::ecdh::diffie_hellman(
        private_key.to_nonzero_scalar(),
        peer_public_key.as_affine(),
    );

    x963_kdf(shared.raw_secret_bytes().as_slice(), &[])
}

/// ANSI X9.63 key derivation over SHA-512.
///
/// `K = H(Z || counter_be32 || shared_info)` for counter = 1, 2, ... until
/// enough output has been produced. One SHA-512 block covers our 32 bytes.
fn x963_kdf(shared_secret: &[u8], shared_info: &[u8]) -> SymmetricKey {
    let mut output = [0u8; SYMMETRIC_KEY_LEN];
    let mut counter: u32 = 1;
    let mut offset = 0;

    while offset < output.len() {
        let mut hasher = Sha512::new();
        hasher.update(shared_secret);
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_info);
        let mut block = hasher.finalize();

        let take = (output.len() - offset).min(block.len());
        output[offset..offset + take].copy_from_slice(&block[..take]);
        block.as_mut_slice().zeroize();

        offset += take;
        counter += 1;
    }

    SymmetricKey(output)
}

// =============================================================================
// Tests
// =============================================================================
