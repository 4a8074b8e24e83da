//! Key agreement and field encryption.
//!
//! - [`ephemeral`]: single-use server key pairs with proactive expiry
//! - [`agreement`]: P-384 ECDH and the X9.63 / SHA-512 key derivation
//! - [`cipher`]: AEAD sealing of individual fields

pub mod agreement;
pub mod cipher;
pub mod ephemeral;

pub use agreement::{
    decode_public_key, derive_shared_key, derive_shared_key_with, encode_public_key,
    generate_private_key, public_key_bytes, SymmetricKey,
};
pub use cipher::FieldCipher;
pub use ephemeral::{EphemeralKeyConfig, EphemeralKeyStats, EphemeralKeyStore, IssuedKey};
