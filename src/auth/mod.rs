//! Authentication primitives
//!
//! Provides:
//! - Access and refresh token issuance and verification
//! - Password hashing with Argon2

pub mod password;
pub mod token;

pub use password::{hash_password, verify_against_dummy, verify_password};
pub use token::{
    extract_token_from_header, is_jwt_shaped, Audience, Claims, IssuedPair, SignedToken, TokenCodec,
    TokenCodecConfig, TokenSubject,
};
