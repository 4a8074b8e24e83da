//! Request and response bodies for the session endpoints
//!
//! Binary fields travel as standard base64 strings. Sealed fields (the
//! password, the refresh token) stay as strings here and are decoded by the
//! protocol itself, so a corrupt encoding is handled like any other
//! undecryptable input.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::auth::Claims;
use crate::users::User;

/// Bytes carried as a base64 string.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for Base64Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Base64Bytes({} bytes)", self.0.len())
    }
}

impl Serialize for Base64Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Key exchange
// =============================================================================

/// Names a server key handle and the client public key to pair it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchange {
    #[serde(rename = "privateKeyID")]
    pub private_key_id: Uuid,
    pub public_key: Base64Bytes,
}

/// Response to a public key request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    #[serde(rename = "privateKeyID")]
    pub private_key_id: Uuid,
    pub public_key: Base64Bytes,
    /// Seconds until the handle expires
    pub expires_in: u64,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub birth_date: NaiveDate,
    /// Base64 of the sealed password
    pub password: String,
    /// Key exchange the password was sealed under
    pub key_exchange: KeyExchange,
    /// Client key the refresh token gets sealed to
    pub public_key_for_token: Base64Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    /// Base64 of the sealed password
    pub password: String,
    pub key_exchange: KeyExchange,
    pub public_key_for_token: Base64Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub access_token: String,
    /// Base64 of the refresh token, re-sealed under `key_exchange`
    pub refresh_token: String,
    pub key_exchange: KeyExchange,
    /// Client key for the new pair; defaults to `key_exchange.public_key`
    #[serde(default)]
    pub public_key_for_encryption: Option<Base64Bytes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutRequest {
    /// The plain refresh token, if the client still holds it
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub user_id: Uuid,
    pub user_slug: String,
    pub name: String,
}

impl From<&User> for ProfileSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            user_slug: user.slug.clone(),
            name: user.name.clone(),
        }
    }
}

/// A freshly minted pair.
///
/// `refresh_token.token` is base64 of the sealed refresh token; only the
/// holder of the client private key can open it, using `server_public_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: TokenEnvelope,
    pub refresh_token: TokenEnvelope,
    pub server_public_key: Base64Bytes,
    pub profile: ProfileSummary,
}

/// Result of a successful protected-route check.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub claims: Claims,
    pub user: User,
}
