//! Access and refresh token handling
//!
//! Two audiences, each with its own HMAC key and lifetime:
//!
//! | Audience    | code | key id                     | default lifetime |
//! |-------------|------|----------------------------|------------------|
//! | full access | `0`  | `ACCESS_TOKEN_SECRET_KEY`  | 10 minutes       |
//! | refresh     | `1`  | `REFRESH_TOKEN_SECRET_KEY` | 7 days           |
//!
//! Tokens are signed with HS512 and carry the key id in the `kid` header, so
//! verification picks the key from the token itself and can tell a token
//! that was merely presented at the wrong place (`WrongAudience`) from one
//! that was never ours (`SignatureInvalid`).

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AuthError, Result, TurnstileError};

/// Key id for the full-access signing key
pub const ACCESS_KEY_ID: &str = "ACCESS_TOKEN_SECRET_KEY";

/// Key id for the refresh signing key
pub const REFRESH_KEY_ID: &str = "REFRESH_TOKEN_SECRET_KEY";

/// Minimum secret length outside dev mode
pub const MIN_SECRET_LEN: usize = 32;

const ALGORITHM: Algorithm = Algorithm::HS512;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Audience {
    FullAccess,
    Refresh,
}

impl Audience {
    /// Numeric audience code carried in `aud`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FullAccess => "0",
            Self::Refresh => "1",
        }
    }

    /// Signing key identifier carried in the `kid` header.
    pub fn key_id(&self) -> &'static str {
        match self {
            Self::FullAccess => ACCESS_KEY_ID,
            Self::Refresh => REFRESH_KEY_ID,
        }
    }

    pub fn from_key_id(kid: &str) -> Option<Self> {
        match kid {
            ACCESS_KEY_ID => Some(Self::FullAccess),
            REFRESH_KEY_ID => Some(Self::Refresh),
            _ => None,
        }
    }
}

/// Signed claim set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Profile slug of the user
    #[serde(rename = "userSlug")]
    pub user_slug: String,
    /// `[code, configured audience name]`
    pub aud: Vec<String>,
    /// Unique token ID
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Whether two claim sets name the same user and profile.
    pub fn same_subject(&self, other: &Claims) -> bool {
        self.sub == other.sub && self.user_slug == other.user_slug
    }

    /// Lifetime in seconds as signed.
    pub fn lifetime_secs(&self) -> i64 {
        self.exp - self.iat
    }
}

/// Who a token is issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub user_slug: String,
}

/// A signed token together with the claims that went into it.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh token minted together for one subject.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

/// Token codec configuration.
#[derive(Clone)]
pub struct TokenCodecConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub issuer: String,
    pub full_access_audience: String,
    pub refresh_audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodecConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("full_access_audience", &self.full_access_audience)
            .field("refresh_audience", &self.refresh_audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenCodecConfig {
    /// Insecure configuration for local development.
    pub fn dev() -> Self {
        Self {
            access_secret: b"dev-mode-access-secret-not-for-production-use".to_vec(),
            refresh_secret: b"dev-mode-refresh-secret-not-for-production-use".to_vec(),
            issuer: "turnstile".into(),
            full_access_audience: "full-access".into(),
            refresh_audience: "refresh".into(),
            access_ttl: Duration::from_secs(10 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

struct AudienceKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    name: String,
    ttl_secs: i64,
}

/// Issues and verifies access and refresh tokens.
///
/// Signing keys are fixed for the life of the process.
pub struct TokenCodec {
    access: AudienceKeys,
    refresh: AudienceKeys,
    issuer: String,
}

impl TokenCodec {
    /// Create a codec, rejecting short, missing or shared secrets.
    pub fn new(config: TokenCodecConfig) -> Result<Self> {
        for (name, secret) in [
            ("ACCESS_TOKEN_SECRET", &config.access_secret),
            ("REFRESH_TOKEN_SECRET", &config.refresh_secret),
        ] {
            if secret.is_empty() {
                return Err(TurnstileError::Config(format!(
                    "{name} is required in production mode"
                )));
            }
            if secret.len() < MIN_SECRET_LEN {
                return Err(TurnstileError::Config(format!(
                    "{name} must be at least {MIN_SECRET_LEN} bytes"
                )));
            }
        }
        if config.access_secret == config.refresh_secret {
            return Err(TurnstileError::Config(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".into(),
            ));
        }

        Self::build(config)
    }

    /// Create a codec with development secrets.
    pub fn new_dev() -> Self {
        let config = TokenCodecConfig::dev();
        Self {
            access: AudienceKeys {
                encoding: EncodingKey::from_secret(&config.access_secret),
                decoding: DecodingKey::from_secret(&config.access_secret),
                name: config.full_access_audience,
                ttl_secs: config.access_ttl.as_secs() as i64,
            },
            refresh: AudienceKeys {
                encoding: EncodingKey::from_secret(&config.refresh_secret),
                decoding: DecodingKey::from_secret(&config.refresh_secret),
                name: config.refresh_audience,
                ttl_secs: config.refresh_ttl.as_secs() as i64,
            },
            issuer: config.issuer,
        }
    }

    fn build(config: TokenCodecConfig) -> Result<Self> {
        let ttl = |d: Duration, name: &str| {
            i64::try_from(d.as_secs())
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| TurnstileError::Config(format!("{name} lifetime out of range")))
        };

        Ok(Self {
            access: AudienceKeys {
                encoding: EncodingKey::from_secret(&config.access_secret),
                decoding: DecodingKey::from_secret(&config.access_secret),
                name: config.full_access_audience,
                ttl_secs: ttl(config.access_ttl, "access token")?,
            },
            refresh: AudienceKeys {
                encoding: EncodingKey::from_secret(&config.refresh_secret),
                decoding: DecodingKey::from_secret(&config.refresh_secret),
                name: config.refresh_audience,
                ttl_secs: ttl(config.refresh_ttl, "refresh token")?,
            },
            issuer: config.issuer,
        })
    }

    fn keys(&self, audience: Audience) -> &AudienceKeys {
        match audience {
            Audience::FullAccess => &self.access,
            Audience::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens issued for `audience`.
    pub fn lifetime(&self, audience: Audience) -> Duration {
        Duration::from_secs(self.keys(audience).ttl_secs as u64)
    }

    /// Sign a fresh claim set for `subject` under `audience`'s key.
    pub fn issue(&self, subject: &TokenSubject, audience: Audience) -> Result<SignedToken> {
        self.issue_at(subject, audience, Utc::now())
    }

    fn issue_at(
        &self,
        subject: &TokenSubject,
        audience: Audience,
        now: DateTime<Utc>,
    ) -> Result<SignedToken> {
        let keys = self.keys(audience);
        let iat = now.timestamp();
        let exp = iat + keys.ttl_secs;

        let claims = Claims {
            sub: subject.user_id.to_string(),
            user_slug: subject.user_slug.clone(),
            aud: vec![audience.code().to_string(), keys.name.clone()],
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
        };

        let mut header = Header::new(ALGORITHM);
        header.kid = Some(audience.key_id().to_string());

        let token = encode(&header, &claims, &keys.encoding)
            .map_err(|e| TurnstileError::Internal(format!("Failed to sign token: {}", e)))?;

        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| TurnstileError::Internal("Token expiry out of range".into()))?;

        Ok(SignedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Mint an access and refresh token for the same subject.
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<IssuedPair> {
        let now = Utc::now();
        Ok(IssuedPair {
            access: self.issue_at(subject, Audience::FullAccess, now)?,
            refresh: self.issue_at(subject, Audience::Refresh, now)?,
        })
    }

    /// Verify signature, expiry and audience.
    pub fn verify(&self, token: &str, expected: Audience) -> std::result::Result<Claims, AuthError> {
        self.verify_inner(token, expected, true)
    }

    /// Verify signature and audience, ignoring expiry.
    ///
    /// Used for the access token presented at rotation, which has normally
    /// lapsed by then.
    pub fn verify_allow_expired(
        &self,
        token: &str,
        expected: Audience,
    ) -> std::result::Result<Claims, AuthError> {
        self.verify_inner(token, expected, false)
    }

    fn verify_inner(
        &self,
        token: &str,
        expected: Audience,
        check_expiry: bool,
    ) -> std::result::Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::SignatureInvalid);
        }
        let signed_for = header
            .kid
            .as_deref()
            .and_then(Audience::from_key_id)
            .ok_or(AuthError::SignatureInvalid)?;
        let keys = self.keys(signed_for);

        // Expiry is checked last so a live token of the wrong kind is never
        // reported as merely expired
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_audience(&[signed_for.code()]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        let claims = decode::<Claims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidAudience => AuthError::WrongAudience,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::SignatureInvalid
                }
                _ => AuthError::Malformed,
            })?;

        if signed_for != expected || !claims.aud.iter().any(|aud| *aud == keys.name) {
            return Err(AuthError::WrongAudience);
        }
        if check_expiry && claims.exp < Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Read claims without checking the signature, expiry or audience.
    ///
    /// Only for revocation bookkeeping on suspect tokens; never grant
    /// anything on the strength of its output.
    pub fn parse_unverified(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Malformed)
    }
}

/// True if `token` has the three non-empty dot-separated segments of a
/// compact JWT. Anything else cannot have been issued by us.
pub fn is_jwt_shaped(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        if segment.is_empty() {
            return false;
        }
        segments += 1;
    }
    segments == 3
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TokenCodecConfig {
        TokenCodecConfig {
            access_secret: b"test-access-secret-that-is-at-least-32-bytes".to_vec(),
            refresh_secret: b"test-refresh-secret-that-is-at-least-32-bytes".to_vec(),
            issuer: "turnstile-test".into(),
            full_access_audience: "full-access".into(),
            refresh_audience: "refresh".into(),
            access_ttl: Duration::from_secs(600),
            refresh_ttl: Duration::from_secs(604_800),
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(test_config()).unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            user_slug: "ada-lovelace".into(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let subject = subject();

        let access = codec.issue(&subject, Audience::FullAccess).unwrap();
        let claims = codec.verify(&access.token, Audience::FullAccess).unwrap();

        assert_eq!(claims.sub, subject.user_id.to_string());
        assert_eq!(claims.user_slug, "ada-lovelace");
        assert_eq!(claims.aud, vec!["0".to_string(), "full-access".to_string()]);
        assert_eq!(claims.iss, "turnstile-test");
        assert_eq!(claims.lifetime_secs(), 600);
        assert_eq!(access.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_pair_linkage_and_lifetimes() {
        let codec = codec();
        let pair = codec.issue_pair(&subject()).unwrap();

        assert!(pair.access.claims.same_subject(&pair.refresh.claims));
        assert_ne!(pair.access.claims.jti, pair.refresh.claims.jti);
        assert_eq!(pair.access.claims.lifetime_secs(), 600);
        assert_eq!(pair.refresh.claims.lifetime_secs(), 604_800);

        assert_eq!(
            codec.verify(&pair.access.token, Audience::Refresh),
            Err(AuthError::WrongAudience)
        );
        assert_eq!(
            codec.verify(&pair.refresh.token, Audience::FullAccess),
            Err(AuthError::WrongAudience)
        );
        assert!(codec.verify(&pair.refresh.token, Audience::Refresh).is_ok());
    }

    #[test]
    fn test_kid_header() {
        let codec = codec();
        let pair = codec.issue_pair(&subject()).unwrap();

        let header = decode_header(&pair.access.token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);
        assert_eq!(header.kid.as_deref(), Some(ACCESS_KEY_ID));

        let header = decode_header(&pair.refresh.token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(REFRESH_KEY_ID));
    }

    #[test]
    fn test_wrong_secret() {
        let token = codec().issue(&subject(), Audience::FullAccess).unwrap().token;

        let mut other = test_config();
        other.access_secret = b"a-completely-different-access-secret-32b+".to_vec();
        let other = TokenCodec::new(other).unwrap();

        assert_eq!(
            other.verify(&token, Audience::FullAccess),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let codec = codec();
        let token = codec.issue(&subject(), Audience::FullAccess).unwrap().token;

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let forged = codec.issue(&subject(), Audience::FullAccess).unwrap().token;
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        let spliced = parts.join(".");

        assert_eq!(
            codec.verify(&spliced, Audience::FullAccess),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_expired() {
        let codec = codec();
        let past = Utc::now() - chrono::Duration::seconds(601);
        let token = codec
            .issue_at(&subject(), Audience::FullAccess, past)
            .unwrap()
            .token;

        assert_eq!(
            codec.verify(&token, Audience::FullAccess),
            Err(AuthError::Expired)
        );
        assert!(codec.verify_allow_expired(&token, Audience::FullAccess).is_ok());
    }

    #[test]
    fn test_wrong_kind_reported_before_expiry() {
        let codec = codec();
        let past = Utc::now() - chrono::Duration::days(8);
        let token = codec
            .issue_at(&subject(), Audience::Refresh, past)
            .unwrap()
            .token;

        assert_eq!(
            codec.verify(&token, Audience::FullAccess),
            Err(AuthError::WrongAudience)
        );
        assert_eq!(codec.verify(&token, Audience::Refresh), Err(AuthError::Expired));
    }

    #[test]
    fn test_jwt_shape() {
        let token = codec().issue(&subject(), Audience::FullAccess).unwrap().token;
        assert!(is_jwt_shaped(&token));
        assert!(is_jwt_shaped("forged.token.value"));
        assert!(!is_jwt_shaped("garbage"));
        assert!(!is_jwt_shaped("a..c"));
        assert!(!is_jwt_shaped("a.b.c.d"));
        assert!(!is_jwt_shaped(""));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let token = codec().issue(&subject(), Audience::FullAccess).unwrap().token;

        let mut other = test_config();
        other.issuer = "someone-else".into();
        let other = TokenCodec::new(other).unwrap();

        assert!(other.verify(&token, Audience::FullAccess).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(
            codec.verify("not-a-token", Audience::FullAccess),
            Err(AuthError::Malformed)
        );
        assert_eq!(codec.parse_unverified("not-a-token"), Err(AuthError::Malformed));
    }

    #[test]
    fn test_parse_unverified_recovers_id() {
        let codec = codec();
        let past = Utc::now() - chrono::Duration::days(8);
        let issued = codec.issue_at(&subject(), Audience::Refresh, past).unwrap();

        // Signed by someone else entirely
        let mut other = test_config();
        other.refresh_secret = b"another-refresh-secret-at-least-32-bytes!".to_vec();
        let foreign = TokenCodec::new(other)
            .unwrap()
            .issue(&subject(), Audience::Refresh)
            .unwrap();

        assert_eq!(codec.parse_unverified(&issued.token).unwrap().jti, issued.claims.jti);
        assert_eq!(codec.parse_unverified(&foreign.token).unwrap().jti, foreign.claims.jti);
    }

    #[test]
    fn test_secret_validation() {
        let mut short = test_config();
        short.access_secret = b"short".to_vec();
        assert!(TokenCodec::new(short).is_err());

        let mut empty = test_config();
        empty.refresh_secret = Vec::new();
        assert!(TokenCodec::new(empty).is_err());

        let mut shared = test_config();
        shared.refresh_secret = shared.access_secret.clone();
        assert!(TokenCodec::new(shared).is_err());

        let mut zero_ttl = test_config();
        zero_ttl.access_ttl = Duration::ZERO;
        assert!(TokenCodec::new(zero_ttl).is_err());
    }

    #[test]
    fn test_dev_codec() {
        let codec = TokenCodec::new_dev();
        let pair = codec.issue_pair(&subject()).unwrap();
        assert!(codec.verify(&pair.access.token, Audience::FullAccess).is_ok());
        assert_eq!(codec.lifetime(Audience::Refresh), Duration::from_secs(604_800));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("test-access-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }
}
