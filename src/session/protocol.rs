//! Sign-up, sign-in, refresh rotation, sign-out and the protected-route check.
//!
//! # Rotation
//!
//! ```text
//! open sealed refresh token ──fail──► burn access token, 401
//!        │
//! verify both tokens ─────────fail──► burn both, 401
//!        │
//! either already revoked? ────yes───► burn both, log user out, 401 (replay)
//!        │
//! same subject, live user? ───no────► 401, nothing revoked
//!        │
//! revoke both (must both land) ─fail─► 503, no new pair
//!        │
//! mint and seal new pair
//! ```
//!
//! Old tokens are revoked before the new pair exists, so a client that
//! disconnects mid-rotation never ends up with two live pairs.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use p384::PublicKey;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use super::wire::{
    AuthenticatedSession, KeyExchange, ProfileSummary, PublicKeyResponse, RefreshRequest,
    SignInRequest, SignOutRequest, SignUpRequest, TokenEnvelope, TokenPairResponse,
};
use crate::auth::{
    hash_password, is_jwt_shaped, verify_against_dummy, verify_password, Audience, Claims,
    TokenCodec, TokenSubject,
};
use crate::crypto::{
    decode_public_key, derive_shared_key_with, generate_private_key, public_key_bytes,
    EphemeralKeyStore, FieldCipher,
};
use crate::ledger::{RevocationLedger, RevocationTarget};
use crate::types::{AuthError, Result, TurnstileError};
use crate::users::{NewUser, User, UserStore};

/// Session orchestration over the key store, token codec, ledger and users.
pub struct SessionProtocol {
    keys: EphemeralKeyStore,
    tokens: Arc<TokenCodec>,
    ledger: RevocationLedger,
    users: Arc<dyn UserStore>,
    cipher: FieldCipher,
}

impl SessionProtocol {
    pub fn new(
        keys: EphemeralKeyStore,
        tokens: Arc<TokenCodec>,
        ledger: RevocationLedger,
        users: Arc<dyn UserStore>,
        cipher: FieldCipher,
    ) -> Self {
        Self {
            keys,
            tokens,
            ledger,
            users,
            cipher,
        }
    }

    pub fn keys(&self) -> &EphemeralKeyStore {
        &self.keys
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub fn ledger(&self) -> &RevocationLedger {
        &self.ledger
    }

    pub fn cipher(&self) -> FieldCipher {
        self.cipher
    }

    // =========================================================================
    // Key exchange
    // =========================================================================

    /// Hand out a fresh server public key and its handle.
    pub async fn request_key(&self) -> PublicKeyResponse {
        let issued = self.keys.request().await;
        PublicKeyResponse {
            private_key_id: issued.handle,
            public_key: issued.public_key.into(),
            expires_in: issued.expires_in.as_secs(),
        }
    }

    /// Consume the exchange's handle and open a base64 sealed field.
    async fn open_sealed(
        &self,
        exchange: &KeyExchange,
        sealed: &str,
    ) -> std::result::Result<Zeroizing<String>, AuthError> {
        let private_key = self.keys.consume(&exchange.private_key_id).await?;
        let client_key = decode_public_key(exchange.public_key.as_slice())?;
        let blob = STANDARD
            .decode(sealed.trim())
            .map_err(|_| AuthError::Malformed)?;

        let shared = derive_shared_key_with(&private_key, &client_key);
        let mut opened = self
            .cipher
            .decrypt(&blob, &shared)
            .ok_or(AuthError::DecryptionFailed)?;

        match String::from_utf8(std::mem::take(&mut *opened)) {
            Ok(text) => Ok(Zeroizing::new(text)),
            Err(err) => {
                err.into_bytes().zeroize();
                Err(AuthError::Malformed)
            }
        }
    }

    // =========================================================================
    // Sign-up / sign-in
    // =========================================================================

    /// Register an account and issue its first pair.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<TokenPairResponse> {
        let token_key = decode_public_key(request.public_key_for_token.as_slice())
            .map_err(|reason| rejected("sign-up", reason))?;
        let password = self
            .open_sealed(&request.key_exchange, &request.password)
            .await
            .map_err(|reason| rejected("sign-up", reason))?;

        if password.is_empty() {
            return Err(TurnstileError::BadRequest("password is required".into()));
        }

        let user = self
            .users
            .create(NewUser {
                name: request.name,
                email: request.email,
                birth_date: request.birth_date,
                password_hash: hash_password(&password)?,
            })
            .await?;

        info!(user_id = %user.id, "Sign-up complete");
        self.mint(&user, &token_key)
    }

    /// Check credentials and issue a pair.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<TokenPairResponse> {
        let token_key = decode_public_key(request.public_key_for_token.as_slice())
            .map_err(|reason| rejected("sign-in", reason))?;
        let password = self
            .open_sealed(&request.key_exchange, &request.password)
            .await
            .map_err(|reason| rejected("sign-in", reason))?;

        let Some(user) = self.users.find_by_credential(&request.email).await? else {
            verify_against_dummy(&password);
            return Err(rejected("sign-in", AuthError::NotFound("user")));
        };

        if !verify_password(&password, &user.password_hash)? {
            return Err(rejected("sign-in", AuthError::InvalidCredentials));
        }

        self.users.set_logged_in(&user.id, true).await?;
        info!(user_id = %user.id, "Sign-in complete");
        self.mint(&user, &token_key)
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    /// Exchange a valid pair for a new one, revoking the old pair first.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPairResponse> {
        let access_value = request.access_token.trim();

        let refresh_value = match self
            .open_sealed(&request.key_exchange, &request.refresh_token)
            .await
        {
            Ok(value) => value,
            Err(reason @ AuthError::NotFound(_)) => return Err(rejected("refresh", reason)),
            Err(reason) => {
                // Can't see inside the blob: assume the pair is compromised
                self.burn(self.access_target(access_value)).await;
                return Err(rejected("refresh", reason));
            }
        };
        let refresh_value = refresh_value.trim();

        let encryption_key = request
            .public_key_for_encryption
            .as_ref()
            .unwrap_or(&request.key_exchange.public_key);
        let new_client_key = match decode_public_key(encryption_key.as_slice()) {
            Ok(key) => key,
            Err(reason) => {
                self.burn(self.access_target(access_value)).await;
                return Err(rejected("refresh", reason));
            }
        };

        let access = self
            .tokens
            .verify_allow_expired(access_value, Audience::FullAccess);
        let refresh = self.tokens.verify(refresh_value, Audience::Refresh);
        let (access_claims, refresh_claims) = match (access, refresh) {
            (Ok(access), Ok(refresh)) => (access, refresh),
            (access, refresh) => {
                let reason = access
                    .as_ref()
                    .err()
                    .or(refresh.as_ref().err())
                    .cloned()
                    .unwrap_or(AuthError::Malformed);
                self.burn(
                    self.target_for(&access, access_value)
                        .into_iter()
                        .chain(self.target_for(&refresh, refresh_value)),
                )
                .await;
                return Err(rejected("refresh", reason));
            }
        };

        let access_target = RevocationTarget::new(&access_claims.jti, access_value);
        let refresh_target = RevocationTarget::new(&refresh_claims.jti, refresh_value);

        let (access_valid, refresh_valid) = tokio::join!(
            self.ledger
                .is_valid(&access_target.token_id, &access_target.token_value),
            self.ledger
                .is_valid(&refresh_target.token_id, &refresh_target.token_value),
        );
        if !(access_valid? && refresh_valid?) {
            self.terminate(&refresh_claims, [access_target, refresh_target])
                .await;
            return Err(rejected("refresh", AuthError::Revoked));
        }

        if !access_claims.same_subject(&refresh_claims) {
            return Err(rejected("refresh", AuthError::ClaimsMismatch));
        }
        let user = match self.live_user(&refresh_claims).await {
            Ok(user) => user,
            Err(TurnstileError::Unauthorized(reason)) => return Err(rejected("refresh", reason)),
            Err(err) => return Err(err),
        };

        // Revoking the old pair is the claim on it: only the first of two
        // concurrent rotations gets to mint
        if !self
            .ledger
            .revoke_pair(&access_target, &refresh_target)
            .await?
        {
            self.terminate(&refresh_claims, [access_target, refresh_target])
                .await;
            return Err(rejected("refresh", AuthError::Revoked));
        }
        info!(
            user_id = %user.id,
            old_access_id = %access_target.token_id,
            old_refresh_id = %refresh_target.token_id,
            "Token pair rotated"
        );

        self.mint(&user, &new_client_key)
    }

    // =========================================================================
    // Sign-out and protected routes
    // =========================================================================

    /// Revoke the presented access token, and the refresh token if given,
    /// then mark the account logged out.
    ///
    /// An access token that has merely expired is still accepted here, so a
    /// client can always retire its refresh token.
    pub async fn sign_out(&self, access_token: &str, request: SignOutRequest) -> Result<()> {
        let access_value = access_token.trim();
        let refresh_target = request
            .refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .and_then(|refresh| {
                let verified = self.tokens.verify(refresh, Audience::Refresh);
                if let Err(reason) = &verified {
                    debug!(reason = %reason, "Refresh token at sign-out did not verify");
                }
                self.target_for(&verified, refresh)
            });

        let claims = match self
            .tokens
            .verify_allow_expired(access_value, Audience::FullAccess)
        {
            Ok(claims) => claims,
            Err(reason) => {
                self.burn(
                    self.unverified_target(access_value)
                        .into_iter()
                        .chain(refresh_target),
                )
                .await;
                return Err(rejected("sign-out", reason));
            }
        };

        let access_target = RevocationTarget::new(&claims.jti, access_value);
        if !self
            .ledger
            .is_valid(&access_target.token_id, &access_target.token_value)
            .await?
        {
            self.burn(std::iter::once(access_target).chain(refresh_target))
                .await;
            return Err(rejected("sign-out", AuthError::Revoked));
        }

        let targets: Vec<_> = std::iter::once(access_target)
            .chain(refresh_target)
            .collect();
        self.ledger.revoke_all(&targets).await?;

        let user_id = subject_id(&claims).map_err(|reason| rejected("sign-out", reason))?;
        match self.users.set_logged_in(&user_id, false).await {
            Ok(()) => {}
            Err(TurnstileError::NotFound(_)) => {
                warn!(user_id = %user_id, "Signed-out token names no account");
            }
            Err(err) => return Err(err),
        }

        info!(user_id = %user_id, revoked = targets.len(), "Signed out");
        Ok(())
    }

    /// Gate for every protected request: verify, ledger check, liveness.
    pub async fn authorize(&self, token: &str) -> Result<AuthenticatedSession> {
        let token = token.trim();
        let claims = match self.tokens.verify(token, Audience::FullAccess) {
            Ok(claims) => claims,
            Err(reason @ (AuthError::SignatureInvalid | AuthError::Malformed)) => {
                self.burn(suspect_target(token)).await;
                return Err(rejected("authorize", reason));
            }
            Err(reason) => return Err(rejected("authorize", reason)),
        };

        let target = RevocationTarget::new(&claims.jti, token);
        if !self
            .ledger
            .is_valid(&target.token_id, &target.token_value)
            .await?
        {
            // May only be known by value so far; record the ID as well
            self.burn(Some(target)).await;
            return Err(rejected("authorize", AuthError::Revoked));
        }

        match self.live_user(&claims).await {
            Ok(user) => Ok(AuthenticatedSession { claims, user }),
            Err(TurnstileError::Unauthorized(reason)) => {
                self.burn(Some(target)).await;
                Err(rejected("authorize", reason))
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The account named by `claims`, if it still matches and is logged in.
    async fn live_user(&self, claims: &Claims) -> Result<User> {
        let user_id = subject_id(claims)?;
        let user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::NotFound("user"))?;

        if user.slug != claims.user_slug || !self.users.is_logged_in(&user.id).await? {
            return Err(AuthError::ClaimsMismatch.into());
        }
        Ok(user)
    }

    /// Revocation target for a token whose verification may have failed.
    fn target_for(
        &self,
        verified: &std::result::Result<Claims, AuthError>,
        value: &str,
    ) -> Option<RevocationTarget> {
        match verified {
            Ok(claims) => Some(RevocationTarget::new(&claims.jti, value)),
            Err(_) => self.unverified_target(value),
        }
    }

    fn unverified_target(&self, value: &str) -> Option<RevocationTarget> {
        match self.tokens.parse_unverified(value) {
            Ok(claims) => Some(RevocationTarget::new(claims.jti, value)),
            Err(_) => suspect_target(value),
        }
    }

    fn access_target(&self, value: &str) -> Option<RevocationTarget> {
        let verified = self
            .tokens
            .verify_allow_expired(value, Audience::FullAccess);
        self.target_for(&verified, value)
    }

    /// Best-effort revocation on a path that is failing anyway.
    async fn burn(&self, targets: impl IntoIterator<Item = RevocationTarget>) {
        let targets: Vec<_> = targets.into_iter().collect();
        if targets.is_empty() {
            return;
        }
        if let Err(err) = self.ledger.revoke_all(&targets).await {
            error!(error = %err, "Failed to revoke suspect tokens");
        }
    }

    /// Replay handling: kill both halves of the pair and log the owner out.
    async fn terminate(&self, claims: &Claims, targets: [RevocationTarget; 2]) {
        warn!(
            user_id = %claims.sub,
            access_id = %targets[0].token_id,
            refresh_id = %targets[1].token_id,
            "Revoked token presented for rotation, terminating session"
        );
        self.burn(targets).await;
        if let Ok(user_id) = subject_id(claims) {
            if let Err(err) = self.users.set_logged_in(&user_id, false).await {
                warn!(user_id = %user_id, error = %err, "Failed to clear logged-in flag");
            }
        }
    }

    /// Mint a pair for `user` and seal the refresh token to `client_key`.
    ///
    /// The server half of the sealing exchange and the derived key are
    /// dropped (and zeroized) on return.
    fn mint(&self, user: &User, client_key: &PublicKey) -> Result<TokenPairResponse> {
        let subject = TokenSubject {
            user_id: user.id,
            user_slug: user.slug.clone(),
        };
        let pair = self.tokens.issue_pair(&subject)?;

        let server_key = generate_private_key();
        let shared = derive_shared_key_with(&server_key, client_key);
        let sealed = self.cipher.encrypt(pair.refresh.token.as_bytes(), &shared)?;

        debug!(
            user_id = %user.id,
            access_id = %pair.access.claims.jti,
            refresh_id = %pair.refresh.claims.jti,
            "Issued token pair"
        );

        Ok(TokenPairResponse {
            access_token: TokenEnvelope {
                token: pair.access.token,
                expires_at: pair.access.expires_at,
            },
            refresh_token: TokenEnvelope {
                token: STANDARD.encode(sealed),
                expires_at: pair.refresh.expires_at,
            },
            server_public_key: public_key_bytes(&server_key).into(),
            profile: ProfileSummary::from(user),
        })
    }
}

/// Unknown-ID target for material that at least looks like one of our
/// tokens. Other junk is not worth a journal write.
fn suspect_target(value: &str) -> Option<RevocationTarget> {
    if is_jwt_shaped(value) {
        Some(RevocationTarget::unknown(value))
    } else {
        debug!("Ignoring bearer material that is not a token");
        None
    }
}

fn subject_id(claims: &Claims) -> std::result::Result<Uuid, AuthError> {
    Uuid::parse_str(&claims.sub).map_err(|_| AuthError::ClaimsMismatch)
}

/// Log the precise reason, hand back the opaque error.
fn rejected(operation: &'static str, reason: AuthError) -> TurnstileError {
    warn!(operation, reason = %reason, "Authentication rejected");
    TurnstileError::Unauthorized(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_shared_key;
    use crate::users::MemoryUserStore;
    use chrono::NaiveDate;
    use p384::SecretKey;

    struct Harness {
        protocol: SessionProtocol,
        users: Arc<MemoryUserStore>,
    }

    fn harness() -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let protocol = SessionProtocol::new(
            EphemeralKeyStore::with_defaults(),
            Arc::new(TokenCodec::new_dev()),
            RevocationLedger::in_memory(),
            users.clone(),
            FieldCipher::default(),
        );
        Harness { protocol, users }
    }

    /// Seal `plaintext` the way a client would, against a fresh server key.
    async fn seal(protocol: &SessionProtocol, plaintext: &str) -> (KeyExchange, String) {
        let offered = protocol.request_key().await;
        let client = generate_private_key();
        let shared = derive_shared_key(&client, offered.public_key.as_slice()).unwrap();
        let blob = protocol.cipher().encrypt(plaintext.as_bytes(), &shared).unwrap();
        (
            KeyExchange {
                private_key_id: offered.private_key_id,
                public_key: public_key_bytes(&client).into(),
            },
            STANDARD.encode(blob),
        )
    }

    fn open_refresh(client: &SecretKey, pair: &TokenPairResponse, cipher: FieldCipher) -> String {
        let shared = derive_shared_key(client, pair.server_public_key.as_slice()).unwrap();
        let blob = STANDARD.decode(&pair.refresh_token.token).unwrap();
        let opened = cipher.decrypt(&blob, &shared).unwrap();
        String::from_utf8(opened.to_vec()).unwrap()
    }

    async fn sign_up(h: &Harness, client: &SecretKey) -> TokenPairResponse {
        let (key_exchange, password) = seal(&h.protocol, "Abc123!@").await;
        h.protocol
            .sign_up(SignUpRequest {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                birth_date: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
                password,
                key_exchange,
                public_key_for_token: public_key_bytes(client).into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_issues_openable_pair() {
        let h = harness();
        let client = generate_private_key();
        let pair = sign_up(&h, &client).await;

        let refresh = open_refresh(&client, &pair, h.protocol.cipher());
        let claims = h.protocol.tokens().verify(&refresh, Audience::Refresh).unwrap();
        assert_eq!(claims.user_slug, "ada-lovelace");
        assert_eq!(pair.profile.user_slug, "ada-lovelace");

        let session = h.protocol.authorize(&pair.access_token.token).await.unwrap();
        assert_eq!(session.user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_is_opaque() {
        let h = harness();
        let client = generate_private_key();
        sign_up(&h, &client).await;

        let (key_exchange, password) = seal(&h.protocol, "wrong-password").await;
        let err = h
            .protocol
            .sign_in(SignInRequest {
                email: "ada@example.com".into(),
                password,
                key_exchange,
                public_key_for_token: public_key_bytes(&client).into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.auth_reason(), Some(&AuthError::InvalidCredentials));
        assert_eq!(err.public_message(), "Unauthorized");

        let (key_exchange, password) = seal(&h.protocol, "Abc123!@").await;
        let err = h
            .protocol
            .sign_in(SignInRequest {
                email: "nobody@example.com".into(),
                password,
                key_exchange,
                public_key_for_token: public_key_bytes(&client).into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.auth_reason(), Some(&AuthError::NotFound("user")));
        assert_eq!(err.public_message(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_handle_cannot_be_reused_for_sign_in() {
        let h = harness();
        let client = generate_private_key();
        sign_up(&h, &client).await;

        let (key_exchange, password) = seal(&h.protocol, "Abc123!@").await;
        let request = SignInRequest {
            email: "ada@example.com".into(),
            password,
            key_exchange,
            public_key_for_token: public_key_bytes(&client).into(),
        };

        assert!(h.protocol.sign_in(request.clone()).await.is_ok());
        let err = h.protocol.sign_in(request).await.unwrap_err();
        assert_eq!(err.auth_reason(), Some(&AuthError::NotFound("key handle")));
    }

    #[tokio::test]
    async fn test_authorize_burns_forged_token() {
        let h = harness();
        let err = h.protocol.authorize("forged.token.value").await.unwrap_err();
        assert!(err.auth_reason().is_some());
        assert!(!h
            .protocol
            .ledger()
            .is_valid("anything", "forged.token.value")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_authorize_does_not_record_non_token_junk() {
        let h = harness();
        for junk in ["garbage", "a..b", "", "x.y.z.w"] {
            let err = h.protocol.authorize(junk).await.unwrap_err();
            assert_eq!(err.auth_reason(), Some(&AuthError::Malformed));
        }
        assert_eq!(h.protocol.ledger().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_authorize_after_logout_flag_revokes_token() {
        let h = harness();
        let client = generate_private_key();
        let pair = sign_up(&h, &client).await;

        h.users
            .set_logged_in(&pair.profile.user_id, false)
            .await
            .unwrap();

        let err = h.protocol.authorize(&pair.access_token.token).await.unwrap_err();
        assert_eq!(err.auth_reason(), Some(&AuthError::ClaimsMismatch));

        // Stays dead even after the flag comes back
        h.users
            .set_logged_in(&pair.profile.user_id, true)
            .await
            .unwrap();
        let err = h.protocol.authorize(&pair.access_token.token).await.unwrap_err();
        assert_eq!(err.auth_reason(), Some(&AuthError::Revoked));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_both_and_logs_out() {
        let h = harness();
        let client = generate_private_key();
        let pair = sign_up(&h, &client).await;
        let refresh = open_refresh(&client, &pair, h.protocol.cipher());

        h.protocol
            .sign_out(
                &pair.access_token.token,
                SignOutRequest {
                    refresh_token: Some(refresh.clone()),
                },
            )
            .await
            .unwrap();

        let ledger = h.protocol.ledger();
        assert!(!ledger.is_valid("x", &pair.access_token.token).await.unwrap());
        assert!(!ledger.is_valid("x", &refresh).await.unwrap());
        assert!(!h.users.is_logged_in(&pair.profile.user_id).await.unwrap());
        assert!(h.protocol.authorize(&pair.access_token.token).await.is_err());
    }

    #[tokio::test]
    async fn test_sign_out_burns_unverifiable_refresh_material() {
        let h = harness();
        let client = generate_private_key();
        let pair = sign_up(&h, &client).await;

        h.protocol
            .sign_out(
                &pair.access_token.token,
                SignOutRequest {
                    refresh_token: Some("forged.refresh.value".into()),
                },
            )
            .await
            .unwrap();

        let ledger = h.protocol.ledger();
        assert!(!ledger.is_valid("x", "forged.refresh.value").await.unwrap());
        assert_eq!(ledger.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sign_out_skips_non_token_refresh_material() {
        let h = harness();
        let client = generate_private_key();
        let pair = sign_up(&h, &client).await;

        h.protocol
            .sign_out(
                &pair.access_token.token,
                SignOutRequest {
                    refresh_token: Some("garbage-refresh".into()),
                },
            )
            .await
            .unwrap();

        // Only the access token is recorded
        let ledger = h.protocol.ledger();
        assert_eq!(ledger.len().await.unwrap(), 1);
        assert!(ledger.is_valid("x", "garbage-refresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_twice_is_rejected() {
        let h = harness();
        let client = generate_private_key();
        let pair = sign_up(&h, &client).await;
        let request = SignOutRequest { refresh_token: None };

        h.protocol
            .sign_out(&pair.access_token.token, request.clone())
            .await
            .unwrap();
        let err = h
            .protocol
            .sign_out(&pair.access_token.token, request)
            .await
            .unwrap_err();
        assert_eq!(err.auth_reason(), Some(&AuthError::Revoked));
    }
}
