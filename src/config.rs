//! Configuration for Turnstile
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::token::MIN_SECRET_LEN;
use crate::auth::TokenCodecConfig;
use crate::crypto::{EphemeralKeyConfig, FieldCipher};

/// Turnstile - session and token exchange service
#[derive(Parser, Debug, Clone)]
#[command(name = "turnstile")]
#[command(about = "Session and token exchange service with sealed refresh tokens")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// HMAC secret for full-access tokens (required in production)
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_token_secret: Option<String>,

    /// HMAC secret for refresh tokens (required in production, must differ
    /// from the access secret)
    #[arg(long, env = "REFRESH_TOKEN_SECRET", hide_env_values = true)]
    pub refresh_token_secret: Option<String>,

    /// Issuer claim
    #[arg(long, env = "JWT_ISSUER", default_value = "turnstile")]
    pub jwt_issuer: String,

    /// Audience name carried by full-access tokens
    #[arg(long, env = "FULL_ACCESS_JWT_AUDIENCE", default_value = "full-access")]
    pub full_access_audience: String,

    /// Audience name carried by refresh tokens
    #[arg(long, env = "REFRESH_JWT_AUDIENCE", default_value = "refresh")]
    pub refresh_audience: String,

    /// Full-access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value = "600")]
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL_SECS", default_value = "604800")]
    pub refresh_token_ttl_secs: u64,

    /// How long a key-exchange handle stays usable, in seconds
    #[arg(long, env = "EPHEMERAL_KEY_TTL_SECS", default_value = "120")]
    pub ephemeral_key_ttl_secs: u64,

    /// Longest the expiry sweeper sleeps between passes, in seconds
    #[arg(long, env = "SWEEP_MAX_INTERVAL_SECS", default_value = "120")]
    pub sweep_max_interval_secs: u64,

    /// AEAD suite for sealed fields (aes-256-gcm, chacha20-poly1305)
    #[arg(long, env = "FIELD_CIPHER", default_value = "aes-256-gcm")]
    pub field_cipher: FieldCipher,

    /// Path of the durable revocation journal (required in production)
    #[arg(long, env = "REVOCATION_JOURNAL")]
    pub revocation_journal: Option<PathBuf>,

    /// Enable development mode (built-in secrets, in-memory ledger allowed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Token codec settings, falling back to development secrets in dev mode.
    pub fn token_config(&self) -> TokenCodecConfig {
        let dev = TokenCodecConfig::dev();
        let secret = |configured: &Option<String>, fallback: Vec<u8>| match configured {
            Some(secret) => secret.as_bytes().to_vec(),
            None if self.dev_mode => fallback,
            None => Vec::new(),
        };

        TokenCodecConfig {
            access_secret: secret(&self.access_token_secret, dev.access_secret),
            refresh_secret: secret(&self.refresh_token_secret, dev.refresh_secret),
            issuer: self.jwt_issuer.clone(),
            full_access_audience: self.full_access_audience.clone(),
            refresh_audience: self.refresh_audience.clone(),
            access_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
        }
    }

    pub fn ephemeral_config(&self) -> EphemeralKeyConfig {
        EphemeralKeyConfig {
            ttl: Duration::from_secs(self.ephemeral_key_ttl_secs),
            max_sweep_interval: Duration::from_secs(self.sweep_max_interval_secs),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            let access = self
                .access_token_secret
                .as_deref()
                .ok_or("ACCESS_TOKEN_SECRET is required in production mode")?;
            let refresh = self
                .refresh_token_secret
                .as_deref()
                .ok_or("REFRESH_TOKEN_SECRET is required in production mode")?;

            if access.len() < MIN_SECRET_LEN || refresh.len() < MIN_SECRET_LEN {
                return Err(format!(
                    "token secrets must be at least {MIN_SECRET_LEN} bytes"
                ));
            }
            if access == refresh {
                return Err(
                    "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
                );
            }
            if self.revocation_journal.is_none() {
                return Err("REVOCATION_JOURNAL is required in production mode".to_string());
            }
        }

        for (name, value) in [
            ("ACCESS_TOKEN_TTL_SECS", self.access_token_ttl_secs),
            ("REFRESH_TOKEN_TTL_SECS", self.refresh_token_ttl_secs),
            ("EPHEMERAL_KEY_TTL_SECS", self.ephemeral_key_ttl_secs),
            ("SWEEP_MAX_INTERVAL_SECS", self.sweep_max_interval_secs),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }

        if self.access_token_ttl_secs >= self.refresh_token_ttl_secs {
            return Err(
                "ACCESS_TOKEN_TTL_SECS must be shorter than REFRESH_TOKEN_TTL_SECS".to_string(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "access-secret-0123456789abcdef-0123456789";
    const REFRESH: &str = "refresh-secret-0123456789abcdef-012345678";

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["turnstile"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_in_dev_mode() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.field_cipher, FieldCipher::Aes256Gcm);

        let tokens = args.token_config();
        assert_eq!(tokens.access_ttl, Duration::from_secs(600));
        assert_eq!(tokens.refresh_ttl, Duration::from_secs(604_800));
        assert!(!tokens.access_secret.is_empty());
        assert_ne!(tokens.access_secret, tokens.refresh_secret);

        assert_eq!(args.ephemeral_config().ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_production_requires_secrets_and_journal() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--access-token-secret", ACCESS, "--refresh-token-secret", REFRESH])
            .validate()
            .is_err());

        let args = parse(&[
            "--access-token-secret",
            ACCESS,
            "--refresh-token-secret",
            REFRESH,
            "--revocation-journal",
            "/tmp/turnstile.jsonl",
        ]);
        assert!(args.validate().is_ok());
        assert_eq!(args.token_config().access_secret, ACCESS.as_bytes());
    }

    #[test]
    fn test_rejects_shared_or_short_secrets() {
        let shared = parse(&[
            "--access-token-secret",
            ACCESS,
            "--refresh-token-secret",
            ACCESS,
            "--revocation-journal",
            "/tmp/j",
        ]);
        assert!(shared.validate().is_err());

        let short = parse(&[
            "--access-token-secret",
            "short",
            "--refresh-token-secret",
            REFRESH,
            "--revocation-journal",
            "/tmp/j",
        ]);
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_and_inverted_lifetimes() {
        assert!(parse(&["--dev-mode", "--ephemeral-key-ttl-secs", "0"])
            .validate()
            .is_err());
        assert!(parse(&["--dev-mode", "--access-token-ttl-secs", "604800"])
            .validate()
            .is_err());
    }

    #[test]
    fn test_field_cipher_flag() {
        let args = parse(&["--dev-mode", "--field-cipher", "chacha20-poly1305"]);
        assert_eq!(args.field_cipher, FieldCipher::ChaCha20Poly1305);
        assert!(Args::try_parse_from(["turnstile", "--field-cipher", "des"]).is_err());
    }
}
