//! Turnstile - session and token exchange service
//!
//! Passwords and refresh tokens never cross the wire in the clear: each is
//! sealed with a key derived from a one-shot P-384 exchange against a
//! server key that is consumed on first use.
//!
//! ## Components
//!
//! - **Crypto**: single-use server keys, ECDH key agreement, field AEAD
//! - **Auth**: access/refresh JWT codec and Argon2 password hashing
//! - **Ledger**: append-only revocation ledger with a durable journal
//! - **Session**: sign-up, sign-in, refresh rotation, sign-out, authorize
//! - **Routes**: JSON endpoints under `/auth`

pub mod auth;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod routes;
pub mod server;
pub mod session;
pub mod types;
pub mod users;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AuthError, Result, TurnstileError};
