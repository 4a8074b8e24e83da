//! Session lifecycle over sealed key exchange
//!
//! - [`protocol`]: sign-up, sign-in, refresh rotation, sign-out, authorize
//! - [`wire`]: JSON bodies exchanged with clients

pub mod protocol;
pub mod wire;

pub use protocol::SessionProtocol;
pub use wire::{
    AuthenticatedSession, Base64Bytes, KeyExchange, ProfileSummary, PublicKeyResponse,
    RefreshRequest, SignInRequest, SignOutRequest, SignUpRequest, TokenEnvelope,
    TokenPairResponse,
};
