//! HTTP server for Turnstile

pub mod http;

pub use http::{run, AppState};
