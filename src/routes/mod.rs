//! HTTP routes for Turnstile

pub mod auth_routes;
pub mod health;

pub use auth_routes::handle_auth_request;
pub use health::health_check;

pub type BoxBody = http_body_util::combinators::BoxBody<bytes::Bytes, hyper::Error>;
