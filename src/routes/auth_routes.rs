//! HTTP Routes for Authentication
//!
//! Thin JSON surface over [`SessionProtocol`](crate::session::SessionProtocol):
//! - GET  /auth/public-key - Fresh server key for sealing a field
//! - POST /auth/signup     - Create an account and get a token pair
//! - POST /auth/signin     - Authenticate and get a token pair
//! - POST /auth/refresh    - Rotate a token pair
//! - POST /auth/signout    - Revoke the presented tokens
//! - GET  /auth/me         - Profile behind the bearer token

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::BoxBody;
use crate::auth::extract_token_from_header;
use crate::server::AppState;
use crate::session::{ProfileSummary, SignOutRequest};
use crate::types::{AuthError, Result, TurnstileError};

/// Largest request body accepted on any auth route.
pub const MAX_BODY_BYTES: usize = 10 * 1024;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    insert_cors_headers(headers);
    response
}

fn error_response(err: TurnstileError) -> Response<BoxBody> {
    match &err {
        TurnstileError::Storage(detail) | TurnstileError::Internal(detail) => {
            error!("Auth request failed: {}", detail)
        }
        other => debug!("Auth request rejected: {}", other),
    }

    let (status, error) = err.into_status_code_and_body();
    json_response(status, &ErrorResponse { error })
}

fn cors_preflight() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    insert_cors_headers(headers);
    headers.insert(
        "Access-Control-Max-Age",
        hyper::header::HeaderValue::from_static("86400"),
    );
    response
}

fn insert_cors_headers(headers: &mut hyper::HeaderMap) {
    use hyper::header::HeaderValue;

    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Read at most [`MAX_BODY_BYTES`] of the body.
async fn read_body<B>(req: Request<B>) -> Result<Bytes>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.is::<http_body_util::LengthLimitError>() {
                TurnstileError::BadRequest("Request body too large".into())
            } else {
                TurnstileError::Http(format!("Failed to read body: {}", e))
            }
        })
}

async fn parse_json_body<B, T>(req: Request<B>) -> Result<T>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
    T: DeserializeOwned,
{
    let bytes = read_body(req).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TurnstileError::BadRequest(format!("Invalid JSON: {}", e)))
}

fn bearer_token<B>(req: &Request<B>) -> Result<String> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    extract_token_from_header(header)
        .map(str::to_string)
        .ok_or(TurnstileError::Unauthorized(AuthError::Malformed))
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /auth/public-key
async fn handle_public_key(state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let issued = state.session.request_key().await;
    Ok(json_response(StatusCode::OK, &issued))
}

/// POST /auth/signup
async fn handle_signup<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let request = parse_json_body(req).await?;
    let pair = state.session.sign_up(request).await?;
    Ok(json_response(StatusCode::CREATED, &pair))
}

/// POST /auth/signin
async fn handle_signin<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let request = parse_json_body(req).await?;
    let pair = state.session.sign_in(request).await?;
    Ok(json_response(StatusCode::OK, &pair))
}

/// POST /auth/refresh
async fn handle_refresh<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let request = parse_json_body(req).await?;
    let pair = state.session.refresh(request).await?;
    Ok(json_response(StatusCode::OK, &pair))
}

/// POST /auth/signout
///
/// Bearer access token required; the body may carry the refresh token.
async fn handle_signout<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let token = bearer_token(&req)?;
    let bytes = read_body(req).await?;
    let request = if bytes.iter().all(u8::is_ascii_whitespace) {
        SignOutRequest::default()
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| TurnstileError::BadRequest(format!("Invalid JSON: {}", e)))?
    };

    state.session.sign_out(&token, request).await?;
    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Signed out".into(),
        },
    ))
}

/// GET /auth/me
async fn handle_me<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let token = bearer_token(&req)?;
    let session = state.session.authorize(&token).await?;
    Ok(json_response(
        StatusCode::OK,
        &ProfileSummary::from(&session.user),
    ))
}

/// Handle auth-related HTTP requests.
///
/// Returns Some(response) if request was handled, None if not an auth route.
pub async fn handle_auth_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/auth") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/auth/public-key") => handle_public_key(state).await,
        (&Method::POST, "/auth/signup") => handle_signup(req, state).await,
        (&Method::POST, "/auth/signin") => handle_signin(req, state).await,
        (&Method::POST, "/auth/refresh") => handle_refresh(req, state).await,
        (&Method::POST, "/auth/signout") => handle_signout(req, state).await,
        (&Method::GET, "/auth/me") => handle_me(req, state).await,

        (_, "/auth/public-key")
        | (_, "/auth/signup")
        | (_, "/auth/signin")
        | (_, "/auth/refresh")
        | (_, "/auth/signout")
        | (_, "/auth/me") => Ok(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
            },
        )),

        _ => Ok(json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "Auth endpoint not found".into(),
            },
        )),
    };

    Some(result.unwrap_or_else(error_response))
}
