//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::TokenCodec;
use crate::config::Args;
use crate::crypto::EphemeralKeyStore;
use crate::ledger::{JournalRevocationStore, RevocationLedger};
use crate::routes::{self, BoxBody};
use crate::session::SessionProtocol;
use crate::types::Result;
use crate::users::MemoryUserStore;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub session: SessionProtocol,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the session protocol from configuration.
    ///
    /// Opens (and replays) the revocation journal when one is configured;
    /// otherwise revocations live in memory only.
    pub async fn build(args: Args) -> Result<Self> {
        let tokens = TokenCodec::new(args.token_config())?;

        let ledger = match &args.revocation_journal {
            Some(path) => {
                let store = JournalRevocationStore::open(path).await?;
                info!("Revocation journal: {}", path.display());
                RevocationLedger::new(Arc::new(store))
            }
            None => {
                warn!("No revocation journal configured - revocations are lost on restart");
                RevocationLedger::in_memory()
            }
        };

        let session = SessionProtocol::new(
            EphemeralKeyStore::new(args.ephemeral_config()),
            Arc::new(tokens),
            ledger,
            Arc::new(MemoryUserStore::new()),
            args.field_cipher,
        );

        Ok(Self {
            args,
            session,
            started_at: Instant::now(),
        })
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Turnstile listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - built-in token secrets may be in use");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(not_found_response(&path));
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state)).await
        }
        _ => not_found_response(&path),
    };

    Ok(response)
}

fn not_found_response(path: &str) -> Response<BoxBody> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });
    routes::auth_routes::json_response(StatusCode::NOT_FOUND, &body)
}

