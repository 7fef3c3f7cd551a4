pub mod accounts;
pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod password;
pub mod token;

use api::{create_api_router, ping};
use auth::{AccessPolicy, RequestGate, enforce_access_policy, request_gate};
use axum::{Router, middleware, routing::get};
use db::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use token::{MIN_SECRET_LEN, SigningError, TokenCodec, TokenIssuer, TokenVerifier};
use tokio::net::TcpListener;
use tower::ServiceBuilder;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Issuer written into every token
    pub issuer: String,
    /// Lifetime of issued tokens in seconds
    pub token_ttl_secs: u64,
    /// Upper bound on the per-request account lookup
    pub lookup_timeout: Duration,
}

/// Create the application router with the given configuration.
///
/// Every route, including unmatched ones, passes through the request gate and
/// then the access policy. Fails if the signing secret is unusable.
pub fn create_app(config: &ServerConfig) -> Result<Router, SigningError> {
    if config.jwt_secret.len() < MIN_SECRET_LEN {
        return Err(SigningError::WeakSecret {
            min: MIN_SECRET_LEN,
        });
    }

    let codec = Arc::new(TokenCodec::new(&config.jwt_secret)?);
    let issuer = Arc::new(TokenIssuer::new(
        codec.clone(),
        config.issuer.clone(),
        config.token_ttl_secs,
    ));

    let gate = Arc::new(
        RequestGate::new(TokenVerifier::new(codec), Arc::new(config.db.clone()))
            .with_lookup_timeout(config.lookup_timeout),
    );
    let policy = Arc::new(AccessPolicy::default());

    let app = Router::new()
        .route("/ping", get(ping))
        .nest("/api/v1", create_api_router(config.db.clone(), issuer))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(gate, request_gate))
                .layer(middleware::from_fn_with_state(policy, enforce_access_policy)),
        );

    Ok(app)
}

/// Serve an already built app on the given listener. Blocks until the server exits.
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
