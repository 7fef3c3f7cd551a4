mod auth;
mod customers;
mod error;
mod ping;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::token::TokenIssuer;

pub use error::{ApiError, ResultExt};
pub use ping::ping;

/// State shared by every API handler.
#[derive(Clone)]
pub struct ApiState {
    pub db: Database,
    pub issuer: Arc<TokenIssuer>,
}

/// Create the `/api/v1` router.
pub fn create_api_router(db: Database, issuer: Arc<TokenIssuer>) -> Router {
    let state = ApiState { db, issuer };

    Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/customers", customers::router(state))
}
