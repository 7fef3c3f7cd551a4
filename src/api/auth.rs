use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, header},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiState;
use super::customers::{RegistrationRequest, register};
use super::error::{ApiError, ResultExt};
use crate::db::CustomerSummary;
use crate::password::verify_password;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    customer: CustomerSummary,
}

/// Same answer for an unknown user and a wrong password.
fn bad_credentials() -> ApiError {
    ApiError::unauthorized("Bad credentials")
}

async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .db
        .customers()
        .get_by_email(payload.username.trim())
        .await
        .db_err("Failed to look up customer")?;

    let Some(customer) = customer else {
        debug!("Login failed: unknown username");
        return Err(bad_credentials());
    };

    if !verify_password(&payload.password, &customer.password_hash) {
        debug!(customer_id = customer.id, "Login failed: wrong password");
        return Err(bad_credentials());
    }

    let summary = CustomerSummary::from(&customer);
    let token = state
        .issuer
        .issue(&summary.username, &summary.roles)
        .internal_err("Failed to issue token")?;
    let header_value = HeaderValue::from_str(&token).internal_err("Failed to issue token")?;

    Ok((
        [(header::AUTHORIZATION, header_value)],
        Json(LoginResponse {
            token,
            customer: summary,
        }),
    ))
}

async fn signup(
    State(state): State<ApiState>,
    Json(payload): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    register(&state, payload).await
}
