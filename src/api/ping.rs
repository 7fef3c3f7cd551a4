use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct PingResponse {
    name: &'static str,
}

/// Liveness probe.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { name: "Pong" })
}
