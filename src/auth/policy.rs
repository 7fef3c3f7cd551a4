//! Route access rules and the single client-visible auth rejection.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::debug;

use super::identity::AuthenticatedIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
}

/// One row of the access table.
///
/// Patterns are matched segment by segment: `*` matches exactly one segment
/// and a trailing `**` matches whatever remains, including nothing. Empty
/// segments on either side are ignored.
#[derive(Debug, Clone)]
pub struct AccessRule {
    method: Option<Method>,
    pattern: String,
    requirement: Requirement,
}

impl AccessRule {
    pub fn new(method: Method, pattern: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            method: Some(method),
            pattern: pattern.into(),
            requirement,
        }
    }

    /// A rule that applies regardless of HTTP method.
    pub fn any_method(pattern: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            method: None,
            pattern: pattern.into(),
            requirement,
        }
    }

    pub fn permit(method: Method, pattern: impl Into<String>) -> Self {
        Self::new(method, pattern, Requirement::Public)
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        let method_ok = self.method.as_ref().is_none_or(|m| m == method);
        method_ok && path_matches(&self.pattern, path)
    }
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (Some("**"), _) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject,
}

/// Ordered access table. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// First matching rule wins; unmatched routes require authentication.
    pub fn requirement_for(&self, method: &Method, path: &str) -> Requirement {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.requirement)
            .unwrap_or(Requirement::Authenticated)
    }

    pub fn decide(
        &self,
        method: &Method,
        path: &str,
        identity: Option<&AuthenticatedIdentity>,
    ) -> Decision {
        match (self.requirement_for(method, path), identity) {
            (Requirement::Public, _) => Decision::Admit,
            (Requirement::Authenticated, Some(_)) => Decision::Admit,
            (Requirement::Authenticated, None) => Decision::Reject,
        }
    }
}

impl Default for AccessPolicy {
    /// Registration, login and ping are public; everything else needs a token.
    fn default() -> Self {
        Self::new(vec![
            AccessRule::permit(Method::POST, "/api/v1/customers"),
            AccessRule::permit(Method::POST, "/api/v1/auth/login"),
            AccessRule::permit(Method::POST, "/api/v1/auth/signup"),
            AccessRule::permit(Method::GET, "/ping"),
            AccessRule::permit(Method::HEAD, "/ping"),
        ])
    }
}

/// 401 for a protected route reached without an identity.
///
/// Carries no reason. Every kind of failed credential looks the same to the client.
#[derive(Debug)]
pub struct UnauthorizedAccess(());

impl UnauthorizedAccess {
    pub(super) fn new() -> Self {
        Self(())
    }
}

impl IntoResponse for UnauthorizedAccess {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized",
            }),
        )
            .into_response();

        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));

        response
    }
}

/// Middleware enforcing the access table. Must run after the request gate.
pub async fn enforce_access_policy(
    State(policy): State<Arc<AccessPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request.extensions().get::<AuthenticatedIdentity>();

    match policy.decide(request.method(), request.uri().path(), identity) {
        Decision::Admit => next.run(request).await,
        Decision::Reject => {
            debug!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rejected unauthenticated request"
            );
            UnauthorizedAccess::new().into_response()
        }
    }
}
