//! Request-scoped authenticated identity.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::policy::UnauthorizedAccess;

/// Who the current request is authenticated as.
///
/// Lives in the request's extensions and nowhere else; it is created by the
/// request gate and dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub authorities: Vec<String>,
}

/// Extractor for handlers that need the caller's identity.
///
/// Routes behind the access policy already have one attached; the rejection
/// only fires if a handler is mounted on a public route by mistake.
pub struct Authenticated(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = UnauthorizedAccess;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(UnauthorizedAccess::new)
    }
}
