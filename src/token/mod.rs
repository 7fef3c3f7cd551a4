//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs signed with a single process-wide secret. The codec
//! only handles the wire format and signature; expiry is judged by the
//! verifier so that an expired token is an ordinary "not valid" answer rather
//! than a decode failure.

mod codec;
mod issuer;
mod verifier;

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub use codec::TokenCodec;
pub use issuer::TokenIssuer;
pub use verifier::{TokenVerifier, Validity};

/// Default token lifetime: 15 days.
pub const DEFAULT_TTL_SECS: u64 = 15 * 24 * 60 * 60;

/// Issuer written into every token unless configured otherwise.
pub const DEFAULT_ISSUER: &str = "custgate";

/// Shortest signing secret the server will start with.
pub const MIN_SECRET_LEN: usize = 32;

/// JWT claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the account's login identifier)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Granted authorities, e.g. role names
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Current Unix time in seconds, or `None` if the clock is before the epoch.
pub fn unix_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// Errors raised when building the codec or signing a token.
#[derive(Debug)]
pub enum SigningError {
    /// The signing secret is empty
    EmptySecret,
    /// The signing secret is shorter than the configured minimum
    WeakSecret { min: usize },
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for SigningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningError::EmptySecret => write!(f, "Signing secret is empty"),
            SigningError::WeakSecret { min } => {
                write!(f, "Signing secret must be at least {} bytes", min)
            }
            SigningError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
        }
    }
}

impl std::error::Error for SigningError {}

/// Errors raised when a token cannot be decoded.
#[derive(Debug)]
pub enum TokenError {
    /// Not a parseable three-part token with the expected claims
    Malformed(jsonwebtoken::errors::Error),
    /// Well-formed, but not signed with this process's secret
    SignatureMismatch,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed(e) => write!(f, "Malformed token: {}", e),
            TokenError::SignatureMismatch => write!(f, "Token signature mismatch"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Errors raised when issuing a token.
#[derive(Debug)]
pub enum IssueError {
    /// Tokens must name a subject
    EmptySubject,
    /// System time error
    Clock,
    /// The codec failed to sign the claims
    Signing(SigningError),
}

impl std::fmt::Display for IssueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueError::EmptySubject => write!(f, "Token subject cannot be empty"),
            IssueError::Clock => write!(f, "System time error"),
            IssueError::Signing(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IssueError {}

impl From<SigningError> for IssueError {
    fn from(e: SigningError) -> Self {
        IssueError::Signing(e)
    }
}
