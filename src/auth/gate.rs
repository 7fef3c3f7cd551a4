//! Per-request credential check.
//!
//! The gate never rejects. It either attaches an [`AuthenticatedIdentity`] to
//! the request or leaves it untouched, and always forwards. Turning "no
//! identity" into a 401 is the access policy's job.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{Extensions, HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::identity::AuthenticatedIdentity;
use crate::accounts::AccountLookup;
use crate::token::{TokenError, TokenVerifier, Validity, unix_now};

/// Prefix of the `Authorization` header value carrying a token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Upper bound on a single account lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a request was forwarded without an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NoCredential,
    MalformedToken,
    SignatureMismatch,
    AccountNotFound,
    LookupFailed,
    LookupTimedOut,
    Expired,
    SubjectMismatch,
}

/// What the gate did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Token checked out; an identity was attached
    Verified,
    /// An identity was already attached upstream; nothing was done
    AlreadyAuthenticated,
    /// Forwarded unauthenticated
    Passthrough(PassReason),
}

pub struct RequestGate {
    verifier: TokenVerifier,
    accounts: Arc<dyn AccountLookup>,
    lookup_timeout: Duration,
}

impl RequestGate {
    pub fn new(verifier: TokenVerifier, accounts: Arc<dyn AccountLookup>) -> Self {
        Self {
            verifier,
            accounts,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Inspect the credential header and attach an identity to `extensions` on success.
    ///
    /// Performs at most one account lookup, and none if an identity is already present.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        extensions: &mut Extensions,
    ) -> GateOutcome {
        if extensions.get::<AuthenticatedIdentity>().is_some() {
            return GateOutcome::AlreadyAuthenticated;
        }

        let Some(token) = bearer_token(headers) else {
            return GateOutcome::Passthrough(PassReason::NoCredential);
        };

        let claims = match self.verifier.claims_of(token) {
            Ok(claims) => claims,
            Err(TokenError::Malformed(_)) => {
                return GateOutcome::Passthrough(PassReason::MalformedToken);
            }
            Err(TokenError::SignatureMismatch) => {
                return GateOutcome::Passthrough(PassReason::SignatureMismatch);
            }
        };

        let lookup =
            tokio::time::timeout(self.lookup_timeout, self.accounts.find_by_subject(&claims.sub))
                .await;

        let account = match lookup {
            Ok(Ok(Some(account))) => account,
            Ok(Ok(None)) => return GateOutcome::Passthrough(PassReason::AccountNotFound),
            Ok(Err(e)) => {
                warn!(error = %e, "Account lookup failed");
                return GateOutcome::Passthrough(PassReason::LookupFailed);
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Account lookup timed out"
                );
                return GateOutcome::Passthrough(PassReason::LookupTimedOut);
            }
        };

        // A clock before the epoch fails closed
        let now = unix_now().unwrap_or(u64::MAX);

        match TokenVerifier::check_claims(&claims, &account.username, now) {
            Validity::Valid => {
                extensions.insert(AuthenticatedIdentity {
                    subject: claims.sub,
                    authorities: account.authorities,
                });
                GateOutcome::Verified
            }
            Validity::Expired => GateOutcome::Passthrough(PassReason::Expired),
            Validity::SubjectMismatch => GateOutcome::Passthrough(PassReason::SubjectMismatch),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}

/// Middleware running the gate ahead of the access policy.
pub async fn request_gate(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let outcome = gate.authenticate(&parts.headers, &mut parts.extensions).await;

    debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        outcome = ?outcome,
        "Request gate"
    );

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{Account, LookupError, MemoryAccounts};
    use crate::token::{Claims, DEFAULT_TTL_SECS, TokenCodec, TokenIssuer};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &[u8] = b"test-secret-key-for-testing-only";
    const ALICE: &str = "alice@example.com";

    fn alice() -> Account {
        Account {
            username: ALICE.to_string(),
            password_hash: "unused".to_string(),
            authorities: vec!["ROLE_USER".to_string()],
        }
    }

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(SECRET).unwrap())
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(codec(), "test-issuer", DEFAULT_TTL_SECS)
    }

    fn gate(accounts: Arc<dyn AccountLookup>) -> RequestGate {
        RequestGate::new(TokenVerifier::new(codec()), accounts)
    }

    fn memory_gate() -> RequestGate {
        gate(Arc::new([alice()].into_iter().collect::<MemoryAccounts>()))
    }

    fn auth_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bearer(token: &str) -> HeaderMap {
        auth_headers(&format!("Bearer {}", token))
    }

    /// Counts lookups and delegates to an in-memory table.
    struct CountingAccounts {
        inner: MemoryAccounts,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AccountLookup for CountingAccounts {
        async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_subject(subject).await
        }
    }

    struct SlowAccounts;

    #[async_trait]
    impl AccountLookup for SlowAccounts {
        async fn find_by_subject(&self, _subject: &str) -> Result<Option<Account>, LookupError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(alice()))
        }
    }

    struct BrokenAccounts;

    #[async_trait]
    impl AccountLookup for BrokenAccounts {
        async fn find_by_subject(&self, _subject: &str) -> Result<Option<Account>, LookupError> {
            Err(LookupError::Storage(sqlx::Error::PoolTimedOut))
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&bearer("abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&auth_headers("Bearer ")), Some(""));
        assert_eq!(bearer_token(&auth_headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&auth_headers("bearer abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_no_header_passes_through() {
        let gate = memory_gate();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&HeaderMap::new(), &mut ext).await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::NoCredential));
        assert!(ext.get::<AuthenticatedIdentity>().is_none());
    }

    #[tokio::test]
    async fn test_non_bearer_header_passes_through() {
        let gate = memory_gate();
        let mut ext = Extensions::new();

        let outcome = gate
            .authenticate(&auth_headers("Token abc"), &mut ext)
            .await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::NoCredential));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let gate = memory_gate();
        let token = issuer().issue(ALICE, &[]).unwrap();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(outcome, GateOutcome::Verified);
        let identity = ext.get::<AuthenticatedIdentity>().unwrap();
        assert_eq!(identity.subject, ALICE);
        // Authorities come from the account, not the token
        assert_eq!(identity.authorities, vec!["ROLE_USER".to_string()]);
    }

    #[tokio::test]
    async fn test_garbage_token_passes_through() {
        let gate = memory_gate();
        let mut ext = Extensions::new();

        let outcome = gate
            .authenticate(&bearer("not-a-real-token"), &mut ext)
            .await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::MalformedToken));
        assert!(ext.get::<AuthenticatedIdentity>().is_none());
    }

    #[tokio::test]
    async fn test_foreign_signature_passes_through() {
        let gate = memory_gate();
        let foreign = TokenIssuer::new(
            Arc::new(TokenCodec::new(b"some-other-secret").unwrap()),
            "elsewhere",
            DEFAULT_TTL_SECS,
        );
        let token = foreign.issue(ALICE, &[]).unwrap();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(
            outcome,
            GateOutcome::Passthrough(PassReason::SignatureMismatch)
        );
    }

    #[tokio::test]
    async fn test_expired_token_passes_through() {
        let gate = memory_gate();
        let now = unix_now().unwrap();
        let token = codec()
            .encode(&Claims {
                sub: ALICE.to_string(),
                iss: "test-issuer".to_string(),
                iat: now - 100,
                exp: now - 1,
                scopes: vec![],
            })
            .unwrap();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::Expired));
        assert!(ext.get::<AuthenticatedIdentity>().is_none());
    }

    #[tokio::test]
    async fn test_unknown_account_passes_through() {
        let gate = memory_gate();
        let token = issuer().issue("ghost@example.com", &[]).unwrap();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::AccountNotFound));
    }

    #[tokio::test]
    async fn test_deleted_account_no_longer_authenticates() {
        let accounts = Arc::new([alice()].into_iter().collect::<MemoryAccounts>());
        let gate = gate(accounts.clone());
        let token = issuer().issue(ALICE, &[]).unwrap();

        let mut ext = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&token), &mut ext).await,
            GateOutcome::Verified
        );

        accounts.remove(ALICE);

        let mut ext = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&token), &mut ext).await,
            GateOutcome::Passthrough(PassReason::AccountNotFound)
        );
    }

    #[tokio::test]
    async fn test_gate_is_idempotent() {
        let accounts = Arc::new(CountingAccounts {
            inner: [alice()].into_iter().collect(),
            calls: AtomicUsize::new(0),
        });
        let gate = gate(accounts.clone());
        let token = issuer().issue(ALICE, &[]).unwrap();
        let headers = bearer(&token);
        let mut ext = Extensions::new();

        assert_eq!(
            gate.authenticate(&headers, &mut ext).await,
            GateOutcome::Verified
        );
        assert_eq!(
            gate.authenticate(&headers, &mut ext).await,
            GateOutcome::AlreadyAuthenticated
        );

        assert_eq!(accounts.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ext.get::<AuthenticatedIdentity>().unwrap().subject, ALICE);
    }

    #[tokio::test]
    async fn test_upstream_identity_is_kept() {
        let gate = memory_gate();
        let token = issuer().issue(ALICE, &[]).unwrap();
        let upstream = AuthenticatedIdentity {
            subject: "upstream".to_string(),
            authorities: vec![],
        };
        let mut ext = Extensions::new();
        ext.insert(upstream.clone());

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(outcome, GateOutcome::AlreadyAuthenticated);
        assert_eq!(ext.get::<AuthenticatedIdentity>(), Some(&upstream));
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out() {
        let gate = gate(Arc::new(SlowAccounts)).with_lookup_timeout(Duration::from_millis(20));
        let token = issuer().issue(ALICE, &[]).unwrap();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::LookupTimedOut));
        assert!(ext.get::<AuthenticatedIdentity>().is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_passes_through() {
        let gate = gate(Arc::new(BrokenAccounts));
        let token = issuer().issue(ALICE, &[]).unwrap();
        let mut ext = Extensions::new();

        let outcome = gate.authenticate(&bearer(&token), &mut ext).await;

        assert_eq!(outcome, GateOutcome::Passthrough(PassReason::LookupFailed));
    }
}
