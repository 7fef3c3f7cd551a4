use std::sync::Arc;

use super::{Claims, TokenCodec, TokenError, unix_now};

/// Outcome of checking decoded claims against an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Expired,
    SubjectMismatch,
}

/// Decodes tokens and judges subject and expiry.
#[derive(Clone)]
pub struct TokenVerifier {
    codec: Arc<TokenCodec>,
}

impl TokenVerifier {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Decode a token and return its claims. Expired tokens decode fine.
    pub fn claims_of(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.decode(token)
    }

    pub fn subject_of(&self, token: &str) -> Result<String, TokenError> {
        self.claims_of(token).map(|claims| claims.sub)
    }

    /// True when the token names `expected_username` and has not expired.
    ///
    /// Only a malformed or foreign-signed token is an error; an expired or
    /// mismatched one is `Ok(false)`.
    pub fn is_valid(&self, token: &str, expected_username: &str) -> Result<bool, TokenError> {
        // A clock before the epoch fails closed.
        let now = unix_now().unwrap_or(u64::MAX);
        self.is_valid_at(token, expected_username, now)
    }

    pub fn is_valid_at(
        &self,
        token: &str,
        expected_username: &str,
        now: u64,
    ) -> Result<bool, TokenError> {
        let claims = self.claims_of(token)?;
        Ok(Self::check_claims(&claims, expected_username, now) == Validity::Valid)
    }

    /// Subject must match exactly and `now` must be strictly before `exp`.
    pub fn check_claims(claims: &Claims, expected_username: &str, now: u64) -> Validity {
        if claims.sub != expected_username {
            Validity::SubjectMismatch
        } else if now >= claims.exp {
            Validity::Expired
        } else {
            Validity::Valid
        }
    }
}
