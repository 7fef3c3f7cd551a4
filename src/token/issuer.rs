use std::sync::Arc;

use super::{Claims, IssueError, TokenCodec, unix_now};

/// Builds claim sets and signs them.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    issuer: String,
    ttl_secs: u64,
}

impl TokenIssuer {
    /// A zero TTL would produce tokens with `exp == iat`, so it is raised to one second.
    pub fn new(codec: Arc<TokenCodec>, issuer: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            codec,
            issuer: issuer.into(),
            ttl_secs: ttl_secs.max(1),
        }
    }

    /// Issue a token for `subject` valid from now until now + TTL.
    pub fn issue(&self, subject: &str, scopes: &[String]) -> Result<String, IssueError> {
        let now = unix_now().ok_or(IssueError::Clock)?;
        self.issue_at(subject, scopes, now)
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &str,
        scopes: &[String],
        now: u64,
    ) -> Result<String, IssueError> {
        if subject.is_empty() {
            return Err(IssueError::EmptySubject);
        }

        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
            scopes: scopes.to_vec(),
        };

        Ok(self.codec.encode(&claims)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{DEFAULT_TTL_SECS, unix_now};

    fn issuer() -> (TokenIssuer, Arc<TokenCodec>) {
        let codec = Arc::new(TokenCodec::new(b"test-secret-key-for-testing-only").unwrap());
        (
            TokenIssuer::new(codec.clone(), "test-issuer", DEFAULT_TTL_SECS),
            codec,
        )
    }

    #[test]
    fn test_issue_sets_claims() {
        let (issuer, codec) = issuer();
        let before = unix_now().unwrap();

        let token = issuer
            .issue("alice@example.com", &["ROLE_USER".to_string()])
            .unwrap();
        let claims = codec.decode(&token).unwrap();

        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.scopes, vec!["ROLE_USER".to_string()]);
        assert!(claims.iat >= before);
        assert_eq!(claims.exp - claims.iat, DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_default_ttl_is_fifteen_days() {
        assert_eq!(DEFAULT_TTL_SECS, 15 * 86_400);
    }

    #[test]
    fn test_empty_scopes_allowed() {
        let (issuer, codec) = issuer();

        let token = issuer.issue_at("bob@example.com", &[], 1_000).unwrap();
        let claims = codec.decode(&token).unwrap();

        assert!(claims.scopes.is_empty());
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_000 + DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_empty_subject_rejected() {
        let (issuer, _) = issuer();
        assert!(matches!(
            issuer.issue("", &[]),
            Err(IssueError::EmptySubject)
        ));
    }

    #[test]
    fn test_zero_ttl_still_expires_after_issue() {
        let codec = Arc::new(TokenCodec::new(b"secret").unwrap());
        let issuer = TokenIssuer::new(codec.clone(), "x", 0);

        let claims = codec
            .decode(&issuer.issue_at("a", &[], 50).unwrap())
            .unwrap();
        assert!(claims.exp > claims.iat);
    }
}
