use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{Claims, SigningError, TokenError};

/// HS256 encoder/decoder bound to one secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec for the given secret. An empty secret is refused.
    pub fn new(secret: &[u8]) -> Result<Self, SigningError> {
        if secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is the verifier's call; decode must accept expired tokens.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["sub".to_string(), "exp".to_string()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Sign the claims into a compact token string.
    pub fn encode(&self, claims: &Claims) -> Result<String, SigningError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(SigningError::Encoding)
    }

    /// Verify the signature and return the claims. Does not check expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
                ErrorKind::Base64(_) if only_signature_undecodable(token) => {
                    TokenError::SignatureMismatch
                }
                _ => TokenError::Malformed(e),
            })
    }
}

/// True when header and payload are intact but the signature segment is not
/// valid base64url, e.g. a flipped final character with non-zero trailing bits.
fn only_signature_undecodable(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };

    jsonwebtoken::decode_header(token).is_ok()
        && URL_SAFE_NO_PAD.decode(payload).is_ok()
        && URL_SAFE_NO_PAD.decode(signature).is_err()
}
