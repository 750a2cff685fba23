use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error type for JWT operations.
#[derive(Debug, Clone, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is expired")]
    TokenExpired,

    #[error("Token is invalid: {0}")]
    InvalidToken(String),
}

/// Signed-token codec (HS256).
///
/// Generic over the claims type so the owning service defines its own token
/// payload; this codec only guarantees signature and expiry. The secret
/// should be at least 32 bytes and live in configuration, never in code.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    /// Encode claims into a signed token string.
    ///
    /// # Errors
    /// * `EncodingFailed` - serialization or signing failed
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Decode and validate a signed token.
    ///
    /// Validation covers the signature and the `exp` claim, nothing else; the
    /// codec keeps no state and consults no revocation list.
    ///
    /// # Errors
    /// * `TokenExpired` - `exp` is in the past
    /// * `InvalidToken` - bad signature, malformed token, or wrong algorithm
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, JwtError> {
        let validation = Validation::new(self.algorithm);

        let data = decode::<T>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn claims_expiring_in(seconds: i64) -> TestClaims {
        TestClaims {
            sub: "account-1".to_string(),
            exp: chrono::Utc::now().timestamp() + seconds,
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = JwtCodec::new(b"a_secret_key_of_at_least_32_bytes!!");
        let claims = claims_expiring_in(3600);

        let token = codec.encode(&claims).expect("Failed to encode");
        let decoded: TestClaims = codec.decode(&token).expect("Failed to decode");

        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let signer = JwtCodec::new(b"first_secret_key_at_least_32_bytes!");
        let other = JwtCodec::new(b"other_secret_key_at_least_32_bytes!");

        let token = signer.encode(&claims_expiring_in(3600)).unwrap();

        assert!(matches!(
            other.decode::<TestClaims>(&token),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_decode_rejects_expired() {
        let codec = JwtCodec::new(b"a_secret_key_of_at_least_32_bytes!!");

        let token = codec.encode(&claims_expiring_in(-300)).unwrap();

        assert!(matches!(
            codec.decode::<TestClaims>(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = JwtCodec::new(b"a_secret_key_of_at_least_32_bytes!!");
        assert!(codec.decode::<TestClaims>("not.a.token").is_err());
    }
}
