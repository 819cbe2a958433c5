/// Access Token Codec
///
/// Issues and verifies short-lived HS256 JWTs. Verification is pure: it
/// never touches storage, so an access token stays valid on every node that
/// holds the same secret until it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::error::{AppError, AuthError, ConfigError};

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl AccessTokenCodec {
    /// # Errors
    /// Returns `MissingRequired` for an empty secret and `InvalidValue` for a
    /// non-positive TTL. Both are startup-fatal.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue(
                "access token TTL must be positive".to_string(),
            ));
        }

        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against the caller's clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `{sub, iat: now, exp: now + ttl}` for `subject`, in whole seconds.
    pub fn issue(&self, subject: Uuid, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims::new(subject, now, self.ttl);

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token and return its subject.
    ///
    /// # Errors
    /// Every failure (structure, algorithm, signature, expiry, subject) is
    /// reported as the same `InvalidToken`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AuthError::InvalidToken
            })?;

        if claims.is_expired_at(now) {
            tracing::debug!(subject = %claims.sub, "Access token expired");
            return Err(AuthError::InvalidToken);
        }

        claims.user_id()
    }
}
