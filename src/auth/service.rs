/// Authentication service
///
/// The boundary the HTTP layer calls: register, login, refresh, logout and
/// current-user lookup. Composes the credential hasher, the access token
/// codec and the refresh token lifecycle over the injected stores.

use actix_web::web;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::AccessTokenCodec;
use crate::auth::lifecycle::RefreshTokenManager;
use crate::auth::password::CredentialHasher;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, ConfigError, StoreError};
use crate::store::{RefreshTokenStore, User, UserStore};
use crate::validators::{is_valid_email, require_non_empty, validate_password};

/// Tokens handed out by login and refresh
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    hasher: CredentialHasher,
    codec: AccessTokenCodec,
    refresh_tokens: RefreshTokenManager,
    users: Arc<dyn UserStore>,
    /// Digest checked for unknown emails so every login pays one bcrypt run
    timing_digest: Arc<str>,
}

impl AuthService {
    /// # Errors
    /// Any `ConfigError` here is startup-fatal
    pub fn new(
        settings: &AuthSettings,
        users: Arc<dyn UserStore>,
        refresh_store: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let hasher = CredentialHasher::new(settings.password_hash_cost)?;
        let timing_digest = hasher
            .hash(&Uuid::new_v4().to_string())
            .map_err(|e| ConfigError::InvalidValue(format!("password hasher unusable: {}", e)))?;

        Ok(Self {
            hasher,
            codec: AccessTokenCodec::new(&settings.jwt_secret, settings.access_token_ttl()?)?,
            refresh_tokens: RefreshTokenManager::new(refresh_store, settings.refresh_token_ttl()?),
            users,
            timing_digest: timing_digest.into(),
        })
    }

    /// The codec, for wiring the authentication gate
    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    /// Create an account.
    ///
    /// # Errors
    /// - `Validation` for a malformed email or password
    /// - `Conflict` if the email is taken
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = is_valid_email(email)?;
        validate_password(password)?;

        let hasher = self.hasher;
        let password = password.to_string();
        let password_hash = web::block(move || hasher.hash(&password)).await??;

        let user = self
            .users
            .create_user(&email, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::Conflict("Email already exists".to_string()),
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Exchange credentials for an access/refresh token pair.
    ///
    /// # Errors
    /// `Auth(InvalidCredentials)` for an unknown email or a wrong password
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedTokens, AppError> {
        let email = is_valid_email(email)?;
        require_non_empty("password", password)?;

        let user = self.users.find_user_by_email(&email).await?;

        let hasher = self.hasher;
        let digest = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.timing_digest.to_string(),
        };
        let password = password.to_string();
        let password_valid = web::block(move || hasher.verify(&digest, &password)).await?;

        let user = match user {
            Some(user) if password_valid => user,
            Some(user) => {
                tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
                return Err(AuthError::InvalidCredentials.into());
            }
            None => {
                tracing::warn!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let access_token = self.codec.issue(user.id, now)?;
        let refresh_token = self.refresh_tokens.issue(user.id, now).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(self.tokens(access_token, refresh_token))
    }

    /// Rotate a refresh token and issue a fresh access token.
    ///
    /// # Errors
    /// `Auth(InvalidRefreshToken)` for unknown, revoked, expired or reused tokens
    pub async fn refresh(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedTokens, AppError> {
        require_non_empty("refresh_token", refresh_token)?;

        let rotated = self.refresh_tokens.rotate(refresh_token, now).await?;
        let access_token = self.codec.issue(rotated.user_id, now)?;

        Ok(self.tokens(access_token, rotated.refresh_token))
    }

    /// Revoke a refresh token.
    ///
    /// # Errors
    /// `NotFound` if the token is unknown or already revoked
    pub async fn logout(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        require_non_empty("refresh_token", refresh_token)?;
        self.refresh_tokens.revoke(refresh_token, now).await
    }

    /// # Errors
    /// `NotFound` if the account behind a still-valid token is gone
    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    fn tokens(&self, access_token: String, refresh_token: String) -> IssuedTokens {
        IssuedTokens {
            access_token,
            refresh_token,
            expires_in: self.codec.ttl().num_seconds(),
        }
    }
}
