/// Refresh Token Lifecycle
///
/// Each ledger record is `Active` until it is revoked; `Revoked` is terminal.
/// Expiry is never written, it is evaluated against `now` on every lookup.
///
/// - Issue: create an `Active` record, hand the plaintext to the caller once
/// - Rotate: consume a valid token, atomically revoke it and issue a successor
/// - Revoke: logout; reports `NotFound` for unknown or already revoked tokens
///
/// Reuse of an already rotated token fails the request and nothing else;
/// the rest of the session family stays valid.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::refresh_token::{generate_refresh_token, hash_refresh_token};
use crate::error::{AppError, AuthError, StoreError};
use crate::store::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore};

/// Result of a successful rotation
#[derive(Debug, Clone)]
pub struct RotatedRefreshToken {
    pub user_id: Uuid,
    /// Plaintext of the successor token
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn RefreshTokenStore>,
    ttl: Duration,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn RefreshTokenStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new refresh token for `user_id` and return its plaintext.
    ///
    /// # Errors
    /// `Internal` on random-source failure or a digest collision; store
    /// failures propagate.
    pub async fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AppError> {
        let (plaintext, new_token) = self.prepare(user_id, now)?;

        let record = self
            .store
            .insert_refresh_token(new_token)
            .await
            .map_err(collision_is_internal)?;

        tracing::info!(
            user_id = %user_id,
            token_id = %record.id,
            expires_at = %record.expires_at,
            "Refresh token issued"
        );
        Ok(plaintext)
    }

    /// Consume `presented` and issue its successor.
    ///
    /// # Errors
    /// `Auth(InvalidRefreshToken)` when the token is unknown, revoked,
    /// expired, or loses a concurrent rotation race. The causes are not
    /// distinguishable by the caller.
    pub async fn rotate(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<RotatedRefreshToken, AppError> {
        let parent = self.find_valid(presented, now).await?;
        let (plaintext, successor) = self.prepare(parent.user_id, now)?;

        match self.store.rotate_refresh_token(parent.id, now, successor).await {
            Ok(child) => {
                tracing::info!(
                    user_id = %parent.user_id,
                    parent_id = %parent.id,
                    token_id = %child.id,
                    "Refresh token rotated"
                );
                Ok(RotatedRefreshToken {
                    user_id: parent.user_id,
                    refresh_token: plaintext,
                })
            }
            Err(StoreError::NotFound) => {
                tracing::warn!(
                    user_id = %parent.user_id,
                    token_id = %parent.id,
                    "Refresh token consumed by a concurrent rotation"
                );
                Err(AuthError::InvalidRefreshToken.into())
            }
            Err(e) => Err(collision_is_internal(e)),
        }
    }

    /// Revoke `presented` (logout).
    ///
    /// Expired but unrevoked tokens are revoked as well.
    ///
    /// # Errors
    /// `NotFound` when the token is unknown or already revoked. Repeated
    /// calls are harmless.
    pub async fn revoke(&self, presented: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let record = self
            .store
            .find_refresh_token_by_hash(&hash_refresh_token(presented))
            .await?
            .filter(|record| !record.is_revoked())
            .ok_or_else(not_found)?;

        match self.store.revoke_refresh_token(record.id, now).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %record.user_id,
                    token_id = %record.id,
                    "Refresh token revoked"
                );
                Ok(())
            }
            Err(StoreError::NotFound) => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a presented token and require it to be valid at `now`.
    async fn find_valid(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError> {
        let record = self
            .store
            .find_refresh_token_by_hash(&hash_refresh_token(presented))
            .await?;

        match record {
            Some(record) if record.is_valid(now) => Ok(record),
            Some(record) if record.is_revoked() => {
                tracing::warn!(
                    user_id = %record.user_id,
                    token_id = %record.id,
                    "Revoked refresh token presented"
                );
                Err(AuthError::InvalidRefreshToken.into())
            }
            Some(record) => {
                tracing::info!(
                    user_id = %record.user_id,
                    token_id = %record.id,
                    "Expired refresh token presented"
                );
                Err(AuthError::InvalidRefreshToken.into())
            }
            None => {
                tracing::warn!("Unknown refresh token presented");
                Err(AuthError::InvalidRefreshToken.into())
            }
        }
    }

    fn prepare(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(String, NewRefreshToken), AppError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("refresh token expiry out of range".to_string()))?;
        let plaintext = generate_refresh_token()?;
        let new_token = NewRefreshToken {
            user_id,
            token_hash: hash_refresh_token(&plaintext),
            expires_at,
            created_at: now,
        };
        Ok((plaintext, new_token))
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Token not found or already revoked".to_string())
}

/// A duplicate digest means two random tokens collided, which is never a
/// client error.
fn collision_is_internal(err: StoreError) -> AppError {
    match err {
        StoreError::Conflict(msg) => {
            AppError::Internal(format!("refresh token digest collision: {}", msg))
        }
        other => other.into(),
    }
}
