/// Persistence collaborator
///
/// The auth core reaches storage only through these traits. Implementations
/// must be safe to share across workers and processes; the only compound
/// operation, `rotate_refresh_token`, must be all-or-nothing.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// A registered account.
///
/// Deliberately not `Serialize`; `Debug` redacts the password hash.
#[derive(Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// One entry of the refresh token ledger.
///
/// Only `revoked_at` ever changes after creation, and only from `None`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Valid iff not revoked and `now < expires_at`
    #[inline]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

/// Fields of a ledger entry about to be inserted
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// # Errors
    /// `Conflict` if the email is already registered
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// # Errors
    /// `Conflict` if a record with the same hash already exists
    async fn insert_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Set `revoked_at = now` on an unrevoked record.
    ///
    /// # Errors
    /// `NotFound` if no unrevoked record has this id
    async fn revoke_refresh_token(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Revoke `id` and insert `successor` as one atomic unit.
    ///
    /// The revoke is conditional on the record being unrevoked and
    /// unexpired at `now`; if it matches nothing, nothing is written.
    ///
    /// # Errors
    /// `NotFound` if the conditional revoke matched no record
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        successor: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "abc123hash".to_string(),
            expires_at: now + Duration::hours(1),
            revoked_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_record_validity() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rec = record(now);

        assert!(rec.is_valid(now));
        assert!(rec.is_expired(now + Duration::hours(1)));
        assert!(!rec.is_valid(now + Duration::hours(1)));

        rec.revoked_at = Some(now);
        assert!(rec.is_revoked());
        assert!(!rec.is_valid(now));
    }

    #[test]
    fn test_user_debug_redacts_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: "$2b$12$secretsecretsecret".to_string(),
            created_at: Utc::now(),
        };

        let rendered = format!("{:?}", user);
        assert!(rendered.contains("user@example.com"));
        assert!(!rendered.contains("secretsecret"));
    }
}
