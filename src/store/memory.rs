/// In-memory store
///
/// A mutex-guarded ledger for tests and local runs. The lock is held across
/// both halves of a rotation, which gives the same all-or-nothing behaviour
/// as the Postgres transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore, User, UserStore};
use crate::error::StoreError;

#[derive(Default)]
struct Ledger {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
}

impl Ledger {
    fn insert_refresh_token(
        &mut self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        if self
            .refresh_tokens
            .values()
            .any(|r| r.token_hash == token.token_hash)
        {
            return Err(StoreError::Conflict("refresh token hash".to_string()));
        }

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            revoked_at: None,
            created_at: token.created_at,
        };
        self.refresh_tokens.insert(record.id, record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    ledger: Mutex<Ledger>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>, StoreError> {
        self.ledger
            .lock()
            .map_err(|_| StoreError::Other("in-memory ledger poisoned".to_string()))
    }

    /// All refresh token records of a user, oldest first
    pub fn refresh_tokens_for(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let mut records: Vec<_> = self
            .ledger()?
            .refresh_tokens
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .ledger()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.ledger()?.users.get(&id).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut ledger = self.ledger()?;
        if ledger.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict("email".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        ledger.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .ledger()?
            .refresh_tokens
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn insert_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        self.ledger()?.insert_refresh_token(token)
    }

    async fn revoke_refresh_token(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        match self.ledger()?.refresh_tokens.get_mut(&id) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(now);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        successor: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut ledger = self.ledger()?;

        match ledger.refresh_tokens.get(&id) {
            Some(parent) if parent.is_valid(now) => {}
            _ => return Err(StoreError::NotFound),
        }

        // Insert first so a hash conflict leaves the parent untouched
        let child = ledger.insert_refresh_token(successor)?;
        if let Some(parent) = ledger.refresh_tokens.get_mut(&id) {
            parent.revoked_at = Some(now);
        }
        Ok(child)
    }
}
