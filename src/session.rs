// 👤 Session Cache - signed-in user and token, kept in device storage

use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const USER_KEY: &str = "session_user";
const TOKEN_KEY: &str = "session_token";

/// Identity-verification tier as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Unverified,
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub kyc_status: KycStatus,
    /// Last known PIN state; the backend stays authoritative
    #[serde(default)]
    pub pin_enabled: Option<bool>,
    pub cached_at: DateTime<Utc>,
}

impl CachedUser {
    pub fn new(id: &str, email: &str, full_name: &str, kyc_status: KycStatus) -> Self {
        CachedUser {
            id: id.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            kyc_status,
            pin_enabled: None,
            cached_at: Utc::now(),
        }
    }
}

pub struct SessionCache<K> {
    storage: K,
}

impl<K: KeyValueStore> SessionCache<K> {
    pub fn new(storage: K) -> Self {
        SessionCache { storage }
    }

    pub fn save_user(&self, user: &CachedUser) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &json)
    }

    pub fn user(&self) -> Result<Option<CachedUser>> {
        match self.storage.get(USER_KEY)? {
            Some(json) => {
                let user = serde_json::from_str(&json).context("Failed to parse cached user")?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub fn set_pin_enabled(&self, enabled: bool) -> Result<()> {
        if let Some(mut user) = self.user()? {
            user.pin_enabled = Some(enabled);
            self.save_user(&user)?;
        }
        Ok(())
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        self.storage.set(TOKEN_KEY, token)
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.storage.get(TOKEN_KEY)
    }

    /// Logout: forget user and token
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(USER_KEY)?;
        self.storage.remove(TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_user_round_trip_and_clear() {
        let cache = SessionCache::new(MemoryStore::new());
        assert_eq!(cache.user().unwrap(), None);

        let user = CachedUser::new("u1", "ada@example.com", "Ada Obi", KycStatus::Verified);
        cache.save_user(&user).unwrap();
        cache.save_token("tok-123").unwrap();
        cache.set_pin_enabled(true).unwrap();

        let loaded = cache.user().unwrap().unwrap();
        assert_eq!(loaded.full_name, "Ada Obi");
        assert_eq!(loaded.pin_enabled, Some(true));
        assert_eq!(cache.token().unwrap().as_deref(), Some("tok-123"));

        cache.clear().unwrap();
        assert_eq!(cache.user().unwrap(), None);
        assert_eq!(cache.token().unwrap(), None);
    }

    #[test]
    fn test_corrupt_user_is_an_error() {
        let storage = MemoryStore::new();
        storage.set(USER_KEY, "{broken").unwrap();
        let cache = SessionCache::new(storage);
        assert!(cache.user().is_err());
    }
}
