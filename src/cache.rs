//! Bounded in-memory cache of refresh results, backed by moka.
//!
//! Results are keyed by credential. The user id of a fresh refresh goes into a
//! separate alias index with its own bound, so writing the alias can never
//! evict the credential entry stored alongside it. Every entry expires at its
//! own `expires_at`; expired entries are misses and are dropped by moka's
//! housekeeping or by [`CredentialCache::purge_expired`].

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde_json::Value;

use crate::refresh::Identity;
use crate::role::UserType;

/// A refresh result as served from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRefreshResult {
    /// Backend user id, or the refresh credential when the backend sent none.
    pub user_id: String,
    pub user_type: UserType,
    pub email: String,
    pub raw_payload: Value,
    pub expires_at: Instant,
}

impl CachedRefreshResult {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Expires each entry at the `expires_at` it was written with.
struct ResultExpiry;

impl Expiry<String, CachedRefreshResult> for ResultExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedRefreshResult,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedRefreshResult,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

fn build_map(capacity: u64) -> Cache<String, CachedRefreshResult> {
    // LRU admits every new entry; the default TinyLFU may reject a fresh key
    // when the cache is full.
    Cache::builder()
        .max_capacity(capacity)
        .eviction_policy(EvictionPolicy::lru())
        .expire_after(ResultExpiry)
        .build()
}

pub struct CredentialCache {
    capacity: usize,
    entries: Cache<String, CachedRefreshResult>,
    by_user: Cache<String, CachedRefreshResult>,
}

impl CredentialCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: build_map(capacity as u64),
            by_user: build_map(capacity as u64),
        }
    }

    /// Look up `key` as a credential, then as a user id.
    pub fn get(&self, key: &str) -> Option<CachedRefreshResult> {
        let now = Instant::now();
        self.entries
            .get(key)
            .or_else(|| self.by_user.get(key))
            .filter(|result| result.is_valid_at(now))
    }

    /// Store `identity` under `key` for `ttl`.
    pub fn put(&self, key: &str, identity: &Identity, ttl: Duration) -> CachedRefreshResult {
        let result = CachedRefreshResult {
            user_id: identity
                .user_id
                .clone()
                .unwrap_or_else(|| key.to_string()),
            user_type: identity.user_type,
            email: identity.email.clone(),
            raw_payload: identity.raw_payload.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), result.clone());
        result
    }

    /// Store a fresh refresh result under the refresh credential, and under the
    /// user id in the alias index.
    pub fn store_refresh(
        &self,
        credential: &str,
        identity: &Identity,
        ttl: Duration,
    ) -> CachedRefreshResult {
        let result = self.put(credential, identity, ttl);
        if result.user_id != credential {
            self.by_user.insert(result.user_id.clone(), result.clone());
        }
        result
    }

    /// Drop expired entries and apply pending capacity evictions.
    pub fn purge_expired(&self) {
        self.entries.run_pending_tasks();
        self.by_user.run_pending_tasks();
    }

    /// Number of credential entries. Alias entries are not counted.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
