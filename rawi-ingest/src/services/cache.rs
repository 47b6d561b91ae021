//! Named-entry cache with per-entry expiry
//!
//! Holds short-lived values such as the remote store access token.
//! Injected as a capability wherever caching is needed; nothing in the
//! process holds cached state in a global.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Get/set cache keyed by entry name
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Current value of `name`, or None when absent or expired
    async fn get(&self, name: &str) -> Option<String>;

    /// Store `value` under `name` for at most `ttl`
    async fn set(&self, name: &str, value: String, ttl: Duration);

    /// Drop `name` immediately
    async fn invalidate(&self, name: &str);
}

/// In-process cache implementation
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, name: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(name) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, name: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), (value, Instant::now() + ttl));
    }

    async fn invalidate(&self, name: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(name);
    }
}
