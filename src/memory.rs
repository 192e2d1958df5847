//! In-memory cache backend.

use crate::config::BackendConfig;
use crate::error::CacheResult;
use crate::traits::CacheBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory backend backed by a `HashMap`.
///
/// The store the `mem://` locator constructs. Expired entries are treated
/// as absent on read and overwritten on write; there is no background
/// sweeper.
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    initialized: AtomicBool,
    enabled: AtomicBool,
}

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Option<tokio::time::Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| tokio::time::Instant::now() > deadline)
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            initialized: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
        }
    }

    /// Construct from a parsed `mem://` locator. The memory backend takes
    /// no constructor parameters; unknown ones are ignored.
    pub(crate) fn from_config(_config: &BackendConfig) -> Self {
        Self::new()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|d| tokio::time::Instant::now() + d);
        let entry = Entry { value, expires_at };
        self.data.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.get(key).await.map(|v| v.is_some())
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let data = self.data.read().await;
        let Some(entry) = data.get(key) else {
            return Ok(None);
        };
        match entry.expires_at {
            Some(deadline) => {
                let now = tokio::time::Instant::now();
                if deadline > now {
                    Ok(Some(deadline - now))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        let mut data = self.data.write().await;
        if let Some(entry) = data.get_mut(key) {
            entry.expires_at = Some(tokio::time::Instant::now() + ttl);
        }
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut data = self.data.write().await;
        let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        let current: i64 = entry.value.parse().unwrap_or(0);
        let new_value = current + delta;
        entry.value = new_value.to_string();

        Ok(new_value)
    }

    async fn clear(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }

    async fn init(&self) -> CacheResult<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_init(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
