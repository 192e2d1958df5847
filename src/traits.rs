//! Backend capability interface.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Capability interface implemented by every cache storage backend.
///
/// One method per [`Command`](crate::commands::Command) keeps dispatch
/// compile-time checked - a backend that compiles supports the whole
/// command set. Values are JSON strings; typed encoding is the facade's
/// concern.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    // ========== Command Operations ==========

    /// Get the value stored under `key`.
    ///
    /// Returns `Ok(Some(value))` if the key exists and has not expired,
    /// `Ok(None)` otherwise.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Whether `key` currently holds a live value.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remaining time-to-live of `key`.
    ///
    /// Returns `Ok(None)` if the key is absent or has no expiration.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Set or replace the expiration of `key`.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()>;

    /// Add `delta` to the numeric value under `key`, treating an absent
    /// key as zero. Returns the new value.
    async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64>;

    /// Subtract `delta` from the numeric value under `key`.
    async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.increment(key, -delta).await
    }

    /// Remove every key.
    async fn clear(&self) -> CacheResult<()>;

    // ========== Lifecycle ==========

    /// Prepare the backend for use (open connections, allocate state).
    /// Must be idempotent: calling `init` on an initialized backend is a
    /// no-op.
    async fn init(&self) -> CacheResult<()>;

    /// Release backend resources. Must be idempotent.
    async fn close(&self) -> CacheResult<()>;

    /// Whether `init` has completed.
    fn is_init(&self) -> bool;

    // ========== Control ==========

    /// Allow commands to reach the backend again.
    fn enable(&self);

    /// Stop commands from reaching the backend; the dispatch pipeline's
    /// gate answers with each command's neutral output instead.
    fn disable(&self);

    /// Whether the backend currently accepts commands.
    fn is_enabled(&self) -> bool;
}
