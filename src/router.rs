//! Prefix registration table and longest-prefix resolution.
//!
//! Keys are partitioned across backends by string prefix: the registration
//! whose prefix is the longest match wins, with the empty prefix `""` as the
//! default that matches every key. Resolutions are memoized per exact key in
//! a bounded LRU cache, so repeated dispatches skip the scan.

use crate::commands::Command;
use crate::error::{CacheError, CacheResult};
use crate::middleware::{CommandPipeline, Middleware};
use crate::traits::CacheBackend;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, trace};

/// Bound on the memoized key → registration mapping.
const RESOLUTION_CACHE_SIZE: usize = 1000;

/// The prefix every key matches.
pub const DEFAULT_PREFIX: &str = "";

/// A backend and its ordered middleware sequence, registered under one
/// prefix. Immutable once inserted.
pub struct Registration {
    prefix: String,
    backend: Arc<dyn CacheBackend>,
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl Registration {
    pub fn new(
        prefix: impl Into<String>,
        backend: Arc<dyn CacheBackend>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
            middlewares: middlewares.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// The fully wrapped callable executing `command` against this
    /// registration's backend.
    pub fn pipeline(&self, command: Command) -> CommandPipeline {
        CommandPipeline::new(
            command,
            Arc::clone(&self.backend),
            Arc::clone(&self.middlewares),
        )
    }
}

/// Routes keys to registrations by longest matching prefix.
pub struct Router {
    registrations: RwLock<BTreeMap<String, Arc<Registration>>>,
    resolved: Mutex<LruCache<String, Arc<Registration>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(BTreeMap::new()),
            resolved: Mutex::new(LruCache::new(
                NonZeroUsize::new(RESOLUTION_CACHE_SIZE).unwrap(),
            )),
        }
    }

    /// Register `registration` under its prefix, replacing any prior entry.
    ///
    /// Clears the resolution cache: memoized answers may name a replaced
    /// registration, or a shorter prefix than the one just added.
    pub fn insert(&self, registration: Registration) {
        let registration = Arc::new(registration);
        debug!(prefix = %registration.prefix, "registering backend");
        self.registrations
            .write()
            .insert(registration.prefix.clone(), registration);
        self.resolved.lock().clear();
    }

    /// Resolve `key` to the registration with the longest matching prefix.
    pub fn resolve(&self, key: &str) -> CacheResult<Arc<Registration>> {
        {
            let mut resolved = self.resolved.lock();
            if let Some(hit) = resolved.get(key) {
                trace!(key, prefix = %hit.prefix, "resolution cache hit");
                return Ok(Arc::clone(hit));
            }
        }

        let registration = self.scan(key)?;
        self.resolved
            .lock()
            .put(key.to_string(), Arc::clone(&registration));
        debug!(key, prefix = %registration.prefix, "resolved key");
        Ok(registration)
    }

    // Longest match without comparing lengths: two prefixes matching the
    // same key cannot diverge before the shorter one ends, so one is a
    // prefix of the other and sorts strictly earlier. Scanning in
    // descending lexicographic order therefore visits longer matches first.
    fn scan(&self, key: &str) -> CacheResult<Arc<Registration>> {
        let registrations = self.registrations.read();
        for (prefix, registration) in registrations.iter().rev() {
            if key.starts_with(prefix.as_str()) {
                return Ok(Arc::clone(registration));
            }
        }
        // `""` matches every key, so reaching this point means the default
        // was never registered.
        Err(CacheError::NotConfigured)
    }

    /// Snapshot of every registration, in prefix order.
    pub(crate) fn registrations(&self) -> Vec<Arc<Registration>> {
        self.registrations.read().values().cloned().collect()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn registration(prefix: &str) -> Registration {
        Registration::new(prefix, Arc::new(MemoryBackend::new()), Vec::new())
    }

    fn router_with(prefixes: &[&str]) -> Router {
        let router = Router::new();
        for prefix in prefixes {
            router.insert(registration(prefix));
        }
        router
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = router_with(&["", "a", "ab"]);

        assert_eq!(router.resolve("abc").unwrap().prefix(), "ab");
        assert_eq!(router.resolve("axx").unwrap().prefix(), "a");
        assert_eq!(router.resolve("zzz").unwrap().prefix(), "");
    }

    #[test]
    fn test_resolution_independent_of_registration_order() {
        let forward = router_with(&["", "a", "ab"]);
        let backward = router_with(&["ab", "a", ""]);

        for key in ["abc", "axx", "a", "ab", "zzz", ""] {
            assert_eq!(
                forward.resolve(key).unwrap().prefix(),
                backward.resolve(key).unwrap().prefix(),
                "key {key:?}"
            );
        }
    }

    #[test]
    fn test_missing_default_is_not_configured() {
        let router = Router::new();
        assert!(matches!(
            router.resolve("anything"),
            Err(CacheError::NotConfigured)
        ));

        // A matching non-default prefix still resolves.
        let router = router_with(&["users:"]);
        assert_eq!(router.resolve("users:1").unwrap().prefix(), "users:");
        assert!(matches!(
            router.resolve("sessions:1"),
            Err(CacheError::NotConfigured)
        ));
    }

    #[test]
    fn test_resolution_is_idempotent_and_memoized() {
        let router = router_with(&["", "ab"]);

        let first = router.resolve("abc").unwrap();
        let second = router.resolve("abc").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Empty the table behind the resolver's back: the memoized answer
        // still comes back, proving the second lookup never rescans.
        router.registrations.write().clear();
        let third = router.resolve("abc").unwrap();
        assert!(Arc::ptr_eq(&first, &third));
        assert!(matches!(
            router.resolve("never-seen"),
            Err(CacheError::NotConfigured)
        ));
    }

    #[test]
    fn test_insert_clears_memoized_resolutions() {
        let router = router_with(&[""]);
        let stale = router.resolve("abc").unwrap();
        assert_eq!(stale.prefix(), "");

        router.insert(registration("ab"));
        let fresh = router.resolve("abc").unwrap();
        assert_eq!(fresh.prefix(), "ab");
    }

    #[test]
    fn test_overwriting_a_prefix_replaces_the_backend() {
        let router = router_with(&[""]);
        let old = router.resolve("k").unwrap();

        router.insert(registration(""));
        let new = router.resolve("k").unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
    }

    #[test]
    fn test_cache_bound_and_lru_eviction() {
        let router = router_with(&[""]);

        for i in 0..=RESOLUTION_CACHE_SIZE {
            router.resolve(&format!("key:{i}")).unwrap();
        }

        let resolved = router.resolved.lock();
        assert_eq!(resolved.len(), RESOLUTION_CACHE_SIZE);
        // The least recently resolved key went first.
        assert!(!resolved.contains("key:0"));
        assert!(resolved.contains("key:1"));
        assert!(resolved.contains(&format!("key:{RESOLUTION_CACHE_SIZE}")));
    }

    #[test]
    fn test_lru_promotion_on_hit() {
        let router = router_with(&[""]);

        router.resolve("first").unwrap();
        for i in 0..RESOLUTION_CACHE_SIZE - 1 {
            router.resolve(&format!("filler:{i}")).unwrap();
        }
        // Touch "first" so it is the most recently used entry…
        router.resolve("first").unwrap();
        // …then push one more key in; something else must be evicted.
        router.resolve("one-more").unwrap();

        let resolved = router.resolved.lock();
        assert_eq!(resolved.len(), RESOLUTION_CACHE_SIZE);
        assert!(resolved.contains("first"));
        assert!(!resolved.contains("filler:0"));
    }
}
