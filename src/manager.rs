//! The cache facade: setup, dispatch, and lifecycle fan-out.

use crate::commands::{Command, CommandOutput, CommandRequest};
use crate::config::{BackendConfig, BackendKind};
use crate::error::{CacheError, CacheResult};
use crate::invalidation::Invalidate;
use crate::memory::MemoryBackend;
use crate::middleware::{AutoInit, CommandPipeline, DisableGate, Middleware};
use crate::router::{Registration, Router, DEFAULT_PREFIX};
use crate::traits::CacheBackend;
use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The owned dispatch context: registration table, resolution cache, and
/// the default middleware stack.
///
/// One `Cache` per application is typical, but nothing is global - separate
/// instances are fully independent, which keeps tests and multi-tenant
/// setups honest.
pub struct Cache {
    router: Router,
    invalidate: Invalidate,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            invalidate: Invalidate::new(),
        }
    }

    // ========== Setup ==========

    /// Parse `locator`, construct its backend, and register it under
    /// `prefix`, wrapped in the default middleware sequence plus
    /// `middlewares` appended after it.
    ///
    /// A `disable=true` query flag (or `enable=false`) registers the
    /// backend disabled. Registering the same prefix twice replaces the
    /// prior registration. Returns the constructed backend.
    pub fn setup(
        &self,
        locator: &str,
        middlewares: Vec<Arc<dyn Middleware>>,
        prefix: &str,
    ) -> CacheResult<Arc<dyn CacheBackend>> {
        let config = BackendConfig::from_url(locator)?;
        let backend: Arc<dyn CacheBackend> = match config.kind {
            BackendKind::Memory => Arc::new(MemoryBackend::from_config(&config)),
        };
        if !config.enabled {
            backend.disable();
        }
        info!(
            locator,
            prefix,
            kind = %config.kind,
            enabled = config.enabled,
            "setting up cache backend"
        );
        self.add_backend(Arc::clone(&backend), middlewares, prefix);
        Ok(backend)
    }

    /// Register an already-constructed backend under `prefix` - the escape
    /// hatch for backends the locator parser does not know about.
    pub fn add_backend(
        &self,
        backend: Arc<dyn CacheBackend>,
        middlewares: Vec<Arc<dyn Middleware>>,
        prefix: &str,
    ) {
        // Order is load-bearing: later entries wrap earlier ones, so the
        // gate registered first runs last, immediately before the raw call.
        let mut chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(DisableGate),
            Arc::new(AutoInit),
            Arc::new(self.invalidate.clone()),
        ];
        chain.extend(middlewares);
        self.router.insert(Registration::new(prefix, backend, chain));
    }

    /// Handle for registering invalidation dependencies.
    pub fn invalidation(&self) -> &Invalidate {
        &self.invalidate
    }

    // ========== Dispatch ==========

    /// The fully wrapped callable executing `command` for `key`.
    pub fn pipeline(&self, key: &str, command: Command) -> CacheResult<CommandPipeline> {
        Ok(self.router.resolve(key)?.pipeline(command))
    }

    /// The backend `key` routes to, without its middleware chain.
    pub fn backend(&self, key: &str) -> CacheResult<Arc<dyn CacheBackend>> {
        Ok(Arc::clone(self.router.resolve(key)?.backend()))
    }

    async fn dispatch(&self, key: &str, req: CommandRequest) -> CacheResult<CommandOutput> {
        self.pipeline(key, req.command())?.invoke(req).await
    }

    // ========== Typed Operations ==========

    /// Get a typed value from the cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let out = self
            .dispatch(key, CommandRequest::Get { key: key.to_string() })
            .await?;
        match out.into_value() {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value in the cache.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.dispatch(
            key,
            CommandRequest::Set {
                key: key.to_string(),
                value: json,
                ttl,
            },
        )
        .await?;
        Ok(())
    }

    /// Get a cached value, or compute, cache, and return it.
    ///
    /// Concurrent callers for the same absent key may each run `factory`;
    /// last write wins. Callers needing single-flight semantics should
    /// wrap the factory in their own lock.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = CacheResult<T>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = factory().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    /// Delete a key.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.dispatch(key, CommandRequest::Delete { key: key.to_string() })
            .await?;
        Ok(())
    }

    /// Check if a key exists.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        let out = self
            .dispatch(key, CommandRequest::Exists { key: key.to_string() })
            .await?;
        Ok(out.as_bool())
    }

    /// Get the remaining time-to-live of a key.
    pub async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let out = self
            .dispatch(key, CommandRequest::Ttl { key: key.to_string() })
            .await?;
        Ok(out.into_ttl())
    }

    /// Set the expiration of a key.
    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        self.dispatch(
            key,
            CommandRequest::Expire { key: key.to_string(), ttl },
        )
        .await?;
        Ok(())
    }

    /// Increment a numeric value, returning the new value.
    pub async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let out = self
            .dispatch(
                key,
                CommandRequest::Increment { key: key.to_string(), delta },
            )
            .await?;
        Ok(out.as_int())
    }

    /// Decrement a numeric value, returning the new value.
    pub async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let out = self
            .dispatch(
                key,
                CommandRequest::Decrement { key: key.to_string(), delta },
            )
            .await?;
        Ok(out.as_int())
    }

    /// Clear the backend registered under the default prefix.
    pub async fn clear(&self) -> CacheResult<()> {
        self.pipeline(DEFAULT_PREFIX, Command::Clear)?
            .invoke(CommandRequest::Clear)
            .await?;
        Ok(())
    }

    // ========== Lifecycle ==========

    /// Initialize every registered backend, concurrently.
    ///
    /// All backends are attempted; failures are aggregated into a single
    /// [`CacheError::Lifecycle`] naming each failing prefix.
    pub async fn init(&self) -> CacheResult<()> {
        let registrations = self.router.registrations();
        let results = join_all(
            registrations
                .iter()
                .map(|registration| registration.backend().init()),
        )
        .await;
        collect_failures("init", &registrations, results)
    }

    /// Set up `locator` under the default prefix, then initialize every
    /// registered backend.
    pub async fn init_with(&self, locator: &str) -> CacheResult<Arc<dyn CacheBackend>> {
        let backend = self.setup(locator, Vec::new(), DEFAULT_PREFIX)?;
        self.init().await?;
        Ok(backend)
    }

    /// Whether every registered backend is initialized. Short-circuits on
    /// the first uninitialized backend; vacuously true with no
    /// registrations.
    pub fn is_init(&self) -> bool {
        self.router
            .registrations()
            .iter()
            .all(|registration| registration.backend().is_init())
    }

    /// Close every registered backend, concurrently, aggregating failures
    /// like [`Cache::init`].
    pub async fn close(&self) -> CacheResult<()> {
        let registrations = self.router.registrations();
        let results = join_all(
            registrations
                .iter()
                .map(|registration| registration.backend().close()),
        )
        .await;
        collect_failures("close", &registrations, results)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_failures(
    op: &str,
    registrations: &[Arc<Registration>],
    results: Vec<CacheResult<()>>,
) -> CacheResult<()> {
    let failures: Vec<String> = registrations
        .iter()
        .zip(results)
        .filter_map(|(registration, result)| {
            result
                .err()
                .map(|e| format!("{:?}: {e}", registration.prefix()))
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CacheError::Lifecycle(format!(
            "{op} failed for {}",
            failures.join("; ")
        )))
    }
}
