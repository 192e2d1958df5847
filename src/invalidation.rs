//! Dependency-tracking invalidation middleware.
//!
//! Part of the default middleware sequence: whenever a write command
//! succeeds against a key, every key registered as dependent on it is
//! deleted from the same backend. Dependencies are registered through the
//! handle returned by [`Cache::invalidation`](crate::manager::Cache::invalidation).

use crate::commands::{Command, CommandOutput, CommandRequest};
use crate::error::CacheResult;
use crate::middleware::{Middleware, Next};
use crate::traits::CacheBackend;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Purges dependent keys when a write command touches their source key.
#[derive(Clone, Default)]
pub struct Invalidate {
    /// Source key to dependent keys mapping
    dependents: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl Invalidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dependent` for deletion whenever `source` is written.
    pub async fn depend(&self, source: &str, dependent: &str) {
        self.dependents
            .write()
            .await
            .entry(source.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Drop all dependencies registered for `source`.
    pub async fn forget(&self, source: &str) {
        self.dependents.write().await.remove(source);
    }

    async fn dependents_of(&self, source: &str) -> Vec<String> {
        let map = self.dependents.read().await;
        map.get(source)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Middleware for Invalidate {
    async fn handle(
        &self,
        req: CommandRequest,
        next: Next,
        command: Command,
        backend: &Arc<dyn CacheBackend>,
    ) -> CacheResult<CommandOutput> {
        let source = req.key().map(str::to_string);
        let out = next(req).await?;

        if command.is_write() {
            if let Some(key) = source {
                let stale = self.dependents_of(&key).await;
                if !stale.is_empty() {
                    debug!(
                        command = %command,
                        source = %key,
                        count = stale.len(),
                        "purging dependent keys"
                    );
                    for dependent in &stale {
                        backend.delete(dependent).await?;
                    }
                }
            }
        }

        Ok(out)
    }
}
