//! Prefix-routed cache dispatch for the Keyway caching facade.
//!
//! Keyway routes every cache command to a concrete storage backend by
//! longest matching key prefix, and wraps the execution in an ordered chain
//! of cross-cutting middleware.
//!
//! # Features
//!
//! - **Longest-prefix routing** - keys are partitioned across backends by
//!   string prefix, with `""` as the default that matches everything
//! - **Bounded resolution memoization** - repeated dispatches for a key skip
//!   the prefix scan via a 1000-entry LRU cache
//! - **Composable command middleware** - disable gating, lazy
//!   initialization, and invalidation ship by default; callers append their
//!   own
//! - **Lifecycle fan-out** - `init`/`close` run concurrently across every
//!   registered backend with aggregated failure reporting
//!
//! # Examples
//!
//! ## Setup and dispatch
//!
//! ```
//! use keyway::Cache;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keyway::CacheError> {
//!     let cache = Cache::new();
//!     cache.setup("mem://", Vec::new(), "")?;
//!
//!     cache.set("user:1", &"alice", None).await?;
//!     let name: Option<String> = cache.get("user:1").await?;
//!     assert_eq!(name.as_deref(), Some("alice"));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Partitioning keys across backends
//!
//! ```
//! use keyway::Cache;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keyway::CacheError> {
//!     let cache = Cache::new();
//!     cache.setup("mem://", Vec::new(), "")?;
//!     cache.setup("mem://", Vec::new(), "sessions:")?;
//!
//!     // Routed to the sessions backend by longest matching prefix.
//!     cache.set("sessions:42", &"token", None).await?;
//!     // Routed to the default backend.
//!     cache.set("users:42", &"alice", None).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Custom middleware
//!
//! Middleware wraps a command's execution; the middleware listed last runs
//! first, so caller extras observe everything the defaults do:
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use keyway::{Cache, CacheBackend, CacheResult, Command, CommandOutput, CommandRequest};
//! use keyway::middleware::{Middleware, Next};
//!
//! struct Traced;
//!
//! #[async_trait]
//! impl Middleware for Traced {
//!     async fn handle(
//!         &self,
//!         req: CommandRequest,
//!         next: Next,
//!         command: Command,
//!         _backend: &Arc<dyn CacheBackend>,
//!     ) -> CacheResult<CommandOutput> {
//!         println!("-> {command}");
//!         let out = next(req).await;
//!         println!("<- {command}");
//!         out
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keyway::CacheError> {
//!     let cache = Cache::new();
//!     cache.setup("mem://", vec![Arc::new(Traced)], "")?;
//!     cache.set("k", &1u8, None).await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod manager;
pub mod memory;
pub mod middleware;
pub mod router;
pub mod traits;

pub use commands::{Command, CommandOutput, CommandRequest};
pub use config::{BackendConfig, BackendKind};
pub use error::{CacheError, CacheResult};
pub use invalidation::Invalidate;
pub use manager::Cache;
pub use memory::MemoryBackend;
pub use middleware::{AutoInit, CommandPipeline, DisableGate, Middleware};
pub use router::{Registration, Router, DEFAULT_PREFIX};
pub use traits::CacheBackend;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{Command, CommandOutput, CommandRequest};
    pub use crate::config::{BackendConfig, BackendKind};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::invalidation::Invalidate;
    pub use crate::manager::Cache;
    pub use crate::memory::MemoryBackend;
    pub use crate::middleware::{Middleware, Next};
    pub use crate::router::DEFAULT_PREFIX;
    pub use crate::traits::CacheBackend;
}
