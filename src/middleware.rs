//! Command middleware and the pipeline composer.
//!
//! A middleware wraps the execution of one command: it receives the request,
//! a [`Next`] continuation for the remainder of the pipeline, the command
//! identifier, and the owning backend. It may call `next` zero, one, or
//! several times, before, after, or instead of its own logic.
//!
//! Ordering is part of the contract. The pipeline folds the middleware
//! sequence around the raw backend operation so that **the middleware listed
//! last executes first** when the pipeline is invoked, and the middleware
//! listed first sits directly over the raw backend call. With the default
//! sequence (disable gate, auto-init, invalidation, then caller extras) the
//! runtime order is: extras, invalidation, auto-init, disable gate, backend
//! - the gate is the final check before the backend actually runs. A
//! middleware that must short-circuit before another middleware's side
//! effects has to be positioned later in the sequence.

use crate::commands::{Command, CommandOutput, CommandRequest};
use crate::error::CacheResult;
use crate::traits::CacheBackend;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// Type alias for the continuation that runs the remainder of the pipeline.
pub type Next = Box<
    dyn FnOnce(CommandRequest) -> Pin<Box<dyn Future<Output = CacheResult<CommandOutput>> + Send>>
        + Send,
>;

/// Cross-cutting behavior wrapped around a command's execution.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally delegate to the rest of the
    /// pipeline via `next`.
    async fn handle(
        &self,
        req: CommandRequest,
        next: Next,
        command: Command,
        backend: &Arc<dyn CacheBackend>,
    ) -> CacheResult<CommandOutput>;
}

/// The fully wrapped callable for one (command, registration) pair.
///
/// Built afresh on each dispatch - the fold length equals the middleware
/// count, which is small and fixed per registration.
#[derive(Clone)]
pub struct CommandPipeline {
    command: Command,
    backend: Arc<dyn CacheBackend>,
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl CommandPipeline {
    pub(crate) fn new(
        command: Command,
        backend: Arc<dyn CacheBackend>,
        middlewares: Arc<[Arc<dyn Middleware>]>,
    ) -> Self {
        Self {
            command,
            backend,
            middlewares,
        }
    }

    /// The command this pipeline executes.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The backend at the center of the pipeline.
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Invoke the wrapped command.
    pub async fn invoke(&self, req: CommandRequest) -> CacheResult<CommandOutput> {
        debug_assert_eq!(req.command(), self.command, "request/pipeline command mismatch");
        debug!(
            command = %self.command,
            middleware_count = self.middlewares.len(),
            "invoking command pipeline"
        );
        self.run_from(self.middlewares.len(), req).await
    }

    // Recurses by decreasing index: the middleware at `index - 1` runs, and
    // its `next` re-enters at `index - 1`. Index 0 is the raw backend call,
    // so the last-listed middleware is outermost and the first-listed one
    // executes immediately before the backend.
    fn run_from(
        &self,
        index: usize,
        req: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = CacheResult<CommandOutput>> + Send>> {
        if index == 0 {
            let backend = Arc::clone(&self.backend);
            trace!(command = %self.command, "pipeline complete, calling backend operation");
            Box::pin(async move { raw_call(backend.as_ref(), req).await })
        } else {
            let middleware = Arc::clone(&self.middlewares[index - 1]);
            let chain = self.clone();
            let command = self.command;
            let backend = Arc::clone(&self.backend);
            Box::pin(async move {
                let next: Next = Box::new(move |req| chain.run_from(index - 1, req));
                middleware.handle(req, next, command, &backend).await
            })
        }
    }
}

/// Execute the raw backend operation for `req`.
async fn raw_call(backend: &dyn CacheBackend, req: CommandRequest) -> CacheResult<CommandOutput> {
    match req {
        CommandRequest::Get { key } => Ok(CommandOutput::Value(backend.get(&key).await?)),
        CommandRequest::Set { key, value, ttl } => {
            backend.set(&key, value, ttl).await?;
            Ok(CommandOutput::Unit)
        }
        CommandRequest::Delete { key } => {
            backend.delete(&key).await?;
            Ok(CommandOutput::Unit)
        }
        CommandRequest::Exists { key } => Ok(CommandOutput::Bool(backend.exists(&key).await?)),
        CommandRequest::Ttl { key } => Ok(CommandOutput::Ttl(backend.ttl(&key).await?)),
        CommandRequest::Expire { key, ttl } => {
            backend.expire(&key, ttl).await?;
            Ok(CommandOutput::Unit)
        }
        CommandRequest::Increment { key, delta } => {
            Ok(CommandOutput::Int(backend.increment(&key, delta).await?))
        }
        CommandRequest::Decrement { key, delta } => {
            Ok(CommandOutput::Int(backend.decrement(&key, delta).await?))
        }
        CommandRequest::Clear => {
            backend.clear().await?;
            Ok(CommandOutput::Unit)
        }
    }
}

// ========== Built-in Middleware ==========

/// Short-circuits every command against a disabled backend.
///
/// Sits first in the default sequence, which makes it the *last* middleware
/// to run: nothing reaches the raw backend operation while the backend is
/// disabled, and callers observe each command's neutral output.
pub struct DisableGate;

#[async_trait]
impl Middleware for DisableGate {
    async fn handle(
        &self,
        req: CommandRequest,
        next: Next,
        command: Command,
        backend: &Arc<dyn CacheBackend>,
    ) -> CacheResult<CommandOutput> {
        if !backend.is_enabled() {
            trace!(command = %command, "backend disabled, short-circuiting");
            return Ok(command.gated_output());
        }
        next(req).await
    }
}

/// Initializes the backend on first dispatch.
///
/// `CacheBackend::init` is idempotent, so a race between two first
/// dispatches at worst initializes twice.
pub struct AutoInit;

#[async_trait]
impl Middleware for AutoInit {
    async fn handle(
        &self,
        req: CommandRequest,
        next: Next,
        command: Command,
        backend: &Arc<dyn CacheBackend>,
    ) -> CacheResult<CommandOutput> {
        if !backend.is_init() {
            debug!(command = %command, "initializing backend on first dispatch");
            backend.init().await?;
        }
        next(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct RecordingBackend {
        log: Arc<Mutex<Vec<String>>>,
        initialized: AtomicBool,
        enabled: AtomicBool,
    }

    impl RecordingBackend {
        fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                log,
                initialized: AtomicBool::new(false),
                enabled: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl CacheBackend for RecordingBackend {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            self.log.lock().push("backend".to_string());
            Ok(None)
        }
        async fn set(
            &self,
            _key: &str,
            _value: String,
            _ttl: Option<Duration>,
        ) -> CacheResult<()> {
            self.log.lock().push("backend".to_string());
            Ok(())
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Ok(())
        }
        async fn exists(&self, _key: &str) -> CacheResult<bool> {
            Ok(false)
        }
        async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
            Ok(None)
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<()> {
            Ok(())
        }
        async fn increment(&self, _key: &str, _delta: i64) -> CacheResult<i64> {
            Ok(0)
        }
        async fn clear(&self) -> CacheResult<()> {
            Ok(())
        }
        async fn init(&self) -> CacheResult<()> {
            self.log.lock().push("init".to_string());
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn close(&self) -> CacheResult<()> {
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

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn handle(
            &self,
            req: CommandRequest,
            next: Next,
            _command: Command,
            _backend: &Arc<dyn CacheBackend>,
        ) -> CacheResult<CommandOutput> {
            self.log.lock().push(format!("{}-before", self.name));
            let out = next(req).await;
            self.log.lock().push(format!("{}-after", self.name));
            out
        }
    }

    fn pipeline_with(
        log: &Arc<Mutex<Vec<String>>>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> CommandPipeline {
        let backend: Arc<dyn CacheBackend> = Arc::new(RecordingBackend::new(Arc::clone(log)));
        CommandPipeline::new(Command::Get, backend, middlewares.into())
    }

    #[tokio::test]
    async fn test_last_listed_middleware_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            &log,
            vec![
                Arc::new(Recorder { name: "m0", log: Arc::clone(&log) }),
                Arc::new(Recorder { name: "m1", log: Arc::clone(&log) }),
            ],
        );

        pipeline
            .invoke(CommandRequest::Get { key: "k".to_string() })
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["m1-before", "m0-before", "backend", "m0-after", "m1-after"]
        );
    }

    #[tokio::test]
    async fn test_empty_sequence_calls_backend_directly() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(&log, Vec::new());

        let out = pipeline
            .invoke(CommandRequest::Get { key: "k".to_string() })
            .await
            .unwrap();

        assert_eq!(out, CommandOutput::Value(None));
        assert_eq!(*log.lock(), vec!["backend"]);
    }

    #[tokio::test]
    async fn test_disable_gate_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(&log, vec![Arc::new(DisableGate)]);
        pipeline.backend().disable();

        let out = pipeline
            .invoke(CommandRequest::Get { key: "k".to_string() })
            .await
            .unwrap();

        assert_eq!(out, CommandOutput::Value(None));
        assert!(log.lock().is_empty(), "raw operation must not run");
    }

    #[tokio::test]
    async fn test_auto_init_runs_before_operation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(&log, vec![Arc::new(AutoInit)]);
        assert!(!pipeline.backend().is_init());

        pipeline
            .invoke(CommandRequest::Get { key: "k".to_string() })
            .await
            .unwrap();

        assert!(pipeline.backend().is_init());
        assert_eq!(*log.lock(), vec!["init", "backend"]);

        // Already initialized: no second init.
        pipeline
            .invoke(CommandRequest::Get { key: "k".to_string() })
            .await
            .unwrap();
        assert_eq!(*log.lock(), vec!["init", "backend", "backend"]);
    }

    #[tokio::test]
    async fn test_errors_propagate_through_outer_layers() {
        struct Failing;

        #[async_trait]
        impl Middleware for Failing {
            async fn handle(
                &self,
                _req: CommandRequest,
                _next: Next,
                _command: Command,
                _backend: &Arc<dyn CacheBackend>,
            ) -> CacheResult<CommandOutput> {
                Err(CacheError::Backend("boom".to_string()))
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            &log,
            vec![
                Arc::new(Failing),
                Arc::new(Recorder { name: "outer", log: Arc::clone(&log) }),
            ],
        );

        let err = pipeline
            .invoke(CommandRequest::Get { key: "k".to_string() })
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Backend(_)));
        // The outer middleware saw the request; the backend never ran.
        assert_eq!(*log.lock(), vec!["outer-before", "outer-after"]);
    }
}
