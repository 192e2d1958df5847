//! The closed command set and the typed request/output pairs that flow
//! through the dispatch pipeline.

use std::fmt;
use std::time::Duration;

/// Cache command identifiers.
///
/// The set is closed: every command maps to exactly one
/// [`CacheBackend`](crate::traits::CacheBackend) method, so a backend that
/// compiles supports every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Set,
    Delete,
    Exists,
    Ttl,
    Expire,
    Increment,
    Decrement,
    Clear,
}

impl Command {
    /// Stable lowercase name, used in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Get => "get",
            Command::Set => "set",
            Command::Delete => "delete",
            Command::Exists => "exists",
            Command::Ttl => "ttl",
            Command::Expire => "expire",
            Command::Increment => "increment",
            Command::Decrement => "decrement",
            Command::Clear => "clear",
        }
    }

    /// Whether the command mutates backend state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set
                | Command::Delete
                | Command::Expire
                | Command::Increment
                | Command::Decrement
                | Command::Clear
        )
    }

    /// Neutral output returned when a disabled backend short-circuits,
    /// shaped so callers see "nothing cached" rather than an error.
    pub fn gated_output(&self) -> CommandOutput {
        match self {
            Command::Get => CommandOutput::Value(None),
            Command::Exists => CommandOutput::Bool(false),
            Command::Ttl => CommandOutput::Ttl(None),
            Command::Increment | Command::Decrement => CommandOutput::Int(0),
            Command::Set | Command::Delete | Command::Expire | Command::Clear => {
                CommandOutput::Unit
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments for one command invocation.
///
/// Values are JSON strings; typed encoding lives in the
/// [`Cache`](crate::manager::Cache) facade.
#[derive(Debug, Clone)]
pub enum CommandRequest {
    Get { key: String },
    Set { key: String, value: String, ttl: Option<Duration> },
    Delete { key: String },
    Exists { key: String },
    Ttl { key: String },
    Expire { key: String, ttl: Duration },
    Increment { key: String, delta: i64 },
    Decrement { key: String, delta: i64 },
    Clear,
}

impl CommandRequest {
    /// The command this request belongs to.
    pub fn command(&self) -> Command {
        match self {
            CommandRequest::Get { .. } => Command::Get,
            CommandRequest::Set { .. } => Command::Set,
            CommandRequest::Delete { .. } => Command::Delete,
            CommandRequest::Exists { .. } => Command::Exists,
            CommandRequest::Ttl { .. } => Command::Ttl,
            CommandRequest::Expire { .. } => Command::Expire,
            CommandRequest::Increment { .. } => Command::Increment,
            CommandRequest::Decrement { .. } => Command::Decrement,
            CommandRequest::Clear => Command::Clear,
        }
    }

    /// The key the request operates on. `Clear` is keyless.
    pub fn key(&self) -> Option<&str> {
        match self {
            CommandRequest::Get { key }
            | CommandRequest::Set { key, .. }
            | CommandRequest::Delete { key }
            | CommandRequest::Exists { key }
            | CommandRequest::Ttl { key }
            | CommandRequest::Expire { key, .. }
            | CommandRequest::Increment { key, .. }
            | CommandRequest::Decrement { key, .. } => Some(key),
            CommandRequest::Clear => None,
        }
    }
}

/// Result of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Stored value, if present (`get`)
    Value(Option<String>),
    /// Boolean result (`exists`)
    Bool(bool),
    /// Numeric result (`increment`, `decrement`)
    Int(i64),
    /// Remaining time-to-live (`ttl`)
    Ttl(Option<Duration>),
    /// No payload (`set`, `delete`, `expire`, `clear`)
    Unit,
}

impl CommandOutput {
    /// Extract the stored value, or `None` for non-value outputs.
    pub fn into_value(self) -> Option<String> {
        match self {
            CommandOutput::Value(v) => v,
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, CommandOutput::Bool(true))
    }

    pub fn as_int(&self) -> i64 {
        match self {
            CommandOutput::Int(n) => *n,
            _ => 0,
        }
    }

    pub fn into_ttl(self) -> Option<Duration> {
        match self {
            CommandOutput::Ttl(t) => t,
            _ => None,
        }
    }
}
