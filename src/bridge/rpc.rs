//! RPC bridge to the native backend.
//!
//! The backend is reached through a single opaque call,
//! `call(command, args) -> result`. Typed wrappers serialize arguments and
//! deserialize responses; [`safe_invoke`] is the call-site recovery path that
//! logs failures, optionally raises a transient notice, and hands back `None`
//! so an RPC failure never reaches rendering code.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the RPC boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Failed to serialize args: {0}")]
    Serialization(String),

    #[error("Failed to deserialize response: {0}")]
    Deserialization(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for RPC calls
pub type RpcResult<T> = Result<T, RpcError>;

// ============================================================================
// Bridge
// ============================================================================

/// Opaque command channel to the backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcBridge: Send + Sync {
    /// Invoke `command` with JSON arguments
    async fn call(&self, command: &str, args: Value) -> RpcResult<Value>;
}

/// Invoke a command with typed arguments and response
pub async fn invoke<A, R>(bridge: &dyn RpcBridge, command: &str, args: &A) -> RpcResult<R>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let args = serde_json::to_value(args).map_err(|e| RpcError::Serialization(e.to_string()))?;
    let result = bridge.call(command, args).await?;
    serde_json::from_value(result).map_err(|e| RpcError::Deserialization(e.to_string()))
}

/// Invoke a command with no arguments
pub async fn invoke_no_args<R: DeserializeOwned>(bridge: &dyn RpcBridge, command: &str) -> RpcResult<R> {
    invoke(bridge, command, &json!({})).await
}

/// Invoke a command whose response carries no data
pub async fn invoke_void<A>(bridge: &dyn RpcBridge, command: &str, args: &A) -> RpcResult<()>
where
    A: Serialize + ?Sized,
{
    let args = serde_json::to_value(args).map_err(|e| RpcError::Serialization(e.to_string()))?;
    bridge.call(command, args).await.map(|_| ())
}

// ============================================================================
// Transient Notices
// ============================================================================

/// Severity of a transient user notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Warning,
    Info,
}

/// Receiver for transient notices (toasts)
pub trait NoticeSink {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// How [`safe_invoke`] reports a failure
#[derive(Default, Clone, Copy)]
pub struct SafeInvokeOptions<'a> {
    /// Message prefix; defaults to `Failed to execute <command>`
    pub error_message: Option<&'a str>,
    /// Where to raise a transient notice, if anywhere
    pub notices: Option<&'a dyn NoticeSink>,
}

impl<'a> SafeInvokeOptions<'a> {
    pub fn message(error_message: &'a str) -> Self {
        Self {
            error_message: Some(error_message),
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: &'a dyn NoticeSink) -> Self {
        self.notices = Some(notices);
        self
    }
}

/// Invoke a command, recovering from failure at the call site.
///
/// Errors are logged (and raised as a notice when a sink is given) and
/// `None` is returned. Use [`invoke`] when the caller needs the error.
pub async fn safe_invoke<A, R>(
    bridge: &dyn RpcBridge,
    command: &str,
    args: &A,
    options: SafeInvokeOptions<'_>,
) -> Option<R>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    match invoke(bridge, command, args).await {
        Ok(value) => Some(value),
        Err(err) => {
            report_failure(command, &err, options);
            None
        }
    }
}

/// [`safe_invoke`] for commands without a response payload; returns success
pub async fn safe_invoke_void<A>(
    bridge: &dyn RpcBridge,
    command: &str,
    args: &A,
    options: SafeInvokeOptions<'_>,
) -> bool
where
    A: Serialize + ?Sized,
{
    match invoke_void(bridge, command, args).await {
        Ok(()) => true,
        Err(err) => {
            report_failure(command, &err, options);
            false
        }
    }
}

fn report_failure(command: &str, err: &RpcError, options: SafeInvokeOptions<'_>) {
    let message = options
        .error_message
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Failed to execute {}", command));
    log::error!("{}: {}", message, err);

    if let Some(notices) = options.notices {
        notices.notify(NoticeKind::Error, &message);
    }
}

// ============================================================================
// In-process Router
// ============================================================================

type CommandHandler = Box<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// In-process command table implementing [`RpcBridge`].
///
/// Used to embed the dashboard without a native host and to stand in for the
/// backend in tests.
#[derive(Default)]
pub struct LocalRpcRouter {
    handlers: RwLock<HashMap<String, CommandHandler>>,
}

impl LocalRpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `command`
    pub fn register<F>(&self, command: &str, handler: F)
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        match self.handlers.write() {
            Ok(mut handlers) => {
                handlers.insert(command.to_string(), Box::new(handler));
            }
            Err(_) => log::error!("RPC router lock poisoned; '{}' not registered", command),
        }
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_command<F>(self, command: &str, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(command, handler);
        self
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.handlers
            .read()
            .map(|handlers| handlers.contains_key(command))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RpcBridge for LocalRpcRouter {
    async fn call(&self, command: &str, args: Value) -> RpcResult<Value> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| RpcError::Unavailable("router lock poisoned".to_string()))?;
        let handler = handlers
            .get(command)
            .ok_or_else(|| RpcError::UnknownCommand(command.to_string()))?;

        handler(args).map_err(|message| RpcError::Command {
            command: command.to_string(),
            message,
        })
    }
}
