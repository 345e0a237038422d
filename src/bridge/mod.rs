//! Boundary between the dashboard UI core and its host.
//!
//! - `rpc`: command invocation against the native backend
//! - `events`: backend-pushed event subscriptions
//! - `fetch`: component resource retrieval
//! - `synced_state`: cross-window persistent state

pub mod events;
pub mod fetch;
pub mod rpc;
pub mod synced_state;

pub use events::{subscribe_filtered, EventBus, EventHandler, LocalEventBus, Unlisten};
pub use fetch::{EmbeddedFetcher, FetchError, FetchResult, FsFetcher, HttpFetcher, ResourceFetcher};
pub use rpc::{
    invoke, invoke_no_args, invoke_void, safe_invoke, safe_invoke_void, LocalRpcRouter, NoticeKind,
    NoticeSink, RpcBridge, RpcError, RpcResult, SafeInvokeOptions,
};
pub use synced_state::{MemoryStore, StateSource, StateStore, SyncedState};
