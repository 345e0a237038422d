//! Mock implementations for testing
//!
//! Hand-written test doubles for the bridge traits, plus re-exports of the
//! `mockall` automocks generated for `RpcBridge` and `ResourceFetcher`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::bridge::fetch::{FetchError, FetchResult, ResourceFetcher};
use crate::bridge::rpc::LocalRpcRouter;

pub use crate::bridge::fetch::MockResourceFetcher;
pub use crate::bridge::rpc::MockRpcBridge;

// ============================================================================
// Counting Fetcher
// ============================================================================

/// Serves registered bodies after a delay, counting requests per URL.
///
/// The delay keeps every load pending across at least one poll, so callers
/// started together are guaranteed to overlap.
#[derive(Default)]
pub struct CountingFetcher {
    bodies: Mutex<HashMap<String, String>>,
    failing: Mutex<HashMap<String, u16>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn serve(&self, url: &str, body: &str) {
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.insert(url.to_string(), body.to_string());
        }
    }

    /// Answer `url` with an HTTP error status until [`heal`](Self::heal)
    pub fn fail(&self, url: &str, status: u16) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(url.to_string(), status);
        }
    }

    pub fn heal(&self, url: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(url);
        }
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for CountingFetcher {
    async fn fetch_text(&self, url: &Url) -> FetchResult<String> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(url.to_string()).or_default() += 1;
        }

        tokio::time::sleep(self.delay).await;

        let status = self.failing.lock().ok().and_then(|f| f.get(url.as_str()).copied());
        if let Some(status) = status {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                reason: "Test Failure".to_string(),
            });
        }

        self.bodies
            .lock()
            .ok()
            .and_then(|bodies| bodies.get(url.as_str()).cloned())
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

// ============================================================================
// Backend fixtures
// ============================================================================

/// Router answering `get_current_campaign` with `campaign_id`
pub fn campaign_router(campaign_id: Option<&str>) -> LocalRpcRouter {
    let campaign = campaign_id.map(|id| json!({ "id": id, "name": "Shadows of Brindlemark" }));
    LocalRpcRouter::new().with_command("get_current_campaign", move |_| {
        Ok(campaign.clone().unwrap_or(Value::Null))
    })
}
