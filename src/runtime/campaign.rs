//! Campaign-scoped data loading for components.
//!
//! A [`CampaignScope`] tracks the campaign the dashboard is showing, filters
//! backend events down to that campaign and reloads component data when the
//! campaign changes. Subscriptions are registered on the component context
//! and released on detach.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::component::{ComponentContext, WeakContext};
use crate::bridge::events::{subscribe_filtered, EventBus, Unlisten};
use crate::bridge::rpc::{invoke_no_args, RpcBridge};

/// Topic published when the active campaign changes
pub const CAMPAIGN_CHANGED_EVENT: &str = "campaign-changed";

/// Campaign as returned by `get_current_campaign`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Reload callback run on the initial load and after each campaign change
pub type CampaignLoader = Rc<dyn Fn() -> LocalBoxFuture<'static, ()>>;

#[derive(Clone)]
pub struct CampaignScope {
    rpc: Arc<dyn RpcBridge>,
    bus: Rc<dyn EventBus>,
    current: Rc<RefCell<Option<String>>>,
    /// Bumped on every campaign change; a reload only applies if it is still the latest
    reload_generation: Rc<Cell<u64>>,
}

impl CampaignScope {
    pub fn new(rpc: Arc<dyn RpcBridge>, bus: Rc<dyn EventBus>) -> Self {
        Self {
            rpc,
            bus,
            current: Rc::new(RefCell::new(None)),
            reload_generation: Rc::new(Cell::new(0)),
        }
    }

    pub fn current_campaign_id(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Whether `payload.campaign_id` is the current campaign
    pub fn is_current(&self, payload: &Value) -> bool {
        match (payload.get("campaign_id").and_then(Value::as_str), self.current.borrow().as_deref()) {
            (Some(campaign_id), Some(current)) => campaign_id == current,
            _ => false,
        }
    }

    /// Ask the backend for the current campaign.
    ///
    /// On failure the scope has no current campaign.
    pub async fn refresh(&self) -> Option<String> {
        let id = self.fetch_current().await;
        *self.current.borrow_mut() = id.clone();
        id
    }

    async fn fetch_current(&self) -> Option<String> {
        match invoke_no_args::<Option<CampaignSummary>>(self.rpc.as_ref(), "get_current_campaign").await {
            Ok(campaign) => campaign.map(|c| c.id),
            Err(e) => {
                log::error!("Failed to get current campaign: {}", e);
                None
            }
        }
    }

    /// Refresh, run `loader`, and re-run both whenever the campaign changes.
    ///
    /// Reloads after a change are spawned with `tokio::task::spawn_local`, so
    /// the component must be driven from a `LocalSet`. A newer change aborts
    /// the reload in flight, and detaching the component aborts it too.
    pub async fn setup(&self, ctx: &ComponentContext, loader: CampaignLoader) {
        self.refresh().await;
        loader().await;

        let pending: Rc<RefCell<Option<tokio::task::JoinHandle<()>>>> = Rc::new(RefCell::new(None));
        let scope = self.clone();
        let weak = ctx.downgrade();
        let in_flight = Rc::clone(&pending);
        ctx.listen(self.bus.as_ref(), CAMPAIGN_CHANGED_EVENT, move |_| {
            let generation = scope.reload_generation.get().wrapping_add(1);
            scope.reload_generation.set(generation);
            let task = tokio::task::spawn_local(scope.clone().reload(weak.clone(), Rc::clone(&loader), generation));
            if let Some(previous) = in_flight.borrow_mut().replace(task) {
                previous.abort();
            }
        });
        ctx.add_unlisten(Unlisten::new(move || {
            if let Some(task) = pending.borrow_mut().take() {
                task.abort();
            }
        }));
    }

    async fn reload(self, ctx: WeakContext, loader: CampaignLoader, generation: u64) {
        let campaign = self.fetch_current().await;
        if self.reload_generation.get() != generation {
            log::debug!("Dropping superseded reload for {:?}", campaign);
            return;
        }
        if !ctx.upgrade().is_some_and(|c| c.is_connected()) {
            log::debug!("Component detached, skipping reload for {:?}", campaign);
            return;
        }
        *self.current.borrow_mut() = campaign.clone();
        log::debug!("Campaign changed to {:?}, reloading", campaign);
        loader().await;
    }

    /// Subscribe to `topic`, forwarding only payloads of the current campaign
    pub fn on_event<F>(&self, ctx: &ComponentContext, topic: &str, handler: F)
    where
        F: Fn(&Value) + 'static,
    {
        let scope = self.clone();
        let unlisten = subscribe_filtered(self.bus.as_ref(), topic, move |payload| scope.is_current(payload), handler);
        ctx.add_unlisten(unlisten);
    }
}
