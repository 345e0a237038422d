//! Campaign-scoped loading tests
//!
//! Components driven from a `LocalSet`, backed by the in-process router and
//! event bus.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use url::Url;

use crate::bridge::events::{EventBus, LocalEventBus};
use crate::bridge::fetch::EmbeddedFetcher;
use crate::bridge::rpc::{LocalRpcRouter, RpcBridge, RpcResult};
use crate::runtime::cache::MemoryResourceCache;
use crate::runtime::campaign::{CampaignLoader, CampaignScope, CAMPAIGN_CHANGED_EVENT};
use crate::runtime::component::{Component, ComponentContext, ComponentHost, ComponentRuntime};
use crate::runtime::error::ComponentResult;
use crate::tests::mocks::campaign_router;

const ROLL_SAVED: &str = "dice-roll-saved";

/// Records every load and every event of its campaign
struct SessionLog {
    scope: CampaignScope,
    loads: Rc<RefCell<Vec<Option<String>>>>,
    events: Rc<RefCell<Vec<Value>>>,
}

#[async_trait(?Send)]
impl Component for SessionLog {
    const TAG: &'static str = "session-log";
    const MODULE: &'static str = "components/features/session/log/";

    async fn setup(&mut self, ctx: &ComponentContext) -> ComponentResult<()> {
        let scope = self.scope.clone();
        let loads = Rc::clone(&self.loads);
        let loader: CampaignLoader = Rc::new(move || {
            let scope = scope.clone();
            let loads = Rc::clone(&loads);
            async move {
                loads.borrow_mut().push(scope.current_campaign_id());
            }
            .boxed_local()
        });
        self.scope.setup(ctx, loader).await;

        let events = Rc::clone(&self.events);
        self.scope.on_event(ctx, ROLL_SAVED, move |payload| {
            events.borrow_mut().push(payload.clone());
        });
        Ok(())
    }
}

struct Fixture {
    host: ComponentHost<SessionLog>,
    bus: Rc<LocalEventBus>,
    loads: Rc<RefCell<Vec<Option<String>>>>,
    events: Rc<RefCell<Vec<Value>>>,
}

fn fixture(rpc: Arc<dyn RpcBridge>) -> Fixture {
    let base = Url::parse("app://localhost/").unwrap();
    let module = base.join(SessionLog::MODULE).unwrap();
    let fetcher = EmbeddedFetcher::new()
        .with_asset(&module.join("styles.css").unwrap(), "")
        .with_asset(&module.join("template.html").unwrap(), "<ol class=\"entries\"></ol>");
    let runtime = ComponentRuntime::new(base, Rc::new(MemoryResourceCache::new()), Arc::new(fetcher));

    let bus = Rc::new(LocalEventBus::new());
    let event_bus: Rc<dyn EventBus> = bus.clone();
    let loads = Rc::new(RefCell::new(Vec::new()));
    let events = Rc::new(RefCell::new(Vec::new()));
    let component = SessionLog {
        scope: CampaignScope::new(rpc, event_bus),
        loads: Rc::clone(&loads),
        events: Rc::clone(&events),
    };

    Fixture {
        host: ComponentHost::new(runtime, component),
        bus,
        loads,
        events,
    }
}

/// Router whose current campaign can be switched from the test
fn switchable_router(initial: &str) -> (Arc<LocalRpcRouter>, Arc<Mutex<String>>) {
    let current = Arc::new(Mutex::new(initial.to_string()));
    let router = LocalRpcRouter::new();
    let c = Arc::clone(&current);
    router.register("get_current_campaign", move |_| {
        let id = c.lock().map(|id| id.clone()).map_err(|e| e.to_string())?;
        Ok(json!({ "id": id, "name": "Campaign" }))
    });
    (Arc::new(router), current)
}

/// Answers `get_current_campaign` from a script of `(latency, campaign)` replies
struct ScriptedCampaigns {
    replies: Mutex<VecDeque<(Duration, &'static str)>>,
}

impl ScriptedCampaigns {
    fn new(replies: &[(u64, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|&(ms, id)| (Duration::from_millis(ms), id)).collect()),
        })
    }
}

#[async_trait]
impl RpcBridge for ScriptedCampaigns {
    async fn call(&self, _command: &str, _args: Value) -> RpcResult<Value> {
        let (latency, id) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected get_current_campaign call");
        tokio::time::sleep(latency).await;
        Ok(json!({ "id": id, "name": "Campaign" }))
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_initial_load_sees_current_campaign() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let f = fixture(Arc::new(campaign_router(Some("camp-1"))));
            f.host.connect().await.unwrap();

            assert_eq!(*f.loads.borrow(), vec![Some("camp-1".to_string())]);
            assert!(f.host.is_ready());
        })
        .await;
}

#[tokio::test]
async fn test_no_current_campaign_loads_with_none() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let f = fixture(Arc::new(campaign_router(None)));
            f.host.connect().await.unwrap();
            assert_eq!(*f.loads.borrow(), vec![None]);
        })
        .await;
}

#[tokio::test]
async fn test_backend_failure_loads_with_none() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let f = fixture(Arc::new(LocalRpcRouter::new()));
            f.host.connect().await.unwrap();
            assert_eq!(*f.loads.borrow(), vec![None]);
        })
        .await;
}

#[tokio::test]
async fn test_campaign_change_reloads() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (router, current) = switchable_router("camp-1");
            let f = fixture(router);
            f.host.connect().await.unwrap();

            *current.lock().unwrap() = "camp-2".to_string();
            f.bus.publish(CAMPAIGN_CHANGED_EVENT, json!({ "id": "camp-2" }));
            settle().await;

            assert_eq!(
                *f.loads.borrow(),
                vec![Some("camp-1".to_string()), Some("camp-2".to_string())]
            );
        })
        .await;
}

#[tokio::test]
async fn test_events_filtered_to_current_campaign() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (router, current) = switchable_router("camp-1");
            let f = fixture(router);
            f.host.connect().await.unwrap();

            f.bus.publish(ROLL_SAVED, json!({ "campaign_id": "camp-1", "total": 12 }));
            f.bus.publish(ROLL_SAVED, json!({ "campaign_id": "camp-9", "total": 3 }));
            f.bus.publish(ROLL_SAVED, json!({ "total": 7 }));
            assert_eq!(*f.events.borrow(), vec![json!({ "campaign_id": "camp-1", "total": 12 })]);

            *current.lock().unwrap() = "camp-9".to_string();
            f.bus.publish(CAMPAIGN_CHANGED_EVENT, Value::Null);
            settle().await;

            f.bus.publish(ROLL_SAVED, json!({ "campaign_id": "camp-1", "total": 4 }));
            f.bus.publish(ROLL_SAVED, json!({ "campaign_id": "camp-9", "total": 20 }));
            assert_eq!(f.events.borrow().len(), 2);
            assert_eq!(f.events.borrow()[1]["total"], 20);
        })
        .await;
}

#[tokio::test]
async fn test_detach_stops_campaign_subscriptions() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (router, _current) = switchable_router("camp-1");
            let f = fixture(router);
            f.host.connect().await.unwrap();
            assert_eq!(f.bus.subscriber_count(CAMPAIGN_CHANGED_EVENT), 1);
            assert_eq!(f.bus.subscriber_count(ROLL_SAVED), 1);

            f.host.disconnect();
            assert_eq!(f.bus.subscriber_count(CAMPAIGN_CHANGED_EVENT), 0);
            assert_eq!(f.bus.subscriber_count(ROLL_SAVED), 0);

            f.bus.publish(CAMPAIGN_CHANGED_EVENT, Value::Null);
            settle().await;
            assert_eq!(f.loads.borrow().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn test_detach_during_reload_skips_loader() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let f = fixture(ScriptedCampaigns::new(&[(0, "camp-1"), (30, "camp-2")]));
            f.host.connect().await.unwrap();

            f.bus.publish(CAMPAIGN_CHANGED_EVENT, Value::Null);
            tokio::time::sleep(Duration::from_millis(5)).await;
            f.host.disconnect();
            tokio::time::sleep(Duration::from_millis(60)).await;

            assert_eq!(*f.loads.borrow(), vec![Some("camp-1".to_string())]);
        })
        .await;
}

#[tokio::test]
async fn test_newer_campaign_change_supersedes_slow_reload() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let f = fixture(ScriptedCampaigns::new(&[(0, "camp-1"), (60, "camp-2"), (5, "camp-3")]));
            f.host.connect().await.unwrap();

            f.bus.publish(CAMPAIGN_CHANGED_EVENT, Value::Null);
            tokio::time::sleep(Duration::from_millis(5)).await;
            f.bus.publish(CAMPAIGN_CHANGED_EVENT, Value::Null);
            tokio::time::sleep(Duration::from_millis(100)).await;

            assert_eq!(
                *f.loads.borrow(),
                vec![Some("camp-1".to_string()), Some("camp-3".to_string())]
            );
            assert_eq!(f.host.with_component(|c| c.scope.current_campaign_id()), Some(Some("camp-3".to_string())));
        })
        .await;
}
