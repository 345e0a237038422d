//! Persistent state shared between dashboard windows.
//!
//! A [`SyncedState`] keeps a JSON-encoded value under a storage key and
//! broadcasts every change on the event bus, so another window holding the
//! same key observes it as an [`StateSource::External`] update.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::events::{EventBus, Unlisten};

// ============================================================================
// Storage
// ============================================================================

/// String key/value storage shared by all windows
pub trait StateStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// In-memory [`StateStore`]; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values.borrow_mut().remove(key);
    }
}

// ============================================================================
// Synced State
// ============================================================================

/// Where a change originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    /// This instance wrote the value
    Local,
    /// Another instance sharing the key wrote the value
    External,
}

type Subscriber<T> = Rc<dyn Fn(&T, StateSource)>;

struct Subscribers<T> {
    next_id: Cell<u64>,
    list: RefCell<Vec<(u64, Subscriber<T>)>>,
}

impl<T> Subscribers<T> {
    fn notify(&self, value: &T, source: StateSource) {
        let snapshot: Vec<Subscriber<T>> = self.list.borrow().iter().map(|(_, s)| Rc::clone(s)).collect();
        for subscriber in snapshot {
            subscriber(value, source);
        }
    }
}

/// A value persisted under `key` and kept in sync across windows
pub struct SyncedState<T> {
    key: String,
    topic: String,
    default: T,
    origin: Uuid,
    store: Rc<dyn StateStore>,
    bus: Rc<dyn EventBus>,
    subscribers: Rc<Subscribers<T>>,
    bus_unlisten: RefCell<Option<Unlisten>>,
}

impl<T> SyncedState<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    pub fn new(key: &str, default: T, store: Rc<dyn StateStore>, bus: Rc<dyn EventBus>) -> Self {
        let origin = Uuid::new_v4();
        let topic = format!("synced-state:{}", key);
        let subscribers = Rc::new(Subscribers {
            next_id: Cell::new(0),
            list: RefCell::new(Vec::new()),
        });

        let external_subscribers = Rc::clone(&subscribers);
        let external_default = default.clone();
        let external_key = key.to_string();
        let unlisten = bus.subscribe(
            &topic,
            Rc::new(move |payload: &Value| {
                if payload["origin"].as_str() == Some(origin.to_string().as_str()) {
                    return;
                }
                let value = match payload["value"].as_str() {
                    Some(raw) => decode(&external_key, raw).unwrap_or_else(|| external_default.clone()),
                    None => external_default.clone(),
                };
                external_subscribers.notify(&value, StateSource::External);
            }),
        );

        Self {
            key: key.to_string(),
            topic,
            default,
            origin,
            store,
            bus,
            subscribers,
            bus_unlisten: RefCell::new(Some(unlisten)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, or the default when nothing (or garbage) is stored
    pub fn get(&self) -> T {
        self.store
            .get(&self.key)
            .and_then(|raw| decode(&self.key, &raw))
            .unwrap_or_else(|| self.default.clone())
    }

    /// Store `value`; returns false when it was already stored
    pub fn set(&self, value: T) -> bool {
        let encoded = match serde_json::to_string(&value) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::error!("Failed to encode synced state '{}': {}", self.key, e);
                return false;
            }
        };

        if self.store.get(&self.key).as_deref() == Some(encoded.as_str()) {
            return false;
        }

        self.store.set(&self.key, encoded.clone());
        self.subscribers.notify(&value, StateSource::Local);
        self.bus.publish(
            &self.topic,
            json!({ "origin": self.origin.to_string(), "value": encoded }),
        );
        true
    }

    /// Remove the stored value and reset subscribers to the default
    pub fn clear(&self) {
        self.store.remove(&self.key);
        self.subscribers.notify(&self.default, StateSource::Local);
        self.bus.publish(
            &self.topic,
            json!({ "origin": self.origin.to_string(), "value": Value::Null }),
        );
    }

    /// Observe changes from this and other instances
    pub fn subscribe<F>(&self, callback: F) -> Unlisten
    where
        F: Fn(&T, StateSource) + 'static,
    {
        let id = self.subscribers.next_id.get();
        self.subscribers.next_id.set(id + 1);
        self.subscribers.list.borrow_mut().push((id, Rc::new(callback)));

        let subscribers = Rc::downgrade(&self.subscribers);
        Unlisten::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.list.borrow_mut().retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Stop listening for external changes and drop all subscribers
    pub fn destroy(&self) {
        if let Some(unlisten) = self.bus_unlisten.borrow_mut().take() {
            if let Err(e) = unlisten.call() {
                log::warn!("Failed to detach synced state '{}': {}", self.key, e);
            }
        }
        self.subscribers.list.borrow_mut().clear();
    }
}

impl<T> Drop for SyncedState<T> {
    fn drop(&mut self) {
        if let Some(unlisten) = self.bus_unlisten.get_mut().take() {
            let _ = unlisten.call();
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Discarding unreadable synced state '{}': {}", key, e);
            None
        }
    }
}
