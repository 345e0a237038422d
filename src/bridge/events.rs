//! Backend event subscriptions.
//!
//! Subscribing to a topic yields an [`Unlisten`] token; invoking it removes
//! the subscription. Components hand their tokens to the component context so
//! they are released on detach.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

// ============================================================================
// Unlisten
// ============================================================================

/// One-shot removal token for a subscription.
///
/// Removal may fail (for instance when the backend connection has already
/// gone away); the error is reported to the caller of [`Unlisten::call`].
pub struct Unlisten {
    remove: Box<dyn FnOnce() -> Result<(), String>>,
}

impl Unlisten {
    /// Wrap an infallible removal
    pub fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            remove: Box::new(move || {
                remove();
                Ok(())
            }),
        }
    }

    /// Wrap a removal that can fail
    pub fn fallible<F>(remove: F) -> Self
    where
        F: FnOnce() -> Result<(), String> + 'static,
    {
        Self {
            remove: Box::new(remove),
        }
    }

    /// Token that does nothing
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Remove the subscription
    pub fn call(self) -> Result<(), String> {
        (self.remove)()
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unlisten")
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Topic handler
pub type EventHandler = Rc<dyn Fn(&Value)>;

/// Publish/subscribe channel for backend-pushed events
pub trait EventBus {
    /// Subscribe `handler` to `topic`
    fn subscribe(&self, topic: &str, handler: EventHandler) -> Unlisten;

    /// Deliver `payload` to every current subscriber of `topic`
    fn publish(&self, topic: &str, payload: Value);
}

/// Subscribe a handler that only sees payloads accepted by `filter`
pub fn subscribe_filtered<F, H>(bus: &dyn EventBus, topic: &str, filter: F, handler: H) -> Unlisten
where
    F: Fn(&Value) -> bool + 'static,
    H: Fn(&Value) + 'static,
{
    bus.subscribe(
        topic,
        Rc::new(move |payload: &Value| {
            if filter(payload) {
                handler(payload);
            }
        }),
    )
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    topics: RefCell<HashMap<String, Vec<(u64, EventHandler)>>>,
}

/// Single-threaded in-process event bus.
///
/// Handlers run in registration order. The subscriber list is snapshotted at
/// publish time, so handlers may subscribe or unlisten while being called.
#[derive(Clone, Default)]
pub struct LocalEventBus {
    inner: Rc<BusInner>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .borrow()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&self, topic: &str, handler: EventHandler) -> Unlisten {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .topics
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));

        let weak: Weak<BusInner> = Rc::downgrade(&self.inner);
        let topic = topic.to_string();
        Unlisten::fallible(move || {
            let inner = weak
                .upgrade()
                .ok_or_else(|| format!("event bus dropped before unlisten of '{}'", topic))?;
            let mut topics = inner.topics.borrow_mut();
            if let Some(handlers) = topics.get_mut(&topic) {
                handlers.retain(|(handler_id, _)| *handler_id != id);
                if handlers.is_empty() {
                    topics.remove(&topic);
                }
            }
            Ok(())
        })
    }

    fn publish(&self, topic: &str, payload: Value) {
        let handlers: Vec<EventHandler> = match self.inner.topics.borrow().get(topic) {
            Some(handlers) => handlers.iter().map(|(_, h)| Rc::clone(h)).collect(),
            None => return,
        };

        log::trace!("Publishing '{}' to {} subscriber(s)", topic, handlers.len());
        for handler in handlers {
            handler(&payload);
        }
    }
}
