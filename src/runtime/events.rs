//! Component events.
//!
//! Components emit named events carrying a JSON detail. Events bubble from
//! the emitting host through its ancestors and cross shadow boundaries, so a
//! listener on an enclosing component or the page root observes them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

/// An event dispatched through the component hierarchy
#[derive(Debug, Clone)]
pub struct ComponentEvent {
    pub name: String,
    pub detail: Value,
    pub bubbles: bool,
    pub composed: bool,
    target: String,
    propagation_stopped: Cell<bool>,
}

impl ComponentEvent {
    /// Bubbling, composed event
    pub fn new(name: &str, detail: Value) -> Self {
        Self {
            name: name.to_string(),
            detail,
            bubbles: true,
            composed: true,
            target: String::new(),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Event that only reaches listeners on the emitting target
    pub fn local(name: &str, detail: Value) -> Self {
        Self {
            bubbles: false,
            composed: false,
            ..Self::new(name, detail)
        }
    }

    /// Label of the target the event was dispatched from
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&ComponentEvent)>;

/// A node events are dispatched to: a component host or the page root.
///
/// Targets link to their parent weakly; the parent link is the shadow
/// boundary a composed event crosses.
pub struct EventTarget {
    label: String,
    parent: RefCell<Weak<EventTarget>>,
    listeners: RefCell<Vec<(ListenerId, String, Listener)>>,
    next_id: Cell<u64>,
}

impl EventTarget {
    pub fn new(label: &str) -> Rc<Self> {
        Rc::new(Self {
            label: label.to_string(),
            parent: RefCell::new(Weak::new()),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_parent(&self, parent: &Rc<EventTarget>) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
    }

    pub fn clear_parent(&self) {
        *self.parent.borrow_mut() = Weak::new();
    }

    pub fn parent(&self) -> Option<Rc<EventTarget>> {
        self.parent.borrow().upgrade()
    }

    pub fn add_event_listener<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&ComponentEvent) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .push((id, name.to_string(), Rc::new(listener)));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Dispatch `event` from this target; returns how many listeners ran
    pub fn dispatch(self: &Rc<Self>, mut event: ComponentEvent) -> usize {
        event.target = self.label.clone();
        let mut invoked = 0;
        let mut current = Some(Rc::clone(self));

        while let Some(target) = current {
            invoked += target.invoke(&event);
            if !event.bubbles || !event.composed || event.is_propagation_stopped() {
                break;
            }
            current = target.parent();
        }

        tracing::trace!(event = %event.name, target = %event.target, listeners = invoked, "event dispatched");
        invoked
    }

    fn invoke(&self, event: &ComponentEvent) -> usize {
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("label", &self.label)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
