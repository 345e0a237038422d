//! One-shot readiness signal of a component instance.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

struct ReadyInner {
    sender: RefCell<Option<oneshot::Sender<()>>>,
    receiver: Shared<oneshot::Receiver<()>>,
    resolved: Cell<bool>,
}

/// Resolves exactly once, after setup completes for the first time.
///
/// Clones share the signal. Any number of waiters may await it, before or
/// after it resolves.
#[derive(Clone)]
pub struct ReadySignal {
    inner: Rc<ReadyInner>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            inner: Rc::new(ReadyInner {
                sender: RefCell::new(Some(sender)),
                receiver: receiver.shared(),
                resolved: Cell::new(false),
            }),
        }
    }

    /// Resolve the signal; returns false if it was already resolved
    pub fn resolve(&self) -> bool {
        match self.inner.sender.borrow_mut().take() {
            Some(sender) => {
                self.inner.resolved.set(true);
                let _ = sender.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.resolved.get()
    }

    /// Wait until the signal resolves
    pub async fn wait(&self) {
        if self.is_ready() {
            return;
        }
        // the sender lives as long as `inner`, so this cannot be cancelled
        let _ = self.inner.receiver.clone().await;
    }
}

impl std::fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadySignal").field("ready", &self.is_ready()).finish()
    }
}
