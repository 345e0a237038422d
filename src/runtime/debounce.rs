//! Debounced invocation.
//!
//! A [`Debounced`] runs its function once, `delay` after the most recent
//! call, with that call's argument. Cancelling drops the pending call.
//!
//! Calls are scheduled with `tokio::task::spawn_local`, so they must be made
//! from within a `tokio::task::LocalSet`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Default debounce delay
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

struct DebounceInner<T> {
    delay: Duration,
    func: Rc<dyn Fn(T)>,
    pending: RefCell<Option<JoinHandle<()>>>,
}

/// Trailing-edge debouncer; clones share the pending call
pub struct Debounced<T> {
    inner: Rc<DebounceInner<T>>,
}

impl<T> Clone for Debounced<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Debounced<T> {
    pub fn new<F>(delay: Duration, func: F) -> Self
    where
        F: Fn(T) + 'static,
    {
        Self {
            inner: Rc::new(DebounceInner {
                delay,
                func: Rc::new(func),
                pending: RefCell::new(None),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Schedule `func(arg)`, replacing any pending call.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`.
    pub fn call(&self, arg: T) {
        self.cancel();

        let delay = self.inner.delay;
        let func = Rc::clone(&self.inner.func);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            func(arg);
        });
        *self.inner.pending.borrow_mut() = Some(handle);
    }

    /// Drop the pending call, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.inner.pending.borrow_mut().take() {
            handle.abort();
        }
    }

    /// Whether a call is scheduled and has not run yet
    pub fn is_pending(&self) -> bool {
        self.inner
            .pending
            .borrow()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}
