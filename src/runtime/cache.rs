//! Resource Cache
//!
//! Process-wide cache of component stylesheets and templates, keyed by
//! component type and resource kind.
//!
//! # Features
//!
//! - At most one load in flight per key: concurrent requests share it
//! - Successful loads are kept for the life of the cache
//! - Failed loads are not cached; the next request starts a fresh load

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::bridge::fetch::FetchError;

// ============================================================================
// Keys
// ============================================================================

/// Kind of resource a component loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Style,
    Template,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Style => f.write_str("styles"),
            Self::Template => f.write_str("template"),
        }
    }
}

/// Cache key: component type plus resource kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub component: String,
    pub kind: ResourceKind,
}

impl CacheKey {
    pub fn new(component: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            component: component.into(),
            kind,
        }
    }

    pub fn style(component: impl Into<String>) -> Self {
        Self::new(component, ResourceKind::Style)
    }

    pub fn template(component: impl Into<String>) -> Self {
        Self::new(component, ResourceKind::Template)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.component, self.kind)
    }
}

// ============================================================================
// Cache trait
// ============================================================================

/// A pending resource load; only polled if the cache needs it
pub type ResourceLoad = LocalBoxFuture<'static, Result<String, FetchError>>;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a completed entry
    pub hits: u64,
    /// Loads actually started
    pub loads: u64,
    /// Requests that joined a load already in flight
    pub coalesced: u64,
    /// Loads that failed
    pub failures: u64,
    /// Completed entries currently held
    pub entries: usize,
}

/// Shared store for component resources
#[async_trait(?Send)]
pub trait ResourceCache {
    /// Completed entry for `key`, if any
    fn get(&self, key: &CacheKey) -> Option<Rc<str>>;

    /// Return the entry for `key`, joining or starting a load as needed.
    ///
    /// `loader` is only awaited when no entry exists and no load is in
    /// flight for `key`.
    async fn get_or_load(&self, key: &CacheKey, loader: ResourceLoad) -> Result<Rc<str>, FetchError>;

    fn stats(&self) -> CacheStats;
}

// ============================================================================
// In-memory implementation
// ============================================================================

type SharedLoad = Shared<LocalBoxFuture<'static, Result<Rc<str>, FetchError>>>;

/// In-memory [`ResourceCache`] for a single-threaded runtime
#[derive(Default)]
pub struct MemoryResourceCache {
    entries: RefCell<HashMap<CacheKey, Rc<str>>>,
    /// In-flight loads tagged with a generation so a finished load only
    /// removes itself
    pending: RefCell<HashMap<CacheKey, (u64, SharedLoad)>>,
    next_generation: Cell<u64>,
    stats: Cell<CacheStats>,
}

impl MemoryResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loads currently in flight
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drop every completed entry
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.update_stats(|stats| stats.entries = 0);
    }

    fn update_stats(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

#[async_trait(?Send)]
impl ResourceCache for MemoryResourceCache {
    fn get(&self, key: &CacheKey) -> Option<Rc<str>> {
        self.entries.borrow().get(key).cloned()
    }

    async fn get_or_load(&self, key: &CacheKey, loader: ResourceLoad) -> Result<Rc<str>, FetchError> {
        if let Some(hit) = self.get(key) {
            self.update_stats(|stats| stats.hits += 1);
            tracing::trace!(key = %key, "resource cache hit");
            return Ok(hit);
        }

        let existing = self.pending.borrow().get(key).cloned();
        let (generation, load) = match existing {
            Some(pending) => {
                self.update_stats(|stats| stats.coalesced += 1);
                tracing::trace!(key = %key, "joining in-flight resource load");
                pending
            }
            None => {
                let generation = self.next_generation.get();
                self.next_generation.set(generation + 1);
                let load: SharedLoad = loader.map(|result| result.map(Rc::from)).boxed_local().shared();
                self.pending
                    .borrow_mut()
                    .insert(key.clone(), (generation, load.clone()));
                self.update_stats(|stats| stats.loads += 1);
                tracing::debug!(key = %key, "starting resource load");
                (generation, load)
            }
        };

        let result = load.await;

        // First waiter to observe completion settles the entry
        let settled_here = {
            let mut pending = self.pending.borrow_mut();
            match pending.get(key) {
                Some((current, _)) if *current == generation => {
                    pending.remove(key);
                    true
                }
                _ => false,
            }
        };

        if settled_here {
            match &result {
                Ok(body) => {
                    let mut entries = self.entries.borrow_mut();
                    entries.insert(key.clone(), Rc::clone(body));
                    let count = entries.len();
                    self.update_stats(|stats| stats.entries = count);
                }
                Err(err) => {
                    self.update_stats(|stats| stats.failures += 1);
                    tracing::warn!(key = %key, error = %err, "resource load failed");
                }
            }
        }

        result
    }

    fn stats(&self) -> CacheStats {
        self.stats.get()
    }
}
