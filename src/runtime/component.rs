//! Component Lifecycle
//!
//! Every dashboard element is a [`Component`] driven by a [`ComponentHost`].
//! On attach the host loads the component type's stylesheet and template
//! through the shared [`ResourceCache`], injects them into the instance's
//! shadow tree, runs `setup` and resolves the instance's ready signal. On
//! detach it releases every cleanup the instance registered and calls
//! `cleanup`.
//!
//! Hosts are single-threaded: they are driven from one task (or a
//! `tokio::task::LocalSet`) and share state through `Rc`.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use url::Url;

use super::attributes::{AttributeChange, Attributes};
use super::cache::{CacheKey, CacheStats, MemoryResourceCache, ResourceCache, ResourceKind};
use super::debounce::Debounced;
use super::dom::{NodeId, ShadowTree};
use super::error::{ComponentError, ComponentResult};
use super::events::{ComponentEvent, EventTarget};
use super::ready::ReadySignal;
use crate::bridge::events::{EventBus, Unlisten};
use crate::bridge::fetch::ResourceFetcher;
use crate::config::RuntimeConfig;

// ============================================================================
// Component trait
// ============================================================================

/// Behaviour of a dashboard component type.
///
/// Implementors only describe what is specific to the type; resource loading,
/// shadow tree injection, readiness and teardown are handled by the host.
#[async_trait(?Send)]
pub trait Component: 'static {
    /// Element name, e.g. `dice-roller`
    const TAG: &'static str;

    /// Module location resources resolve against, relative to the runtime's
    /// asset base URL. Also identifies the type in the resource cache.
    const MODULE: &'static str;

    /// Attributes whose changes reach [`Component::on_attribute_changed`]
    const OBSERVED_ATTRIBUTES: &'static [&'static str] = &[];

    /// Stylesheet path relative to [`Component::MODULE`]
    fn styles_path(&self) -> Option<&str> {
        Some("./styles.css")
    }

    /// Template path relative to [`Component::MODULE`]
    fn template_path(&self) -> Option<&str> {
        Some("./template.html")
    }

    /// Runs after resources are injected, on every attach
    async fn setup(&mut self, _ctx: &ComponentContext) -> ComponentResult<()> {
        Ok(())
    }

    /// Runs on detach, after registered cleanups were released
    fn cleanup(&mut self, _ctx: &ComponentContext) {}

    /// An observed attribute changed after setup completed
    fn on_attribute_changed(
        &mut self,
        _ctx: &ComponentContext,
        _name: &str,
        _old_value: Option<&str>,
        _new_value: Option<&str>,
    ) {
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Loaded resources of a component type
#[derive(Debug, Clone)]
pub struct LoadedResources {
    pub styles: Rc<str>,
    pub template: Rc<str>,
}

/// Shared services for component hosts: resource cache, fetcher and the
/// base URL module locations resolve against.
pub struct ComponentRuntime {
    base_url: Url,
    cache: Rc<dyn ResourceCache>,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl ComponentRuntime {
    pub fn new(base_url: Url, cache: Rc<dyn ResourceCache>, fetcher: Arc<dyn ResourceFetcher>) -> Rc<Self> {
        Rc::new(Self {
            base_url,
            cache,
            fetcher,
        })
    }

    /// Runtime with a fresh in-memory cache
    pub fn from_config(config: &RuntimeConfig, fetcher: Arc<dyn ResourceFetcher>) -> Result<Rc<Self>, url::ParseError> {
        let base_url = Url::parse(&config.asset_base_url)?;
        Ok(Self::new(base_url, Rc::new(MemoryResourceCache::new()), fetcher))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache(&self) -> &Rc<dyn ResourceCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Resolve a resource path against a module location
    pub fn resolve(&self, tag: &'static str, module: &str, path: &str) -> ComponentResult<Url> {
        self.base_url
            .join(module)
            .and_then(|module_url| module_url.join(path))
            .map_err(|e| ComponentError::InvalidUrl {
                tag,
                path: format!("{}{}", module, path),
                message: e.to_string(),
            })
    }

    async fn load(
        &self,
        tag: &'static str,
        module: &'static str,
        kind: ResourceKind,
        path: Option<&str>,
    ) -> ComponentResult<Rc<str>> {
        let path = path.ok_or(ComponentError::MissingResourcePath { tag, kind })?;
        let url = self.resolve(tag, module, path)?;
        let fetcher = Arc::clone(&self.fetcher);
        let loader = async move { fetcher.fetch_text(&url).await }.boxed_local();

        self.cache
            .get_or_load(&CacheKey::new(module, kind), loader)
            .await
            .map_err(|source| ComponentError::ResourceLoad { tag, kind, source })
    }

    /// Load a type's stylesheet and template concurrently
    pub async fn load_resources(
        &self,
        tag: &'static str,
        module: &'static str,
        styles_path: Option<&str>,
        template_path: Option<&str>,
    ) -> ComponentResult<LoadedResources> {
        let (styles, template) = futures::try_join!(
            self.load(tag, module, ResourceKind::Style, styles_path),
            self.load(tag, module, ResourceKind::Template, template_path),
        )?;
        Ok(LoadedResources { styles, template })
    }
}

// ============================================================================
// Context
// ============================================================================

struct HostState {
    tag: &'static str,
    attributes: RefCell<Attributes>,
    shadow: RefCell<ShadowTree>,
    target: Rc<EventTarget>,
    unlisteners: RefCell<Vec<Unlisten>>,
    ready: ReadySignal,
    setup_complete: Cell<bool>,
    connected: Cell<bool>,
    /// Bumped on every detach so in-flight initialization can tell it is stale
    epoch: Cell<u64>,
}

/// Per-instance services handed to [`Component`] hooks
#[derive(Clone)]
pub struct ComponentContext {
    state: Rc<HostState>,
}

/// Non-owning [`ComponentContext`] for callbacks stored by the component
#[derive(Clone)]
pub struct WeakContext {
    state: Weak<HostState>,
}

impl WeakContext {
    pub fn upgrade(&self) -> Option<ComponentContext> {
        self.state.upgrade().map(|state| ComponentContext { state })
    }
}

impl ComponentContext {
    fn new(tag: &'static str) -> Self {
        Self {
            state: Rc::new(HostState {
                tag,
                attributes: RefCell::new(Attributes::new()),
                shadow: RefCell::new(ShadowTree::new()),
                target: EventTarget::new(tag),
                unlisteners: RefCell::new(Vec::new()),
                ready: ReadySignal::new(),
                setup_complete: Cell::new(false),
                connected: Cell::new(false),
                epoch: Cell::new(0),
            }),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.state.tag
    }

    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            state: Rc::downgrade(&self.state),
        }
    }

    // ------------------------------------------------------------------------
    // Shadow tree
    // ------------------------------------------------------------------------

    /// First element in the shadow tree matching `selector`.
    ///
    /// An invalid selector is logged and matches nothing.
    pub fn query(&self, selector: &str) -> Option<NodeId> {
        match self.state.shadow.borrow().query(selector) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(tag = self.state.tag, selector, error = %e, "invalid selector");
                None
            }
        }
    }

    /// Every element in the shadow tree matching `selector`
    pub fn query_all(&self, selector: &str) -> Vec<NodeId> {
        match self.state.shadow.borrow().query_all(selector) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(tag = self.state.tag, selector, error = %e, "invalid selector");
                Vec::new()
            }
        }
    }

    /// Borrow the shadow tree; do not hold across other context calls
    pub fn shadow(&self) -> Ref<'_, ShadowTree> {
        self.state.shadow.borrow()
    }

    /// Mutably borrow the shadow tree; do not hold across other context calls
    pub fn shadow_mut(&self) -> RefMut<'_, ShadowTree> {
        self.state.shadow.borrow_mut()
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.state.attributes.borrow().get(name).map(str::to_string)
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.state.attributes.borrow().get_string(name, default)
    }

    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.state.attributes.borrow().get_int(name, default)
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.state.attributes.borrow().get_bool(name)
    }

    // ------------------------------------------------------------------------
    // Events and cleanup
    // ------------------------------------------------------------------------

    /// Dispatch a bubbling, composed event from the host
    pub fn emit(&self, name: &str, detail: Value) -> usize {
        self.state.target.dispatch(ComponentEvent::new(name, detail))
    }

    pub fn event_target(&self) -> &Rc<EventTarget> {
        &self.state.target
    }

    /// Register a cleanup to run on the next detach
    pub fn add_unlisten(&self, unlisten: Unlisten) {
        self.state.unlisteners.borrow_mut().push(unlisten);
    }

    /// Subscribe to a backend topic for as long as the instance is attached
    pub fn listen<F>(&self, bus: &dyn EventBus, topic: &str, handler: F)
    where
        F: Fn(&Value) + 'static,
    {
        let unlisten = bus.subscribe(topic, Rc::new(handler));
        self.add_unlisten(unlisten);
    }

    /// Debounced callback that is cancelled on detach
    pub fn debounced<T, F>(&self, delay: Duration, func: F) -> Debounced<T>
    where
        T: 'static,
        F: Fn(T) + 'static,
    {
        let debounced = Debounced::new(delay, func);
        let pending = debounced.clone();
        self.add_unlisten(Unlisten::new(move || pending.cancel()));
        debounced
    }

    /// Cleanups registered since the last detach
    pub fn registered_cleanups(&self) -> usize {
        self.state.unlisteners.borrow().len()
    }

    fn release_cleanups(&self) -> usize {
        let unlisteners = std::mem::take(&mut *self.state.unlisteners.borrow_mut());
        let released = unlisteners.len();
        for unlisten in unlisteners {
            if let Err(e) = unlisten.call() {
                tracing::warn!(tag = self.state.tag, error = %e, "cleanup callback failed");
            }
        }
        released
    }

    // ------------------------------------------------------------------------
    // Lifecycle state
    // ------------------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.state.connected.get()
    }

    /// Whether setup finished for the current attachment
    pub fn has_completed_setup(&self) -> bool {
        self.state.setup_complete.get()
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.is_ready()
    }

    pub fn ready(&self) -> ReadySignal {
        self.state.ready.clone()
    }
}

// ============================================================================
// Host
// ============================================================================

/// One live component instance
pub struct ComponentHost<C: Component> {
    component: Rc<RefCell<C>>,
    ctx: ComponentContext,
    runtime: Rc<ComponentRuntime>,
}

impl<C: Component> Clone for ComponentHost<C> {
    fn clone(&self) -> Self {
        Self {
            component: Rc::clone(&self.component),
            ctx: self.ctx.clone(),
            runtime: Rc::clone(&self.runtime),
        }
    }
}

impl<C: Component> ComponentHost<C> {
    pub fn new(runtime: Rc<ComponentRuntime>, component: C) -> Self {
        Self {
            component: Rc::new(RefCell::new(component)),
            ctx: ComponentContext::new(C::TAG),
            runtime,
        }
    }

    /// Set an attribute before the instance is attached
    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn context(&self) -> &ComponentContext {
        &self.ctx
    }

    pub fn ready(&self) -> ReadySignal {
        self.ctx.ready()
    }

    /// Wait until the first setup has completed
    pub async fn when_ready(&self) {
        self.ctx.state.ready.wait().await
    }

    pub fn is_ready(&self) -> bool {
        self.ctx.is_ready()
    }

    /// Borrow the component.
    ///
    /// Returns `None` while `setup` of this instance is suspended, since
    /// setup holds the component mutably across its awaits.
    pub fn with_component<R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        match self.component.try_borrow() {
            Ok(component) => Some(f(&component)),
            Err(_) => {
                tracing::warn!(tag = C::TAG, "component borrowed while setup is running");
                None
            }
        }
    }

    /// Mutably borrow the component together with its context.
    ///
    /// Returns `None` while `setup` of this instance is suspended.
    pub fn with_component_mut<R>(&self, f: impl FnOnce(&mut C, &ComponentContext) -> R) -> Option<R> {
        match self.component.try_borrow_mut() {
            Ok(mut component) => Some(f(&mut component, &self.ctx)),
            Err(_) => {
                tracing::warn!(tag = C::TAG, "component borrowed while setup is running");
                None
            }
        }
    }

    /// Place the host inside `parent` so its events bubble there
    pub fn attach_within(&self, parent: &Rc<EventTarget>) {
        self.ctx.state.target.set_parent(parent);
    }

    /// Attach the instance: load resources, inject them, run setup and
    /// resolve readiness.
    ///
    /// Connecting an attached instance does nothing. A failed attach leaves
    /// the instance detached and not ready; connecting again retries.
    pub async fn connect(&self) -> ComponentResult<()> {
        let state = &self.ctx.state;
        if state.connected.replace(true) {
            return Ok(());
        }
        state.setup_complete.set(false);
        let epoch = state.epoch.get();

        // a re-attach can race a setup that is still suspended from the previous attach
        let Ok(component) = self.component.try_borrow() else {
            tracing::debug!(tag = C::TAG, "previous setup still running");
            state.connected.set(false);
            return Err(ComponentError::SetupInFlight { tag: C::TAG });
        };
        let styles_path = component.styles_path().map(str::to_string);
        let template_path = component.template_path().map(str::to_string);
        drop(component);

        let resources = self
            .runtime
            .load_resources(C::TAG, C::MODULE, styles_path.as_deref(), template_path.as_deref())
            .await;

        if state.epoch.get() != epoch {
            tracing::debug!(tag = C::TAG, "detached while loading resources");
            return Err(ComponentError::Detached { tag: C::TAG });
        }

        let resources = match resources {
            Ok(resources) => resources,
            Err(err) => {
                tracing::error!(tag = C::TAG, error = %err, "component initialization failed");
                state.connected.set(false);
                return Err(err);
            }
        };

        {
            let mut shadow = state.shadow.borrow_mut();
            shadow.clear();
            shadow.append_style(&resources.styles);
            shadow.append_markup(NodeId::ROOT, &resources.template);
        }

        let setup = {
            let Ok(mut component) = self.component.try_borrow_mut() else {
                tracing::debug!(tag = C::TAG, "previous setup still running");
                state.connected.set(false);
                return Err(ComponentError::SetupInFlight { tag: C::TAG });
            };
            component.setup(&self.ctx).await
        };

        if state.epoch.get() != epoch {
            // disconnect could not run cleanup while setup held the component
            tracing::debug!(tag = C::TAG, "detached during setup, running deferred cleanup");
            self.ctx.release_cleanups();
            if let Ok(mut component) = self.component.try_borrow_mut() {
                component.cleanup(&self.ctx);
            }
            return Err(ComponentError::Detached { tag: C::TAG });
        }

        if let Err(err) = setup {
            tracing::error!(tag = C::TAG, error = %err, "component setup failed");
            self.ctx.release_cleanups();
            state.connected.set(false);
            return Err(err);
        }

        state.setup_complete.set(true);
        if state.ready.resolve() {
            tracing::debug!(tag = C::TAG, "component ready");
        }
        Ok(())
    }

    /// Detach the instance, releasing every registered cleanup.
    ///
    /// Detaching an instance that is not attached does nothing.
    pub fn disconnect(&self) {
        let state = &self.ctx.state;
        if !state.connected.replace(false) {
            return;
        }
        state.epoch.set(state.epoch.get() + 1);
        state.setup_complete.set(false);

        let released = self.ctx.release_cleanups();
        match self.component.try_borrow_mut() {
            Ok(mut component) => component.cleanup(&self.ctx),
            Err(_) => tracing::trace!(tag = C::TAG, "setup in flight, cleanup deferred"),
        }
        tracing::debug!(tag = C::TAG, released, "component detached");
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.update_attribute(name, Some(value));
    }

    pub fn remove_attribute(&self, name: &str) {
        self.update_attribute(name, None);
    }

    fn update_attribute(&self, name: &str, value: Option<&str>) {
        let change = self.ctx.state.attributes.borrow_mut().set(name, value);
        if let Some(change) = change {
            self.attribute_changed(change);
        }
    }

    fn attribute_changed(&self, change: AttributeChange) {
        if !C::OBSERVED_ATTRIBUTES.contains(&change.name.as_str()) {
            return;
        }
        if !self.ctx.has_completed_setup() {
            // setup reads the current value
            tracing::trace!(tag = C::TAG, attribute = %change.name, "attribute change before setup");
            return;
        }

        match self.component.try_borrow_mut() {
            Ok(mut component) => component.on_attribute_changed(
                &self.ctx,
                &change.name,
                change.old_value.as_deref(),
                change.new_value.as_deref(),
            ),
            Err(_) => tracing::warn!(tag = C::TAG, attribute = %change.name, "attribute change dropped, component busy"),
        }
    }

    /// Shorthand for [`ComponentContext::query`]
    pub fn query(&self, selector: &str) -> Option<NodeId> {
        self.ctx.query(selector)
    }

    /// Text content of the first element matching `selector`
    pub fn text_of(&self, selector: &str) -> Option<String> {
        let node = self.ctx.query(selector)?;
        Some(self.ctx.shadow().text_content(node))
    }
}
