//! Component runtime.
//!
//! Lifecycle hosting for dashboard components: shared resource cache,
//! shadow trees, attributes, events, readiness and teardown.

pub mod attributes;
pub mod cache;
pub mod campaign;
pub mod component;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod events;
pub mod markup;
pub mod ready;
pub mod selector;

pub use attributes::{AttributeChange, Attributes};
pub use cache::{CacheKey, CacheStats, MemoryResourceCache, ResourceCache, ResourceKind, ResourceLoad};
pub use campaign::{CampaignLoader, CampaignScope, CampaignSummary, CAMPAIGN_CHANGED_EVENT};
pub use component::{Component, ComponentContext, ComponentHost, ComponentRuntime, LoadedResources, WeakContext};
pub use debounce::{Debounced, DEFAULT_DEBOUNCE};
pub use dom::{ElementData, NodeData, NodeId, ShadowTree};
pub use error::{ComponentError, ComponentResult};
pub use events::{ComponentEvent, EventTarget, ListenerId};
pub use markup::{escape_html, parse_fragment, MarkupNode};
pub use ready::ReadySignal;
pub use selector::{Selector, SelectorError};
