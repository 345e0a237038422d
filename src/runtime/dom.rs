//! Shadow tree
//!
//! Each component instance owns an encapsulated arena tree. Queries run
//! against the tree only, so they never see nodes of the surrounding page or
//! of other instances.

use indexmap::IndexMap;

use super::markup::{escape_html, parse_fragment, MarkupNode};
use super::selector::{Selector, SelectorError};

/// Node handle within a [`ShadowTree`].
///
/// Handles are generational: once a node is removed (replaced by
/// `set_inner_markup`, `set_text` or `clear`) its handle resolves to nothing,
/// even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    /// The shadow root
    pub const ROOT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };

    pub fn index(self) -> usize {
        self.index
    }
}

/// Element tag and attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: IndexMap::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attrs.get("id").map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .get("class")
            .map(|c| c.split_ascii_whitespace())
            .into_iter()
            .flatten()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Root,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Encapsulated node tree of one component instance.
///
/// Removed subtrees return their slots to a free list, so repeated
/// re-rendering keeps the arena at the size of the largest live tree.
#[derive(Debug, Clone)]
pub struct ShadowTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl Default for ShadowTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowTree {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node {
                    parent: None,
                    children: Vec::new(),
                    data: NodeData::Root,
                }),
            }],
            free: Vec::new(),
        }
    }

    /// Drop every node under the root; their handles stop resolving
    pub fn clear(&mut self) {
        self.detach_children(NodeId::ROOT);
    }

    pub fn is_empty(&self) -> bool {
        self.children(NodeId::ROOT).is_empty()
    }

    /// Nodes currently in the tree, root included
    pub fn live_nodes(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Slots allocated by the arena, live or free
    pub fn arena_size(&self) -> usize {
        self.slots.len()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Free `id` and everything below it
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                stack.extend(node.children);
            }
        }
    }

    /// Append a node under `parent`. A stale `parent` gets nothing appended
    /// and the returned handle resolves to nothing.
    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.alloc(Node {
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        match self.node_mut(parent) {
            Some(parent_node) => parent_node.children.push(id),
            None => {
                tracing::trace!(parent = parent.index, "append to removed node ignored");
                self.release(id);
            }
        }
        id
    }

    pub fn append_element(&mut self, parent: NodeId, element: ElementData) -> NodeId {
        self.push(parent, NodeData::Element(element))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::Text(text.to_string()))
    }

    /// Append a `<style>` element holding `css` to the root
    pub fn append_style(&mut self, css: &str) -> NodeId {
        let style = self.append_element(NodeId::ROOT, ElementData::new("style"));
        self.append_text(style, css);
        style
    }

    /// Parse `markup` and append the result under `parent`
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) -> Vec<NodeId> {
        let fragment = parse_fragment(markup);
        self.append_fragment(parent, &fragment)
    }

    pub fn append_fragment(&mut self, parent: NodeId, fragment: &[MarkupNode]) -> Vec<NodeId> {
        fragment.iter().map(|node| self.append_node(parent, node)).collect()
    }

    fn append_node(&mut self, parent: NodeId, node: &MarkupNode) -> NodeId {
        match node {
            MarkupNode::Element { tag, attrs, children } => {
                let mut element = ElementData::new(tag);
                element.attrs.extend(attrs.iter().cloned());
                let id = self.append_element(parent, element);
                for child in children {
                    self.append_node(id, child);
                }
                id
            }
            MarkupNode::Text(text) => self.append_text(parent, text),
            MarkupNode::Comment(text) => self.push(parent, NodeData::Comment(text.clone())),
        }
    }

    /// Replace the children of `node` with parsed `markup`
    pub fn set_inner_markup(&mut self, node: NodeId, markup: &str) -> Vec<NodeId> {
        self.detach_children(node);
        self.append_markup(node, markup)
    }

    /// Replace the children of `node` with a single text node
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.detach_children(node);
        if !text.is_empty() {
            self.append_text(node, text);
        }
    }

    fn detach_children(&mut self, node: NodeId) {
        let children = match self.node_mut(node) {
            Some(n) => std::mem::take(&mut n.children),
            None => return,
        };
        for child in children {
            self.release(child);
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Node payload; `None` once the node was removed
    pub fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.node(node).map(|n| &n.data)
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.node(node)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(node)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    /// Nearest ancestor that is an element; stops at the shadow root
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|p| self.element(*p).is_some())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    /// Descendants of `node` in document order
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of `node` and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let mut text = String::new();
        if let Some(NodeData::Text(t)) = self.data(node) {
            text.push_str(t);
        }
        for descendant in self.descendants(node) {
            if let Some(NodeData::Text(t)) = self.data(descendant) {
                text.push_str(t);
            }
        }
        text
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attrs.shift_remove(name);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).map_or(false, |e| e.has_class(class))
    }

    /// Add or remove `class`; returns whether it is present afterwards
    pub fn toggle_class(&mut self, node: NodeId, class: &str, present: bool) -> bool {
        let Some(element) = self.element_mut(node) else {
            return false;
        };
        let mut classes: Vec<String> = element.classes().map(str::to_string).collect();
        let has = classes.iter().any(|c| c == class);
        if present && !has {
            classes.push(class.to_string());
        } else if !present && has {
            classes.retain(|c| c != class);
        } else {
            return present;
        }

        if classes.is_empty() {
            element.attrs.shift_remove("class");
        } else {
            element.attrs.insert("class".to_string(), classes.join(" "));
        }
        present
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// First element matching `selector`, in document order
    pub fn query(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query_selector(NodeId::ROOT, &selector))
    }

    /// Every element matching `selector`, in document order
    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query_selector_all(NodeId::ROOT, &selector))
    }

    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|node| selector.matches(self, *node))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize the children of `node`
    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_markup(*child, &mut out);
        }
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.data(node) else {
            return;
        };
        match data {
            NodeData::Root => out.push_str(&self.inner_markup(node)),
            NodeData::Text(text) => {
                let raw = self
                    .parent_element(node)
                    .and_then(|p| self.tag(p))
                    .map_or(false, |tag| tag == "style" || tag == "script");
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_html(text));
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(value));
                    out.push('"');
                }
                out.push('>');
                if is_void(&element.tag) {
                    return;
                }
                out.push_str(&self.inner_markup(node));
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}
