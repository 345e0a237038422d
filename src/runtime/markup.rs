//! Template markup parsing
//!
//! Templates are parsed with html5ever into an `RcDom` and flattened into
//! [`MarkupNode`] fragments ready to be appended to a shadow tree.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// Parsed markup node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
    Comment(String),
}

/// Parse a template into its top-level nodes.
///
/// Content html5ever routes into `<head>` (such as `<style>` or `<link>`)
/// precedes content routed into `<body>`. Whitespace-only text is dropped.
pub fn parse_fragment(markup: &str) -> Vec<MarkupNode> {
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut markup.as_bytes())
    {
        Ok(dom) => dom,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read template markup");
            return Vec::new();
        }
    };

    let mut nodes = Vec::new();
    for child in dom.document.children.borrow().iter() {
        if element_name(child).as_deref() == Some("html") {
            for section in child.children.borrow().iter() {
                // head / body
                for node in section.children.borrow().iter() {
                    if let Some(converted) = convert(node) {
                        nodes.push(converted);
                    }
                }
            }
        } else if let Some(converted) = convert(child) {
            // comments ahead of the first element land on the document
            nodes.push(converted);
        }
    }
    nodes
}

fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        RcNodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

fn convert(handle: &Handle) -> Option<MarkupNode> {
    match &handle.data {
        RcNodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            let children = handle.children.borrow().iter().filter_map(convert).collect();
            Some(MarkupNode::Element {
                tag: name.local.to_string(),
                attrs,
                children,
            })
        }
        RcNodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if text.trim().is_empty() {
                None
            } else {
                Some(MarkupNode::Text(text))
            }
        }
        RcNodeData::Comment { contents } => Some(MarkupNode::Comment(contents.to_string())),
        RcNodeData::Document | RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => None,
    }
}

/// Escape text for safe interpolation into markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
