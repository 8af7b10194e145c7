//! In-memory document for exercising the core without a browser
//!
//! `FakeDom` is a small arena-backed tree with just enough layout to make
//! overlay placement observable: elements carry an explicit box, a node
//! inserted after a sibling is laid out immediately to its right, and inline
//! `width`, `height` and `transform` styles are applied on measurement.

use crate::detector::CANDIDATE_TAGS;
use crate::dom::{PageDom, Rect, TextProperty};
use crate::error::{GuardError, Result};
use crate::overlay::parse_translation;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Handle to a node in a [`FakeDom`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
enum Kind {
    Document,
    Element(String),
    Text(String),
}

#[derive(Debug, Clone)]
struct FakeNode {
    kind: Kind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    classes: Vec<String>,
    disabled: bool,
    click_handler: bool,
    absorbs_clicks: bool,
    rect: Option<Rect>,
    fail_mutations: bool,
}

impl FakeNode {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            classes: Vec::new(),
            disabled: false,
            click_handler: false,
            absorbs_clicks: false,
            rect: None,
            fail_mutations: false,
        }
    }
}

const DOCUMENT: NodeId = NodeId(0);

pub struct FakeDom {
    nodes: RefCell<Vec<FakeNode>>,
    body: NodeId,
    mutations: Cell<usize>,
    clock: Cell<f64>,
    tick_ms: Cell<f64>,
}

impl Default for FakeDom {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDom {
    /// A document containing an empty 1024x768 `<body>`
    pub fn new() -> Self {
        let dom = Self {
            nodes: RefCell::new(vec![FakeNode::new(Kind::Document)]),
            body: DOCUMENT,
            mutations: Cell::new(0),
            clock: Cell::new(0.0),
            tick_ms: Cell::new(0.0),
        };
        let body = dom.element(DOCUMENT, "body");
        dom.set_rect(body, Rect::new(0.0, 0.0, 1024.0, 768.0));
        Self { body, ..dom }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ---- builders (not counted as mutations) ----

    /// Append a new element under `parent`
    pub fn element(&self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.push(FakeNode::new(Kind::Element(tag.to_ascii_lowercase())));
        self.attach(parent, id, None);
        id
    }

    /// Append a text node under `parent`
    pub fn text(&self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(FakeNode::new(Kind::Text(text.to_string())));
        self.attach(parent, id, None);
        id
    }

    pub fn set_attr(&self, id: NodeId, name: &str, value: &str) {
        self.with(id, |n| {
            n.attributes.insert(name.to_string(), value.to_string());
        });
    }

    pub fn set_inline_style(&self, id: NodeId, property: &str, value: &str) {
        self.with(id, |n| {
            n.style.insert(property.to_string(), value.to_string());
        });
    }

    pub fn clear_inline_style(&self, id: NodeId, property: &str) {
        self.with(id, |n| {
            n.style.remove(property);
        });
    }

    pub fn set_class(&self, id: NodeId, class: &str) {
        self.with(id, |n| n.classes.push(class.to_string()));
    }

    pub fn set_rect(&self, id: NodeId, rect: Rect) {
        self.with(id, |n| n.rect = Some(rect));
    }

    /// Attach a script click handler (not visible as an attribute)
    pub fn set_click_handler(&self, id: NodeId) {
        self.with(id, |n| n.click_handler = true);
    }

    /// Make every later mutation of `id` fail
    pub fn fail_mutations_on(&self, id: NodeId) {
        self.with(id, |n| n.fail_mutations = true);
    }

    /// Advance the clock by `ms` on every reading
    pub fn set_tick_ms(&self, ms: f64) {
        self.tick_ms.set(ms);
    }

    // ---- inspection ----

    pub fn absorbs_clicks(&self, id: NodeId) -> bool {
        self.nodes.borrow()[id.0].absorbs_clicks
    }

    /// Number of document mutations performed through [`PageDom`]
    pub fn mutation_count(&self) -> usize {
        self.mutations.get()
    }

    /// Elements carrying `class`, in document order
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(DOCUMENT)
            .into_iter()
            .filter(|id| self.nodes.borrow()[id.0].classes.iter().any(|c| c == class))
            .collect()
    }

    // ---- internals ----

    fn push(&self, node: FakeNode) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        NodeId(nodes.len() - 1)
    }

    fn with<R>(&self, id: NodeId, f: impl FnOnce(&mut FakeNode) -> R) -> R {
        f(&mut self.nodes.borrow_mut()[id.0])
    }

    fn get<R>(&self, id: NodeId, f: impl FnOnce(&FakeNode) -> R) -> R {
        f(&self.nodes.borrow()[id.0])
    }

    fn detach(&self, id: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[id.0].parent.take() {
            nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Insert under `parent` at `index` (append when `None`)
    fn attach(&self, parent: NodeId, id: NodeId, index: Option<usize>) {
        self.detach(id);
        let mut nodes = self.nodes.borrow_mut();
        let children = &mut nodes[parent.0].children;
        match index {
            Some(i) if i <= children.len() => children.insert(i, id),
            _ => children.push(id),
        }
        nodes[id.0].parent = Some(parent);
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = nodes[root.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    fn mutate(&self, id: NodeId, f: impl FnOnce(&mut FakeNode)) -> Result<()> {
        if self.get(id, |n| n.fail_mutations) {
            return Err(GuardError::Dom(format!("injected failure on {:?}", id)));
        }
        self.mutations.set(self.mutations.get() + 1);
        self.with(id, f);
        Ok(())
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let (text, children) = self.get(id, |n| match &n.kind {
            Kind::Text(text) => (Some(text.clone()), Vec::new()),
            _ => (None, n.children.clone()),
        });
        if let Some(text) = text {
            out.push_str(&text);
        }
        for child in children {
            self.collect_text(child, out);
        }
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

impl PageDom for FakeDom {
    type Node = NodeId;

    fn query_candidates(&self) -> Vec<NodeId> {
        self.descendants(DOCUMENT)
            .into_iter()
            .filter(|&id| {
                self.get(id, |n| match &n.kind {
                    Kind::Element(tag) => {
                        CANDIDATE_TAGS.contains(&tag.as_str())
                            || n.attributes.contains_key("onclick")
                            || n.click_handler
                    }
                    _ => false,
                })
            })
            .collect()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(DOCUMENT)
            .into_iter()
            .find(|&n| self.get(n, |node| node.attributes.get("id").map(String::as_str) == Some(id)))
    }

    fn is_element(&self, node: &NodeId) -> bool {
        self.get(*node, |n| matches!(n.kind, Kind::Element(_)))
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.get(*node, |n| match &n.kind {
            Kind::Element(tag) => tag.clone(),
            _ => String::new(),
        })
    }

    fn has_click_handler(&self, node: &NodeId) -> bool {
        self.get(*node, |n| {
            n.click_handler || n.absorbs_clicks || n.attributes.contains_key("onclick")
        })
    }

    fn inline_style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.get(*node, |n| n.style.get(property).cloned())
    }

    fn computed_style(&self, node: &NodeId, property: &str) -> Option<String> {
        if !self.is_element(node) {
            return None;
        }
        if let Some(value) = self.inline_style(node, property) {
            return Some(value);
        }
        match property {
            "display" => Some("block".to_string()),
            "visibility" => Some(
                self.parent(node)
                    .and_then(|p| self.computed_style(&p, "visibility"))
                    .unwrap_or_else(|| "visible".to_string()),
            ),
            _ => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.get(*node, |n| n.attributes.get(name).cloned())
    }

    fn text_property(&self, node: &NodeId, property: TextProperty) -> Option<String> {
        self.attribute(node, property.attribute_name())
    }

    fn inner_text(&self, node: &NodeId) -> Option<String> {
        if !self.is_element(node) {
            return None;
        }
        let mut text = String::new();
        self.collect_text(*node, &mut text);
        Some(text)
    }

    fn is_disabled(&self, node: &NodeId) -> bool {
        self.get(*node, |n| n.disabled)
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.get(*node, |n| n.classes.iter().any(|c| c == class))
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if id == DOCUMENT {
                return true;
            }
            current = self.get(id, |n| n.parent);
        }
        false
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.get(*node, |n| n.parent)
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|c| matches!(nodes[c.0].kind, Kind::Element(_)))
            .collect()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let nodes = self.nodes.borrow();
        let siblings = &nodes[parent.0].children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn bounding_rect(&self, node: &NodeId) -> Rect {
        self.get(*node, |n| {
            let base = n.rect.unwrap_or_default();
            let width = n.style.get("width").and_then(|v| parse_px(v)).unwrap_or(base.width);
            let height = n.style.get("height").and_then(|v| parse_px(v)).unwrap_or(base.height);
            let (tx, ty) = n
                .style
                .get("transform")
                .map(|t| parse_translation(t))
                .unwrap_or((0.0, 0.0));
            Rect::new(base.x + tx, base.y + ty, width, height)
        })
    }

    fn set_style(&self, node: &NodeId, property: &str, value: &str) -> Result<()> {
        self.mutate(*node, |n| {
            n.style.insert(property.to_string(), value.to_string());
        })
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) -> Result<()> {
        self.mutate(*node, |n| {
            n.attributes.insert(name.to_string(), value.to_string());
        })
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) -> Result<()> {
        self.mutate(*node, |n| {
            n.attributes.remove(name);
        })
    }

    fn set_disabled(&self, node: &NodeId) -> Result<()> {
        self.mutate(*node, |n| n.disabled = true)
    }

    fn create_element(&self, tag: &str) -> Result<NodeId> {
        Ok(self.push(FakeNode::new(Kind::Element(tag.to_ascii_lowercase()))))
    }

    fn add_class(&self, node: &NodeId, class: &str) -> Result<()> {
        self.mutate(*node, |n| {
            if !n.classes.iter().any(|c| c == class) {
                n.classes.push(class.to_string());
            }
        })
    }

    fn set_text(&self, node: &NodeId, text: &str) -> Result<()> {
        let old: Vec<NodeId> = self.get(*node, |n| n.children.clone());
        self.mutate(*node, |_| {})?;
        for child in old {
            self.detach(child);
        }
        self.text(*node, text);
        Ok(())
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<()> {
        self.mutate(*parent, |_| {})?;
        self.attach(*parent, *child, None);
        Ok(())
    }

    fn insert_after(&self, reference: &NodeId, node: &NodeId) -> Result<()> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| GuardError::Dom("reference node has no parent".to_string()))?;
        self.mutate(parent, |_| {})?;
        let index = self.get(parent, |p| p.children.iter().position(|c| c == reference));
        self.attach(parent, *node, index.map(|i| i + 1));

        // Lay the new node out to the right of its reference
        let anchor = self.get(*reference, |n| n.rect.unwrap_or_default());
        self.with(*node, |n| {
            if n.rect.is_none() {
                n.rect = Some(Rect::new(
                    anchor.x + anchor.width,
                    anchor.y,
                    anchor.width,
                    anchor.height,
                ));
            }
        });
        Ok(())
    }

    fn remove_node(&self, node: &NodeId) -> Result<()> {
        let parent = self
            .parent(node)
            .ok_or_else(|| GuardError::Dom("node is not attached".to_string()))?;
        self.mutate(parent, |_| {})?;
        self.detach(*node);
        Ok(())
    }

    fn absorb_clicks(&self, node: &NodeId) -> Result<()> {
        self.mutate(*node, |n| n.absorbs_clicks = true)
    }

    fn now_ms(&self) -> f64 {
        let now = self.clock.get();
        self.clock.set(now + self.tick_ms.get());
        now
    }
}
