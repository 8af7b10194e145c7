//! Capability interface over the host document
//!
//! The page is owned by the browser, not by us. Everything the detector,
//! neutralizer and overlay code needs from it goes through [`PageDom`], so the
//! logic runs unchanged against a real `web-sys` document or the in-memory
//! `testing::FakeDom`.
//!
//! All methods take `&self`: the host document is mutated through shared
//! handles, the same way the browser exposes it.

use crate::error::Result;
use std::fmt::Debug;

/// Measured box of an element in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Properties probed for a text signal that are not plain attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextProperty {
    Value,
    AriaLabel,
    Title,
    Name,
}

impl TextProperty {
    /// JavaScript property name
    pub fn js_name(self) -> &'static str {
        match self {
            TextProperty::Value => "value",
            TextProperty::AriaLabel => "ariaLabel",
            TextProperty::Title => "title",
            TextProperty::Name => "name",
        }
    }

    /// Attribute reflecting this property
    pub fn attribute_name(self) -> &'static str {
        match self {
            TextProperty::Value => "value",
            TextProperty::AriaLabel => "aria-label",
            TextProperty::Title => "title",
            TextProperty::Name => "name",
        }
    }
}

/// Narrow view of the host document
pub trait PageDom {
    /// Handle to a node in the host tree
    type Node: Clone + PartialEq + Debug;

    // ---- queries ----

    /// Every element matching the candidate allow-list or carrying a click
    /// handler, in document order
    fn query_candidates(&self) -> Vec<Self::Node>;

    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    fn is_element(&self, node: &Self::Node) -> bool;

    /// Lowercase tag name, empty for non-elements
    fn tag_name(&self, node: &Self::Node) -> String;

    fn has_click_handler(&self, node: &Self::Node) -> bool;

    fn inline_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    fn computed_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn text_property(&self, node: &Self::Node, property: TextProperty) -> Option<String>;

    /// Rendered text of the element and its descendants
    fn inner_text(&self, node: &Self::Node) -> Option<String>;

    fn is_disabled(&self, node: &Self::Node) -> bool;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    fn is_connected(&self, node: &Self::Node) -> bool;

    // ---- tree navigation ----

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Element children only
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Immediately following sibling node, which may be a text node
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    // ---- geometry ----

    fn bounding_rect(&self, node: &Self::Node) -> Rect;

    // ---- mutation ----

    fn set_style(&self, node: &Self::Node, property: &str, value: &str) -> Result<()>;

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<()>;

    fn remove_attribute(&self, node: &Self::Node, name: &str) -> Result<()>;

    fn set_disabled(&self, node: &Self::Node) -> Result<()>;

    fn create_element(&self, tag: &str) -> Result<Self::Node>;

    fn add_class(&self, node: &Self::Node, class: &str) -> Result<()>;

    fn set_text(&self, node: &Self::Node, text: &str) -> Result<()>;

    fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<()>;

    /// Insert `node` directly after `reference` under the same parent
    fn insert_after(&self, reference: &Self::Node, node: &Self::Node) -> Result<()>;

    fn remove_node(&self, node: &Self::Node) -> Result<()>;

    /// Attach a click handler that stops propagation
    fn absorb_clicks(&self, node: &Self::Node) -> Result<()>;

    // ---- clock ----

    /// Monotonic milliseconds, used for scan timing
    fn now_ms(&self) -> f64;
}

/// Kind of a document mutation record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

impl MutationKind {
    /// Parse the `type` field of a host mutation record
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "childList" => Some(MutationKind::ChildList),
            "attributes" => Some(MutationKind::Attributes),
            "characterData" => Some(MutationKind::CharacterData),
            _ => None,
        }
    }
}

/// A single document mutation as delivered by the host observer
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<N> {
    pub kind: MutationKind,
    pub target: Option<N>,
    pub added_nodes: Vec<N>,
}
