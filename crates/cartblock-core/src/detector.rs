//! Purchase-action control detection

use crate::dom::PageDom;
use crate::extractors::SignalSource;
use crate::pattern::is_purchase_action;
use serde::Serialize;

/// Tags considered interactive without an explicit click handler
pub const CANDIDATE_TAGS: &[&str] = &["button", "input", "a"];

/// Selector equivalent of the candidate allow-list
pub const CANDIDATE_SELECTOR: &str = "button, input, a, [onclick]";

/// A positive detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Extractor that produced the matching signal
    pub source: SignalSource,
    /// The matching signal text
    pub signal: String,
}

/// Decides whether a node is a purchase-action control
#[derive(Debug, Clone)]
pub struct Detector {
    marker_class: String,
}

impl Detector {
    /// `marker_class` identifies overlay nodes, which are never candidates
    pub fn new(marker_class: impl Into<String>) -> Self {
        Self {
            marker_class: marker_class.into(),
        }
    }

    pub fn marker_class(&self) -> &str {
        &self.marker_class
    }

    /// Run every extractor in order and report the first signal that matches
    pub fn detect<D: PageDom>(&self, dom: &D, node: &D::Node) -> Option<Detection> {
        if !self.is_candidate(dom, node) {
            return None;
        }

        SignalSource::ALL.iter().find_map(|&source| {
            let signal = source.extract(dom, node)?;
            if is_purchase_action(&signal) {
                Some(Detection { source, signal })
            } else {
                None
            }
        })
    }

    /// Structural checks: element, visible, not ours, interactive
    pub fn is_candidate<D: PageDom>(&self, dom: &D, node: &D::Node) -> bool {
        if !dom.is_element(node) {
            return false;
        }
        if is_hidden(dom, node) {
            return false;
        }
        if dom.has_class(node, &self.marker_class) {
            return false;
        }
        is_interactive(dom, node)
    }
}

/// Tag in the allow-list, or a click handler attached
pub fn is_interactive<D: PageDom>(dom: &D, node: &D::Node) -> bool {
    let tag = dom.tag_name(node);
    CANDIDATE_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) || dom.has_click_handler(node)
}

/// `display: none` or `visibility: hidden` on the element itself
pub fn is_hidden<D: PageDom>(dom: &D, node: &D::Node) -> bool {
    style_equals(dom, node, "display", "none") || style_equals(dom, node, "visibility", "hidden")
}

fn style_equals<D: PageDom>(dom: &D, node: &D::Node, property: &str, expected: &str) -> bool {
    let matches = |value: Option<String>| {
        value
            .map(|v| v.trim().eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    };
    matches(dom.inline_style(node, property)) || matches(dom.computed_style(node, property))
}
