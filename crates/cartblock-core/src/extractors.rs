//! Text signal extraction
//!
//! A control can advertise its purpose through many channels: its rendered
//! text, a form value, ARIA labelling, tooltips, or custom attributes. Each
//! channel is one extractor function; [`SignalSource::ALL`] fixes the order in
//! which the detector consults them. Absent properties yield `None`.

use crate::dom::{PageDom, TextProperty};

/// Where a text signal was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    RenderedText,
    Value,
    AriaLabel,
    DataLabel,
    Title,
    Name,
    LabelledBy,
}

impl SignalSource {
    /// Extraction order used by the detector
    pub const ALL: [SignalSource; 7] = [
        SignalSource::RenderedText,
        SignalSource::Value,
        SignalSource::AriaLabel,
        SignalSource::DataLabel,
        SignalSource::Title,
        SignalSource::Name,
        SignalSource::LabelledBy,
    ];

    /// Run this source's extractor, dropping blank results
    pub fn extract<D: PageDom>(self, dom: &D, node: &D::Node) -> Option<String> {
        let raw = match self {
            SignalSource::RenderedText => rendered_text(dom, node),
            SignalSource::Value => value(dom, node),
            SignalSource::AriaLabel => aria_label(dom, node),
            SignalSource::DataLabel => data_label(dom, node),
            SignalSource::Title => title(dom, node),
            SignalSource::Name => name(dom, node),
            SignalSource::LabelledBy => labelled_by_text(dom, node),
        }?;
        non_blank(raw)
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn rendered_text<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    dom.inner_text(node)
}

pub fn value<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    dom.text_property(node, TextProperty::Value)
}

/// Accessible label, from the `ariaLabel` property or the `aria-label` attribute
pub fn aria_label<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    dom.text_property(node, TextProperty::AriaLabel)
        .or_else(|| dom.attribute(node, TextProperty::AriaLabel.attribute_name()))
}

pub fn data_label<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    dom.attribute(node, "data-label")
}

pub fn title<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    dom.text_property(node, TextProperty::Title)
}

pub fn name<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    dom.text_property(node, TextProperty::Name)
}

/// Text of every element referenced by `aria-labelledby`, space joined.
/// Unknown ids are skipped.
pub fn labelled_by_text<D: PageDom>(dom: &D, node: &D::Node) -> Option<String> {
    let ids = dom.attribute(node, "aria-labelledby")?;
    let parts: Vec<String> = ids
        .split_whitespace()
        .filter_map(|id| dom.element_by_id(id))
        .filter_map(|label| dom.inner_text(&label))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
