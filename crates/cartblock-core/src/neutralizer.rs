//! Make a matched control inert without removing it from the page

use crate::dom::PageDom;
use crate::error::Result;

pub const BLOCKED_CURSOR: &str = "not-allowed";

/// Neutralize `node` and every element below it.
///
/// Writes are skipped when the element is already in the target state, so
/// repeated scans leave the page untouched. Returns the number of elements
/// visited.
pub fn neutralize<D: PageDom>(dom: &D, node: &D::Node) -> Result<usize> {
    if dom.inline_style(node, "cursor").as_deref() != Some(BLOCKED_CURSOR) {
        dom.set_style(node, "cursor", BLOCKED_CURSOR)?;
    }
    if dom.attribute(node, "onclick").is_some() {
        dom.remove_attribute(node, "onclick")?;
    }
    if !dom.is_disabled(node) {
        dom.set_disabled(node)?;
    }
    // Without a type an input falls back to text, losing submit behavior
    if dom.tag_name(node).eq_ignore_ascii_case("input") && dom.attribute(node, "type").is_some() {
        dom.remove_attribute(node, "type")?;
    }

    let mut visited = 1;
    for child in dom.children(node) {
        visited += neutralize(dom, &child)?;
    }
    Ok(visited)
}
