//! Overlay placement over neutralized controls
//!
//! Placement happens in two phases. [`place_overlay`] inserts (or finds) the
//! overlay and gives it a provisional size; its position is wrong until the
//! host has laid the page out. Once the host reports that layout has settled,
//! [`commit_placement`] measures both boxes and pins the overlay exactly over
//! its target.

use crate::dom::{PageDom, Rect};
use crate::error::{GuardError, Result};
use crate::neutralizer::BLOCKED_CURSOR;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TRANSLATE_AXIS: Regex =
        Regex::new(r"translate([XY])\(\s*(-?[0-9.eE+-]+)px\s*\)").unwrap();
    static ref TRANSLATE_2D: Regex =
        Regex::new(r"translate\(\s*(-?[0-9.eE+-]+)px\s*(?:,\s*(-?[0-9.eE+-]+)px\s*)?\)").unwrap();
    static ref MATRIX: Regex = Regex::new(r"matrix\(([^)]*)\)").unwrap();
}

/// Visual settings for new overlays
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub marker_class: String,
    pub background: String,
    pub indicator_text: String,
    pub indicator_tooltip: String,
}

impl OverlayStyle {
    pub fn indicator_class(&self) -> String {
        format!("{}-indicator", self.marker_class)
    }
}

impl From<&crate::config::GuardConfig> for OverlayStyle {
    fn from(config: &crate::config::GuardConfig) -> Self {
        Self {
            marker_class: config.marker_class.clone(),
            background: config.overlay_background.clone(),
            indicator_text: config.indicator_text.clone(),
            indicator_tooltip: config.indicator_tooltip.clone(),
        }
    }
}

/// An overlay inserted next to its target, awaiting the layout-settled commit
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionalPlacement<N> {
    pub target: N,
    pub overlay: N,
}

/// Outcome of the provisional phase
#[derive(Debug, Clone, PartialEq)]
pub enum Placement<N> {
    /// Target not rendered or detached; nothing placed
    Skipped,
    Created(ProvisionalPlacement<N>),
    Reused(ProvisionalPlacement<N>),
}

impl<N> Placement<N> {
    pub fn provisional(self) -> Option<ProvisionalPlacement<N>> {
        match self {
            Placement::Skipped => None,
            Placement::Created(p) | Placement::Reused(p) => Some(p),
        }
    }
}

/// Phase one: find or create the overlay sitting after `target`
pub fn place_overlay<D: PageDom>(
    dom: &D,
    target: &D::Node,
    style: &OverlayStyle,
) -> Result<Placement<D::Node>> {
    let parent = match dom.parent(target) {
        Some(parent) => parent,
        None => return Ok(Placement::Skipped),
    };
    if has_hidden_ancestor(dom, target) {
        return Ok(Placement::Skipped);
    }

    let existing = dom
        .next_sibling(target)
        .filter(|sibling| dom.has_class(sibling, &style.marker_class));

    let overlay = match &existing {
        Some(overlay) => overlay.clone(),
        None => create_overlay(dom, target, style)?,
    };

    for property in ["overflow-x", "overflow-y"] {
        if dom.inline_style(&parent, property).as_deref() != Some("visible") {
            dom.set_style(&parent, property, "visible")?;
        }
    }

    let placement = ProvisionalPlacement {
        target: target.clone(),
        overlay: overlay.clone(),
    };
    if existing.is_some() {
        return Ok(Placement::Reused(placement));
    }

    dom.insert_after(target, &overlay)?;
    mount_indicator(dom, &overlay, style)?;
    Ok(Placement::Created(placement))
}

/// Phase two: move and size the overlay to cover its target exactly.
///
/// Any translation already applied to the overlay is folded into the
/// correction, so committing twice is stable.
pub fn commit_placement<D: PageDom>(dom: &D, placement: &ProvisionalPlacement<D::Node>) -> Result<()> {
    if !dom.is_connected(&placement.target) || !dom.is_connected(&placement.overlay) {
        return Err(GuardError::Dom(
            "overlay or target left the document before layout settled".to_string(),
        ));
    }

    let current = dom.bounding_rect(&placement.overlay);
    let target = dom.bounding_rect(&placement.target);
    let (tx, ty) = dom
        .inline_style(&placement.overlay, "transform")
        .map(|t| parse_translation(&t))
        .unwrap_or((0.0, 0.0));

    let dx = target.x - current.x + tx;
    let dy = target.y - current.y + ty;
    dom.set_style(
        &placement.overlay,
        "transform",
        &format!("translateX({}) translateY({})", px(dx), px(dy)),
    )?;

    let width = px(target.width);
    let height = px(target.height);
    for property in ["min-width", "width", "max-width"] {
        dom.set_style(&placement.overlay, property, &width)?;
    }
    for property in ["min-height", "height", "max-height"] {
        dom.set_style(&placement.overlay, property, &height)?;
    }
    Ok(())
}

fn create_overlay<D: PageDom>(dom: &D, target: &D::Node, style: &OverlayStyle) -> Result<D::Node> {
    let Rect { width, height, .. } = dom.bounding_rect(target);

    let overlay = dom.create_element("div")?;
    dom.add_class(&overlay, &style.marker_class)?;
    for (property, value) in [
        ("display", "flex".to_string()),
        ("justify-content", "flex-end".to_string()),
        ("position", "absolute".to_string()),
        ("width", px(width)),
        ("height", px(height)),
        ("max-width", px(width)),
        ("max-height", px(height)),
        ("background", style.background.clone()),
        ("cursor", BLOCKED_CURSOR.to_string()),
    ] {
        dom.set_style(&overlay, property, &value)?;
    }
    dom.absorb_clicks(&overlay)?;
    Ok(overlay)
}

/// Small badge in the overlay's corner explaining why the control is dead
fn mount_indicator<D: PageDom>(dom: &D, overlay: &D::Node, style: &OverlayStyle) -> Result<()> {
    let badge = dom.create_element("span")?;
    dom.add_class(&badge, &style.indicator_class())?;
    dom.set_attribute(&badge, "title", &style.indicator_tooltip)?;
    dom.set_attribute(&badge, "role", "img")?;
    dom.set_attribute(&badge, "aria-label", &style.indicator_tooltip)?;
    dom.set_text(&badge, &style.indicator_text)?;
    for (property, value) in [
        ("align-self", "flex-start"),
        ("padding", "1px 4px"),
        ("font", "bold 10px sans-serif"),
        ("color", "#fff"),
        ("background", "rgba(0,0,0,0.65)"),
        ("border-radius", "3px"),
        ("pointer-events", "auto"),
    ] {
        dom.set_style(&badge, property, value)?;
    }
    dom.append_child(overlay, &badge)
}

/// True when any ancestor computes to `display: none`
pub fn has_hidden_ancestor<D: PageDom>(dom: &D, node: &D::Node) -> bool {
    let mut current = dom.parent(node);
    while let Some(ancestor) = current {
        if dom.computed_style(&ancestor, "display").as_deref() == Some("none") {
            return true;
        }
        current = dom.parent(&ancestor);
    }
    false
}

/// Read the (x, y) translation back out of a CSS transform.
///
/// Understands `translateX()`/`translateY()` pairs, `translate(x, y)` and
/// `matrix(a, b, c, d, e, f)`. Anything else reads as no translation.
pub fn parse_translation(transform: &str) -> (f64, f64) {
    if let Some(caps) = MATRIX.captures(transform) {
        let values: Vec<f64> = caps[1]
            .split(',')
            .filter_map(|v| v.trim().parse().ok())
            .collect();
        if values.len() == 6 {
            return (values[4], values[5]);
        }
    }

    let mut x = 0.0;
    let mut y = 0.0;
    for caps in TRANSLATE_2D.captures_iter(transform) {
        x += caps[1].parse::<f64>().unwrap_or(0.0);
        y += caps
            .get(2)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0);
    }
    for caps in TRANSLATE_AXIS.captures_iter(transform) {
        let value = caps[2].parse::<f64>().unwrap_or(0.0);
        match &caps[1] {
            "X" => x += value,
            _ => y += value,
        }
    }
    (x, y)
}

fn px(value: f64) -> String {
    format!("{}px", value)
}
