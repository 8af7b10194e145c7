//! End-to-end scan scenarios against the in-memory document

use cartblock_core::testing::{FakeDom, NodeId};
use cartblock_core::{GuardConfig, PageDom, Rect, ScanService};
use pretty_assertions::assert_eq;

const MARKER: &str = "ss-overlay";

fn running(dom: FakeDom) -> ScanService<FakeDom> {
    let mut service = ScanService::new(dom, GuardConfig::default()).unwrap();
    service.start();
    service
}

fn overlays(service: &ScanService<FakeDom>) -> Vec<NodeId> {
    service.dom().elements_with_class(MARKER)
}

// ============================================================
// Scenarios
// ============================================================

#[test]
fn add_to_cart_button_is_blocked() {
    let dom = FakeDom::new();
    let button = dom.element(dom.body(), "button");
    dom.text(button, "Add to Cart");

    let mut service = running(dom);
    service.tick();
    let dom = service.dom();

    assert!(dom.is_disabled(&button));
    assert_eq!(dom.inline_style(&button, "cursor").as_deref(), Some("not-allowed"));
    let sibling = dom.next_sibling(&button).expect("overlay sibling");
    assert!(dom.has_class(&sibling, MARKER));
}

#[test]
fn unrelated_link_is_untouched() {
    let dom = FakeDom::new();
    let link = dom.element(dom.body(), "a");
    dom.set_attr(link, "href", "#");
    dom.text(link, "Learn more");

    let mut service = running(dom);
    let report = service.tick().unwrap();
    let dom = service.dom();

    assert_eq!(report.matched, 0);
    assert!(!dom.is_disabled(&link));
    assert_eq!(dom.inline_style(&link, "cursor"), None);
    assert_eq!(dom.next_sibling(&link), None);
    assert_eq!(dom.mutation_count(), 0);
}

#[test]
fn buy_now_submit_input_is_blocked() {
    let dom = FakeDom::new();
    let input = dom.element(dom.body(), "input");
    dom.set_attr(input, "type", "submit");
    dom.set_attr(input, "value", "Buy Now");

    let mut service = running(dom);
    service.tick();
    let dom = service.dom();

    assert_eq!(dom.attribute(&input, "type"), None);
    assert!(dom.is_disabled(&input));
    let sibling = dom.next_sibling(&input).expect("overlay sibling");
    assert!(dom.has_class(&sibling, MARKER));
}

#[test]
fn hidden_button_gets_no_overlay() {
    let dom = FakeDom::new();
    let button = dom.element(dom.body(), "button");
    dom.set_inline_style(button, "display", "none");
    dom.text(button, "Buy Now");

    let mut service = running(dom);
    service.tick();

    assert!(overlays(&service).is_empty());
    assert!(!service.dom().is_disabled(&button));
}

// ============================================================
// Properties
// ============================================================

#[test]
fn repeated_scans_keep_one_overlay_per_control() {
    let dom = FakeDom::new();
    let list = dom.element(dom.body(), "ul");
    let mut buttons = Vec::new();
    for label in ["Add to cart", "add-to-bag", "BUY NOW", "Buy it now"] {
        let item = dom.element(list, "li");
        let button = dom.element(item, "button");
        dom.text(button, label);
        buttons.push(button);
    }

    let mut service = running(dom);
    for _ in 0..3 {
        service.tick();
        service.commit_placements();
    }

    assert_eq!(overlays(&service).len(), buttons.len());
    for button in &buttons {
        let sibling = service.dom().next_sibling(button).unwrap();
        assert!(service.dom().has_class(&sibling, MARKER));
    }
}

#[test]
fn hidden_ancestry_and_hidden_visibility_get_no_overlay() {
    let dom = FakeDom::new();
    let collapsed = dom.element(dom.body(), "div");
    dom.set_inline_style(collapsed, "display", "none");
    let inside = dom.element(collapsed, "button");
    dom.text(inside, "Add to cart");

    let invisible = dom.element(dom.body(), "button");
    dom.set_inline_style(invisible, "visibility", "hidden");
    dom.text(invisible, "Add to cart");

    let mut service = running(dom);
    service.tick();
    assert!(overlays(&service).is_empty());
}

#[test]
fn toggling_parent_display_reuses_overlay() {
    let dom = FakeDom::new();
    let panel = dom.element(dom.body(), "div");
    let button = dom.element(panel, "button");
    dom.text(button, "Buy now");

    let mut service = running(dom);
    service.tick();
    let original = overlays(&service);
    assert_eq!(original.len(), 1);

    service.dom().set_inline_style(panel, "display", "none");
    let hidden = service.tick().unwrap();
    assert_eq!(hidden.overlays_skipped, 1);

    service.dom().clear_inline_style(panel, "display");
    let shown = service.tick().unwrap();
    assert_eq!(shown.overlays_reused, 1);
    assert_eq!(shown.overlays_created, 0);
    assert_eq!(overlays(&service), original);
}

#[test]
fn nested_controls_are_neutralized_with_their_wrapper() {
    let dom = FakeDom::new();
    let wrapper = dom.element(dom.body(), "a");
    dom.set_attr(wrapper, "aria-label", "Add to bag");
    let icon = dom.element(wrapper, "span");
    dom.set_attr(icon, "onclick", "track()");

    let mut service = running(dom);
    service.tick();
    let dom = service.dom();

    assert!(dom.is_disabled(&icon));
    assert_eq!(dom.attribute(&icon, "onclick"), None);
    assert_eq!(dom.inline_style(&icon, "cursor").as_deref(), Some("not-allowed"));
}

#[test]
fn committed_overlay_covers_control() {
    let dom = FakeDom::new();
    let button = dom.element(dom.body(), "button");
    dom.text(button, "Add to cart");
    let target = Rect::new(300.0, 120.0, 140.0, 44.0);
    dom.set_rect(button, target);

    let mut service = running(dom);
    service.tick();
    assert_eq!(service.commit_placements(), 1);

    let overlay = service.dom().next_sibling(&button).unwrap();
    assert_eq!(service.dom().bounding_rect(&overlay), target);
}

#[test]
fn labelled_by_reference_is_detected() {
    let dom = FakeDom::new();
    let label = dom.element(dom.body(), "span");
    dom.set_attr(label, "id", "cta-label");
    dom.text(label, "Buy now");
    let button = dom.element(dom.body(), "button");
    dom.set_attr(button, "aria-labelledby", "cta-label");

    let mut service = running(dom);
    let report = service.tick().unwrap();
    assert_eq!(report.matched, 1);
    assert!(service.dom().is_disabled(&button));
}
