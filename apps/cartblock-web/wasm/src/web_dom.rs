//! `PageDom` over the live browser document

use cartblock_core::{GuardError, PageDom, Rect, Result, TextProperty, CANDIDATE_SELECTOR};
use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement, Node, Window};

thread_local! {
    /// Click handler shared by every overlay. It is handed to JS for good, so
    /// overlays left on the page keep absorbing clicks after the runtime that
    /// placed them is dropped.
    static CLICK_ABSORBER: JsValue = Closure::wrap(Box::new(|event: Event| {
        event.stop_propagation();
    }) as Box<dyn FnMut(Event)>)
    .into_js_value();
}

pub struct WebDom {
    window: Window,
    document: Document,
}

impl WebDom {
    /// Bind to the current window's document
    ///
    /// # Errors
    /// Returns `HostUnavailable` outside a browsing context
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| GuardError::HostUnavailable("No window object available".to_string()))?;
        let document = window.document().ok_or_else(|| {
            GuardError::HostUnavailable("No document object available".to_string())
        })?;

        Ok(Self { window, document })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

pub(crate) fn js_error(context: &str, err: JsValue) -> GuardError {
    let detail = err
        .as_string()
        .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", err));
    GuardError::Dom(format!("{}: {}", context, detail))
}

fn as_element(node: &Node) -> Option<&Element> {
    node.dyn_ref::<Element>()
}

fn as_html(node: &Node) -> Option<&HtmlElement> {
    node.dyn_ref::<HtmlElement>()
}

fn require_element<'a>(node: &'a Node, operation: &str) -> Result<&'a Element> {
    as_element(node)
        .ok_or_else(|| GuardError::Dom(format!("{} requires an element node", operation)))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl PageDom for WebDom {
    type Node = Node;

    fn query_candidates(&self) -> Vec<Node> {
        match self.document.query_selector_all(CANDIDATE_SELECTOR) {
            Ok(list) => (0..list.length()).filter_map(|i| list.item(i)).collect(),
            Err(e) => {
                tracing::warn!("candidate query failed: {}", js_error("querySelectorAll", e));
                Vec::new()
            }
        }
    }

    fn element_by_id(&self, id: &str) -> Option<Node> {
        self.document.get_element_by_id(id).map(Node::from)
    }

    fn is_element(&self, node: &Node) -> bool {
        node.node_type() == Node::ELEMENT_NODE
    }

    fn tag_name(&self, node: &Node) -> String {
        as_element(node)
            .map(|e| e.tag_name().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn has_click_handler(&self, node: &Node) -> bool {
        as_html(node).map_or(false, |e| e.onclick().is_some())
            || as_element(node).map_or(false, |e| e.has_attribute("onclick"))
    }

    fn inline_style(&self, node: &Node, property: &str) -> Option<String> {
        let value = as_html(node)?.style().get_property_value(property).ok()?;
        non_empty(value)
    }

    fn computed_style(&self, node: &Node, property: &str) -> Option<String> {
        let element = as_element(node)?;
        let style = self.window.get_computed_style(element).ok()??;
        non_empty(style.get_property_value(property).ok()?)
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        as_element(node)?.get_attribute(name)
    }

    fn text_property(&self, node: &Node, property: TextProperty) -> Option<String> {
        Reflect::get(node, &JsValue::from_str(property.js_name()))
            .ok()?
            .as_string()
    }

    fn inner_text(&self, node: &Node) -> Option<String> {
        match as_html(node) {
            Some(html) => Some(html.inner_text()),
            None if self.is_element(node) => node.text_content(),
            None => None,
        }
    }

    fn is_disabled(&self, node: &Node) -> bool {
        Reflect::get(node, &JsValue::from_str("disabled"))
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        as_element(node).map_or(false, |e| e.class_list().contains(class))
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        match as_element(node) {
            Some(element) => {
                let children = element.children();
                (0..children.length())
                    .filter_map(|i| children.item(i))
                    .map(Node::from)
                    .collect()
            }
            None => Vec::new(),
        }
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn bounding_rect(&self, node: &Node) -> Rect {
        as_element(node)
            .map(|e| {
                let r = e.get_bounding_client_rect();
                Rect::new(r.x(), r.y(), r.width(), r.height())
            })
            .unwrap_or_default()
    }

    fn set_style(&self, node: &Node, property: &str, value: &str) -> Result<()> {
        let html = as_html(node)
            .ok_or_else(|| GuardError::Dom(format!("cannot set {} on a non-HTML node", property)))?;
        html.style()
            .set_property(property, value)
            .map_err(|e| js_error("style.setProperty", e))
    }

    fn set_attribute(&self, node: &Node, name: &str, value: &str) -> Result<()> {
        require_element(node, "setAttribute")?
            .set_attribute(name, value)
            .map_err(|e| js_error("setAttribute", e))
    }

    fn remove_attribute(&self, node: &Node, name: &str) -> Result<()> {
        require_element(node, "removeAttribute")?
            .remove_attribute(name)
            .map_err(|e| js_error("removeAttribute", e))
    }

    fn set_disabled(&self, node: &Node) -> Result<()> {
        Reflect::set(node, &JsValue::from_str("disabled"), &JsValue::TRUE)
            .map(|_| ())
            .map_err(|e| js_error("disabled", e))
    }

    fn create_element(&self, tag: &str) -> Result<Node> {
        self.document
            .create_element(tag)
            .map(Node::from)
            .map_err(|e| js_error("createElement", e))
    }

    fn add_class(&self, node: &Node, class: &str) -> Result<()> {
        require_element(node, "classList.add")?
            .class_list()
            .add_1(class)
            .map_err(|e| js_error("classList.add", e))
    }

    fn set_text(&self, node: &Node, text: &str) -> Result<()> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn append_child(&self, parent: &Node, child: &Node) -> Result<()> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(|e| js_error("appendChild", e))
    }

    fn insert_after(&self, reference: &Node, node: &Node) -> Result<()> {
        let parent = reference
            .parent_node()
            .ok_or_else(|| GuardError::Dom("reference node has no parent".to_string()))?;
        parent
            .insert_before(node, reference.next_sibling().as_ref())
            .map(|_| ())
            .map_err(|e| js_error("insertBefore", e))
    }

    fn remove_node(&self, node: &Node) -> Result<()> {
        let parent = node
            .parent_node()
            .ok_or_else(|| GuardError::Dom("node is not attached".to_string()))?;
        parent
            .remove_child(node)
            .map(|_| ())
            .map_err(|e| js_error("removeChild", e))
    }

    fn absorb_clicks(&self, node: &Node) -> Result<()> {
        let html = as_html(node)
            .ok_or_else(|| GuardError::Dom("cannot attach click handler".to_string()))?;
        CLICK_ABSORBER.with(|handler| html.set_onclick(Some(handler.unchecked_ref())));
        Ok(())
    }

    fn now_ms(&self) -> f64 {
        self.window.performance().map_or(0.0, |p| p.now())
    }
}

// WASM-specific tests that run in a browser environment
#[cfg(test)]
#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use cartblock_core::{GuardConfig, ScanService};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn mount(html: &str) -> (WebDom, Element) {
        let dom = WebDom::new().unwrap();
        let container = dom.document().create_element("div").unwrap();
        container.set_inner_html(html);
        dom.document().body().unwrap().append_child(&container).unwrap();
        (dom, container)
    }

    #[wasm_bindgen_test]
    fn test_button_blocked() {
        let (dom, container) = mount("<button id=\"wt-buy\">Add to Cart</button>");
        let mut service = ScanService::new(dom, GuardConfig::default()).unwrap();
        service.start();
        service.tick();
        service.commit_placements();

        let button: Node = service.dom().element_by_id("wt-buy").unwrap();
        assert!(service.dom().is_disabled(&button));
        assert_eq!(
            service.dom().inline_style(&button, "cursor").as_deref(),
            Some("not-allowed")
        );
        let overlay = button.next_sibling().unwrap();
        assert!(service.dom().has_class(&overlay, "ss-overlay"));
        container.remove();
    }

    #[wasm_bindgen_test]
    fn test_submit_input_loses_type() {
        let (dom, container) =
            mount("<input id=\"wt-input\" type=\"submit\" value=\"Buy Now\">");
        let mut service = ScanService::new(dom, GuardConfig::default()).unwrap();
        service.scan();

        let input = service.dom().element_by_id("wt-input").unwrap();
        assert_eq!(service.dom().attribute(&input, "type"), None);
        assert!(service.dom().is_disabled(&input));
        container.remove();
    }

    #[wasm_bindgen_test]
    fn test_link_untouched() {
        let (dom, container) = mount("<a id=\"wt-link\" href=\"#\">Learn more</a>");
        let mut service = ScanService::new(dom, GuardConfig::default()).unwrap();
        service.scan();

        let link = service.dom().element_by_id("wt-link").unwrap();
        assert!(link.next_sibling().is_none());
        assert_eq!(service.dom().inline_style(&link, "cursor"), None);
        container.remove();
    }

    #[wasm_bindgen_test]
    fn test_text_property_reads_value() {
        let (dom, container) = mount("<input id=\"wt-value\" value=\"Buy it\">");
        let input = dom.element_by_id("wt-value").unwrap();
        assert_eq!(
            dom.text_property(&input, TextProperty::Value).as_deref(),
            Some("Buy it")
        );
        container.remove();
    }
}
