//! CartBlock content script
//!
//! Disables "add to cart" / "buy now" controls on the page it is injected
//! into. Detection and neutralization live in `cartblock-core`; this crate
//! binds that logic to the live document, browser timers and the console.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { runContentScript, CartBlock } from './pkg/cartblock_wasm.js';
//!
//! await init();
//!
//! // Default behavior: poll every 500ms
//! runContentScript();
//!
//! // Or drive an instance directly
//! const guard = new CartBlock({ strategy: "observe", log_level: "debug" });
//! guard.start();
//! console.log(guard.stats());
//! guard.stop();
//! ```

pub mod console_log;
pub mod host;
pub mod web_dom;

use cartblock_core::{GuardConfig, GuardError};
use host::Runtime;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

thread_local! {
    /// Instance started by `runContentScript`
    static ACTIVE: RefCell<Option<CartBlock>> = const { RefCell::new(None) };
}

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Start the page-wide instance. Calling it again while running is a no-op.
#[wasm_bindgen(js_name = runContentScript)]
pub fn run_content_script(config: JsValue) -> Result<(), JsValue> {
    ACTIVE.with(|active| {
        if active.borrow().is_some() {
            return Ok(());
        }
        let guard = CartBlock::new(config)?;
        guard.start()?;
        *active.borrow_mut() = Some(guard);
        Ok(())
    })
}

/// Stop and drop the page-wide instance
#[wasm_bindgen(js_name = stopContentScript)]
pub fn stop_content_script() {
    let guard = ACTIVE.with(|active| active.borrow_mut().take());
    if let Some(guard) = guard {
        guard.stop();
    }
}

fn to_js(err: GuardError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Accepts `undefined`/`null` (defaults), a JSON string, or a plain object
fn parse_config(value: JsValue) -> Result<GuardConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(GuardConfig::default());
    }
    if let Some(json) = value.as_string() {
        return GuardConfig::from_json(&json).map_err(to_js);
    }
    let config: GuardConfig = serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?;
    config.validate().map_err(to_js)?;
    Ok(config)
}

/// Purchase-control blocker bound to the current document
#[wasm_bindgen]
pub struct CartBlock {
    runtime: Rc<Runtime>,
}

#[wasm_bindgen]
impl CartBlock {
    /// The console log level is page-wide: the first instance sets it and
    /// later instances keep it, logging a warning when theirs differs.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<CartBlock, JsValue> {
        let config = parse_config(config)?;
        let requested = config.tracing_level().map_err(to_js)?;
        let active = console_log::init_logging(requested);
        if active != requested {
            tracing::warn!(%requested, %active, "console log level already set; keeping it");
        }
        let runtime = Runtime::new(config).map_err(to_js)?;
        Ok(Self { runtime })
    }

    /// Scan the page now and keep watching it
    pub fn start(&self) -> Result<(), JsValue> {
        self.runtime.start().map_err(to_js)
    }

    /// Stop watching. Controls already blocked stay blocked.
    pub fn stop(&self) {
        self.runtime.stop();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// Run one scan cycle immediately and return its report
    #[wasm_bindgen(js_name = scanNow)]
    pub fn scan_now(&self) -> Result<JsValue, JsValue> {
        let report = self.runtime.scan_now();
        serde_wasm_bindgen::to_value(&report)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Cumulative scan statistics
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.runtime.stats())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}


#[cfg(test)]
#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_parse_config_defaults() {
        assert_eq!(parse_config(JsValue::UNDEFINED).unwrap(), GuardConfig::default());
        assert_eq!(parse_config(JsValue::NULL).unwrap(), GuardConfig::default());
    }

    #[wasm_bindgen_test]
    fn test_parse_config_json_string() {
        let config = parse_config(JsValue::from_str(r#"{"scan_interval_ms": 250}"#)).unwrap();
        assert_eq!(config.scan_interval_ms, 250);
        assert!(parse_config(JsValue::from_str(r#"{"scan_interval_ms": 0}"#)).is_err());
    }

    #[wasm_bindgen_test]
    fn test_start_stop() {
        let guard = CartBlock::new(JsValue::UNDEFINED).unwrap();
        assert!(!guard.is_running());
        guard.start().unwrap();
        assert!(guard.is_running());
        guard.stop();
        assert!(!guard.is_running());
    }

    #[wasm_bindgen_test]
    fn test_overlay_absorbs_clicks_after_instance_dropped() {
        use std::cell::Cell;
        use wasm_bindgen::JsCast;
        use web_sys::{Event, HtmlElement};

        let document = web_sys::window().unwrap().document().unwrap();
        let container = document.create_element("div").unwrap();
        container.set_inner_html("<button id=\"wt-dropped\">Buy now</button>");
        document.body().unwrap().append_child(&container).unwrap();

        let guard = CartBlock::new(JsValue::UNDEFINED).unwrap();
        guard.start().unwrap();
        guard.stop();
        drop(guard);

        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let listener = Closure::wrap(Box::new(move |_event: Event| {
            counter.set(counter.get() + 1);
        }) as Box<dyn FnMut(Event)>);
        container
            .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
            .unwrap();

        let button = document.get_element_by_id("wt-dropped").unwrap();
        let overlay = button.next_element_sibling().unwrap();
        assert!(overlay.class_list().contains("ss-overlay"));
        overlay.unchecked_ref::<HtmlElement>().click();
        assert_eq!(clicks.get(), 0);

        container.unchecked_ref::<HtmlElement>().click();
        assert_eq!(clicks.get(), 1);
        container.remove();
    }

    #[wasm_bindgen_test]
    fn test_observe_strategy_start_stop() {
        let guard = CartBlock::new(JsValue::from_str(r#"{"strategy": "observe"}"#)).unwrap();
        guard.start().unwrap();
        assert!(guard.is_running());
        guard.stop();
        assert!(!guard.is_running());
    }
}
