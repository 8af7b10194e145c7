//! Wiring between the scan service and browser timers/events
//!
//! The runtime is shared with every JS callback through `Rc`; callbacks hold a
//! `Weak` so dropping the last `CartBlock` handle tears everything down. The
//! browser runs callbacks to completion on one thread, so `RefCell` borrows
//! never overlap.

use crate::web_dom::{js_error, WebDom};
use cartblock_core::{
    GuardConfig, GuardError, MutationKind, MutationRecord, Result, ScanReport, ScanService,
    ScanStats, ScanStrategy, WatchEvent,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, MutationObserver, MutationObserverInit, Node};

/// Live timer and observer registrations
struct Handles {
    interval: Option<Interval>,
    observer: Option<Observer>,
}

struct Interval {
    id: i32,
    _callback: Closure<dyn FnMut()>,
}

struct Observer {
    observer: MutationObserver,
    _on_mutation: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    on_ready_state: Closure<dyn FnMut(Event)>,
    on_visibility: Closure<dyn FnMut(Event)>,
}

pub struct Runtime {
    service: RefCell<ScanService<WebDom>>,
    handles: RefCell<Option<Handles>>,
    layout_pending: Cell<bool>,
}

impl Runtime {
    pub fn new(config: GuardConfig) -> Result<Rc<Self>> {
        let dom = WebDom::new()?;
        let service = ScanService::new(dom, config)?;
        Ok(Rc::new(Self {
            service: RefCell::new(service),
            handles: RefCell::new(None),
            layout_pending: Cell::new(false),
        }))
    }

    pub fn is_running(&self) -> bool {
        self.handles.borrow().is_some()
    }

    pub fn stats(&self) -> ScanStats {
        self.service.borrow().stats().clone()
    }

    /// Scan once for controls already on the page, then hand over to the
    /// configured strategy
    pub fn start(self: &Rc<Self>) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.service.borrow_mut().start();
        self.run(|service| Some(service.scan()));

        let strategy = self.service.borrow().config().strategy;
        let handles = match strategy {
            ScanStrategy::Poll => Handles {
                interval: Some(self.start_interval()?),
                observer: None,
            },
            ScanStrategy::Observe => Handles {
                interval: None,
                observer: Some(self.start_observer()?),
            },
        };
        *self.handles.borrow_mut() = Some(handles);
        Ok(())
    }

    pub fn stop(&self) {
        let handles = self.handles.borrow_mut().take();
        if let Some(handles) = handles {
            let service = self.service.borrow();
            let dom = service.dom();
            if let Some(interval) = &handles.interval {
                dom.window().clear_interval_with_handle(interval.id);
            }
            if let Some(observer) = &handles.observer {
                observer.observer.disconnect();
                for (event, callback) in [
                    ("readystatechange", &observer.on_ready_state),
                    ("visibilitychange", &observer.on_visibility),
                ] {
                    if let Err(e) = dom
                        .document()
                        .remove_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
                    {
                        warn!("{}", js_error("removeEventListener", e));
                    }
                }
            }
        }
        self.service.borrow_mut().stop();
    }

    /// Scan immediately, outside the timer
    pub fn scan_now(self: &Rc<Self>) -> ScanReport {
        self.run(|service| Some(service.scan())).unwrap_or_default()
    }

    fn run(
        self: &Rc<Self>,
        f: impl FnOnce(&mut ScanService<WebDom>) -> Option<ScanReport>,
    ) -> Option<ScanReport> {
        let (report, pending) = {
            let mut service = self.service.borrow_mut();
            let report = f(&mut service);
            (report, service.has_pending_placements())
        };
        if pending {
            self.schedule_layout_commit();
        }
        report
    }

    fn dispatch(self: &Rc<Self>, event: WatchEvent<Node>) {
        let (outcome, pending) = {
            let mut service = self.service.borrow_mut();
            let outcome = service.handle_watch_event(event);
            (outcome, service.has_pending_placements())
        };
        if outcome.drain_pending {
            self.drain_observer();
        }
        if pending {
            self.schedule_layout_commit();
        }
    }

    /// Commit pending overlays on the next animation frame, once layout for
    /// the current mutations has been computed
    fn schedule_layout_commit(self: &Rc<Self>) {
        if self.layout_pending.replace(true) {
            return;
        }
        let weak = Rc::downgrade(self);
        let callback = Closure::once_into_js(move |_timestamp: f64| {
            if let Some(runtime) = weak.upgrade() {
                runtime.layout_pending.set(false);
                let committed = runtime.service.borrow_mut().commit_placements();
                debug!(committed, "layout settled");
            }
        });

        let result = self
            .service
            .borrow()
            .dom()
            .window()
            .request_animation_frame(callback.unchecked_ref());
        if let Err(e) = result {
            self.layout_pending.set(false);
            warn!("{}", js_error("requestAnimationFrame", e));
        }
    }

    fn start_interval(self: &Rc<Self>) -> Result<Interval> {
        let weak = Rc::downgrade(self);
        let callback = Closure::wrap(Box::new(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.run(|service| service.tick());
            }
        }) as Box<dyn FnMut()>);

        let service = self.service.borrow();
        let period = i32::try_from(service.config().scan_interval_ms).map_err(|_| {
            GuardError::InvalidConfig("scan interval exceeds the host timer range".to_string())
        })?;
        let id = service
            .dom()
            .window()
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                period,
            )
            .map_err(|e| js_error("setInterval", e))?;
        debug!(period, "polling started");

        Ok(Interval {
            id,
            _callback: callback,
        })
    }

    fn start_observer(self: &Rc<Self>) -> Result<Observer> {
        let weak = Rc::downgrade(self);
        let on_mutation = Closure::wrap(Box::new(
            move |records: js_sys::Array, _observer: MutationObserver| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.dispatch(WatchEvent::Mutations(convert_records(&records)));
                }
            },
        )
            as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())
            .map_err(|e| js_error("MutationObserver", e))?;
        observer
            .observe_with_options(self.service.borrow().dom().document(), &observer_options())
            .map_err(|e| js_error("MutationObserver.observe", e))?;

        let on_ready_state = self.listen("readystatechange", |_| WatchEvent::ReadyStateChanged)?;
        let on_visibility = self.listen("visibilitychange", |dom| WatchEvent::VisibilityChanged {
            visible: !dom.document().hidden(),
        })?;
        debug!("mutation observer started");

        Ok(Observer {
            observer,
            _on_mutation: on_mutation,
            on_ready_state,
            on_visibility,
        })
    }

    fn listen(
        self: &Rc<Self>,
        event: &str,
        to_event: fn(&WebDom) -> WatchEvent<Node>,
    ) -> Result<Closure<dyn FnMut(Event)>> {
        let weak: Weak<Self> = Rc::downgrade(self);
        let callback = Closure::wrap(Box::new(move |_event: Event| {
            if let Some(runtime) = weak.upgrade() {
                let event = to_event(runtime.service.borrow().dom());
                runtime.dispatch(event);
            }
        }) as Box<dyn FnMut(Event)>);

        self.service
            .borrow()
            .dom()
            .document()
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|e| js_error("addEventListener", e))?;
        Ok(callback)
    }

    /// Discard records queued in the observer
    fn drain_observer(&self) {
        if let Some(Handles {
            observer: Some(observer),
            ..
        }) = self.handles.borrow().as_ref()
        {
            let dropped = observer.observer.take_records().length();
            debug!(dropped, "drained pending mutation records");
        }
    }
}

fn observer_options() -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_attributes(true);
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_character_data(true);
    init.set_attribute_old_value(true);
    init.set_character_data_old_value(true);
    init
}

fn convert_records(records: &js_sys::Array) -> Vec<MutationRecord<Node>> {
    records
        .iter()
        .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
        .filter_map(|record| {
            let kind = MutationKind::parse(&record.type_())?;
            let added = record.added_nodes();
            Some(MutationRecord {
                kind,
                target: record.target(),
                added_nodes: (0..added.length()).filter_map(|i| added.item(i)).collect(),
            })
        })
        .collect()
}
