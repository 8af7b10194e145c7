//! CartBlock core
//!
//! Finds "add to cart" / "buy now" controls in a host document, disables
//! them in place and covers each one with a click-absorbing overlay.
//!
//! ## Architecture
//!
//! - [`dom::PageDom`] is the only way the core touches the page. The browser
//!   build implements it over `web-sys`; `testing::FakeDom` (behind the
//!   `testing` feature) implements it in memory.
//! - [`detector`] + [`extractors`] + [`pattern`] decide what to block.
//! - [`neutralizer`] and [`overlay`] do the blocking.
//! - [`scanner::ScanService`] ties it together and is driven by host timers
//!   (polling) or by mutation records ([`watcher`]).
//!
//! ## Usage
//!
//! ```
//! use cartblock_core::{GuardConfig, PageDom, ScanService};
//! use cartblock_core::testing::FakeDom;
//!
//! let dom = FakeDom::new();
//! let button = dom.element(dom.body(), "button");
//! dom.text(button, "Add to Cart");
//!
//! let mut service = ScanService::new(dom, GuardConfig::default()).unwrap();
//! service.start();
//! let report = service.tick().unwrap();
//! assert_eq!(report.matched, 1);
//!
//! // Host signals that layout has settled
//! service.commit_placements();
//! assert!(service.dom().is_disabled(&button));
//! ```

pub mod config;
pub mod detector;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod neutralizer;
pub mod overlay;
pub mod pattern;
pub mod scanner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod watcher;

pub use config::{GuardConfig, ScanStrategy};
pub use detector::{Detection, Detector, CANDIDATE_SELECTOR, CANDIDATE_TAGS};
pub use dom::{MutationKind, MutationRecord, PageDom, Rect, TextProperty};
pub use error::{GuardError, Result};
pub use extractors::SignalSource;
pub use neutralizer::neutralize;
pub use overlay::{commit_placement, place_overlay, OverlayStyle, Placement, ProvisionalPlacement};
pub use pattern::is_purchase_action;
pub use scanner::{ScanReport, ScanService, ScanStats, ServiceState};
pub use watcher::{WatchEvent, WatchOutcome};
