//! The scanning service
//!
//! One [`ScanService`] exists per page. It owns the document handle, the
//! detector, the overlays awaiting their layout-settled commit and the
//! diagnostic totals. The host drives it: a timer calls [`ScanService::tick`],
//! and a layout-settled callback calls [`ScanService::commit_placements`].
//!
//! Every overlay the service places is stamped with a key attribute and
//! indexed by it, so matching a reused overlay against the registry costs one
//! lookup instead of a walk over every tracked overlay. A tracked overlay is
//! only valid while it is the next sibling of its target; anything else is
//! removed at the start of the following pass.

use crate::config::GuardConfig;
use crate::detector::Detector;
use crate::dom::PageDom;
use crate::error::Result;
use crate::neutralizer::neutralize;
use crate::overlay::{commit_placement, place_overlay, OverlayStyle, Placement, ProvisionalPlacement};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Attribute carrying the registry key of a tracked overlay
pub const OVERLAY_KEY_ATTRIBUTE: &str = "data-ss-key";

/// Lifecycle of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Idle,
    Scanning,
}

/// Counters for one pass over a set of nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub candidates: usize,
    pub matched: usize,
    /// Elements touched by neutralization, children included
    pub neutralized: usize,
    pub overlays_created: usize,
    pub overlays_reused: usize,
    pub overlays_skipped: usize,
    pub overlays_pruned: usize,
    pub failures: usize,
    pub elapsed_ms: f64,
}

/// Totals across the lifetime of the service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub scans: u64,
    pub total_elapsed_ms: f64,
    pub matched: u64,
    pub overlays_created: u64,
    pub overlays_pruned: u64,
    pub failures: u64,
    pub last: Option<ScanReport>,
}

impl ScanStats {
    fn record(&mut self, report: &ScanReport) {
        self.scans += 1;
        self.total_elapsed_ms += report.elapsed_ms;
        self.matched += report.matched as u64;
        self.overlays_created += report.overlays_created as u64;
        self.overlays_pruned += report.overlays_pruned as u64;
        self.failures += report.failures as u64;
        self.last = Some(report.clone());
    }
}

pub struct ScanService<D: PageDom> {
    dom: D,
    config: GuardConfig,
    detector: Detector,
    style: OverlayStyle,
    state: ServiceState,
    placed: HashMap<String, ProvisionalPlacement<D::Node>>,
    next_key: u64,
    /// Keys of overlays awaiting the layout-settled commit
    pending: HashSet<String>,
    stats: ScanStats,
}

impl<D: PageDom> ScanService<D> {
    /// Create a stopped service
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation
    pub fn new(dom: D, config: GuardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: Detector::new(config.marker_class.clone()),
            style: OverlayStyle::from(&config),
            dom,
            config,
            state: ServiceState::Stopped,
            placed: HashMap::new(),
            next_key: 0,
            pending: HashSet::new(),
            stats: ScanStats::default(),
        })
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != ServiceState::Stopped
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn start(&mut self) {
        if self.state == ServiceState::Stopped {
            info!(strategy = ?self.config.strategy, "scan service started");
            self.state = ServiceState::Idle;
        }
    }

    /// Stop reacting to ticks. Overlays already on the page stay there.
    pub fn stop(&mut self) {
        if self.state != ServiceState::Stopped {
            info!(scans = self.stats.scans, "scan service stopped");
            self.state = ServiceState::Stopped;
            self.pending.clear();
        }
    }

    /// Timer entry point: scan the document if the service is running
    pub fn tick(&mut self) -> Option<ScanReport> {
        if self.state != ServiceState::Idle {
            return None;
        }
        Some(self.scan())
    }

    /// Scan every candidate in the document, regardless of lifecycle state
    pub fn scan(&mut self) -> ScanReport {
        let candidates = self.dom.query_candidates();
        let report = self.run_pass(candidates.iter());
        info!(
            elapsed_ms = report.elapsed_ms,
            total_elapsed_ms = self.stats.total_elapsed_ms,
            candidates = report.candidates,
            matched = report.matched,
            "scan cycle complete"
        );
        report
    }

    /// Run detection and neutralization over an explicit set of nodes
    pub(crate) fn run_pass<'a, I>(&mut self, nodes: I) -> ScanReport
    where
        I: IntoIterator<Item = &'a D::Node>,
        D::Node: 'a,
    {
        let previous = self.state;
        if previous != ServiceState::Stopped {
            self.state = ServiceState::Scanning;
        }
        let start = self.dom.now_ms();

        let mut report = ScanReport::default();
        if self.config.prune_detached {
            report.overlays_pruned = self.prune_detached();
        }
        for node in nodes {
            report.candidates += 1;
            if let Err(e) = self.process(node, &mut report) {
                report.failures += 1;
                warn!(node = ?node, error = %e, "failed to neutralize candidate");
            }
        }

        report.elapsed_ms = (self.dom.now_ms() - start).max(0.0);
        self.stats.record(&report);
        self.state = previous;
        report
    }

    fn process(&mut self, node: &D::Node, report: &mut ScanReport) -> Result<()> {
        let detection = match self.detector.detect(&self.dom, node) {
            Some(detection) => detection,
            None => return Ok(()),
        };
        debug!(node = ?node, source = ?detection.source, signal = %detection.signal, "purchase control detected");
        report.matched += 1;
        report.neutralized += neutralize(&self.dom, node)?;

        let placement = match place_overlay(&self.dom, node, &self.style)? {
            Placement::Skipped => {
                report.overlays_skipped += 1;
                return Ok(());
            }
            Placement::Created(p) => {
                report.overlays_created += 1;
                p
            }
            Placement::Reused(p) => {
                report.overlays_reused += 1;
                p
            }
        };

        let key = self.track(placement)?;
        self.pending.insert(key);
        Ok(())
    }

    /// Register a placement unless the overlay already carries its key.
    /// Overlays left behind by another instance get a fresh key.
    fn track(&mut self, placement: ProvisionalPlacement<D::Node>) -> Result<String> {
        if let Some(key) = self.dom.attribute(&placement.overlay, OVERLAY_KEY_ATTRIBUTE) {
            if self.placed.get(&key) == Some(&placement) {
                return Ok(key);
            }
        }
        let key = self.next_key.to_string();
        self.next_key += 1;
        self.dom
            .set_attribute(&placement.overlay, OVERLAY_KEY_ATTRIBUTE, &key)?;
        self.placed.insert(key.clone(), placement);
        Ok(key)
    }

    /// Remove overlays that no longer sit right after their target: the
    /// target left the document, or the page moved it somewhere else
    fn prune_detached(&mut self) -> usize {
        let dom = &self.dom;
        let pending = &mut self.pending;
        let mut pruned = 0;
        self.placed.retain(|key, p| {
            let in_place = dom.is_connected(&p.target)
                && dom.next_sibling(&p.target).as_ref() == Some(&p.overlay);
            if in_place {
                return true;
            }
            if dom.is_connected(&p.overlay) {
                if let Err(e) = dom.remove_node(&p.overlay) {
                    warn!(error = %e, "failed to remove stale overlay");
                    return true;
                }
                pruned += 1;
            }
            pending.remove(key);
            false
        });
        if pruned > 0 {
            debug!(pruned, "removed overlays of moved or detached controls");
        }
        pruned
    }

    /// Whether overlays are waiting for the layout-settled signal
    pub fn has_pending_placements(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Layout-settled callback: pin every pending overlay over its target.
    /// Returns the number committed.
    pub fn commit_placements(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut committed = 0;
        for placement in pending.iter().filter_map(|key| self.placed.get(key)) {
            match commit_placement(&self.dom, placement) {
                Ok(()) => committed += 1,
                Err(e) => {
                    self.stats.failures += 1;
                    warn!(error = %e, "overlay placement not committed");
                }
            }
        }
        committed
    }

    /// Overlays currently tracked on the page
    pub fn overlay_count(&self) -> usize {
        self.placed.len()
    }
}
