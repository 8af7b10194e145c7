//! Push-based discovery from document mutation records
//!
//! Alternative to polling: the host forwards mutation records and page
//! lifecycle events, and the service runs the same detection pass as a
//! scan over just the affected nodes. Overlay reuse and pruning behave
//! exactly as they do for a full scan.

use crate::dom::{MutationKind, MutationRecord, PageDom};
use crate::scanner::{ScanReport, ScanService, ServiceState};
use tracing::debug;

/// Host events consumed by the observer strategy
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<N> {
    Mutations(Vec<MutationRecord<N>>),
    /// The document's ready state changed
    ReadyStateChanged,
    VisibilityChanged { visible: bool },
}

/// What the host should do after an event was handled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchOutcome {
    pub report: Option<ScanReport>,
    /// Discard mutation records queued in the host observer
    pub drain_pending: bool,
}

/// Nodes worth re-detecting for one record: the added nodes of a child-list
/// record, otherwise the record's target
pub fn affected_nodes<N>(record: &MutationRecord<N>) -> impl Iterator<Item = &N> {
    let use_added = record.kind == MutationKind::ChildList && !record.added_nodes.is_empty();
    let added = if use_added {
        record.added_nodes.as_slice()
    } else {
        &[]
    };
    let target = if use_added { None } else { record.target.as_ref() };
    added.iter().chain(target)
}

impl<D: PageDom> ScanService<D> {
    /// Handle one observer-strategy event. Ignored while stopped.
    pub fn handle_watch_event(&mut self, event: WatchEvent<D::Node>) -> WatchOutcome {
        if self.state() == ServiceState::Stopped {
            return WatchOutcome::default();
        }

        match event {
            WatchEvent::Mutations(records) => {
                let nodes: Vec<&D::Node> = records.iter().flat_map(affected_nodes).collect();
                if nodes.is_empty() {
                    return WatchOutcome::default();
                }
                let report = self.run_pass(nodes);
                debug!(
                    records = records.len(),
                    matched = report.matched,
                    "processed mutation records"
                );
                WatchOutcome {
                    report: Some(report),
                    drain_pending: false,
                }
            }
            WatchEvent::ReadyStateChanged => WatchOutcome {
                report: Some(self.scan()),
                drain_pending: true,
            },
            WatchEvent::VisibilityChanged { visible } => WatchOutcome {
                report: None,
                drain_pending: visible,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GuardConfig, ScanStrategy};
    use crate::testing::{FakeDom, NodeId};

    fn observing(dom: FakeDom) -> ScanService<FakeDom> {
        let config = GuardConfig {
            strategy: ScanStrategy::Observe,
            ..GuardConfig::default()
        };
        let mut service = ScanService::new(dom, config).unwrap();
        service.start();
        service
    }

    fn child_list(target: NodeId, added: Vec<NodeId>) -> MutationRecord<NodeId> {
        MutationRecord {
            kind: MutationKind::ChildList,
            target: Some(target),
            added_nodes: added,
        }
    }

    #[test]
    fn test_affected_nodes_prefers_added() {
        let record = child_list(NodeId(1), vec![NodeId(2), NodeId(3)]);
        let nodes: Vec<_> = affected_nodes(&record).copied().collect();
        assert_eq!(nodes, vec![NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_affected_nodes_falls_back_to_target() {
        let empty = child_list(NodeId(1), vec![]);
        assert_eq!(affected_nodes(&empty).copied().collect::<Vec<_>>(), vec![NodeId(1)]);

        let attributes = MutationRecord {
            kind: MutationKind::Attributes,
            target: Some(NodeId(4)),
            added_nodes: vec![NodeId(5)],
        };
        assert_eq!(
            affected_nodes(&attributes).copied().collect::<Vec<_>>(),
            vec![NodeId(4)]
        );

        let orphan: MutationRecord<NodeId> = MutationRecord {
            kind: MutationKind::CharacterData,
            target: None,
            added_nodes: vec![],
        };
        assert_eq!(affected_nodes(&orphan).count(), 0);
    }

    #[test]
    fn test_added_button_neutralized() {
        let dom = FakeDom::new();
        let body = dom.body();
        let mut service = observing(dom);

        let buy = service.dom().element(body, "button");
        service.dom().text(buy, "Add to Cart");
        let outcome =
            service.handle_watch_event(WatchEvent::Mutations(vec![child_list(body, vec![buy])]));

        let report = outcome.report.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.overlays_created, 1);
        assert!(!outcome.drain_pending);
        assert!(service.dom().is_disabled(&buy));
    }

    #[test]
    fn test_attribute_change_on_target() {
        let dom = FakeDom::new();
        let a = dom.element(dom.body(), "a");
        dom.text(a, "Continue");
        let mut service = observing(dom);

        service.dom().set_attr(a, "aria-label", "Buy now");
        let outcome = service.handle_watch_event(WatchEvent::Mutations(vec![MutationRecord {
            kind: MutationKind::Attributes,
            target: Some(a),
            added_nodes: vec![],
        }]));
        assert_eq!(outcome.report.unwrap().matched, 1);
    }

    #[test]
    fn test_own_overlay_insertion_is_harmless() {
        let dom = FakeDom::new();
        let body = dom.body();
        let buy = dom.element(body, "button");
        dom.text(buy, "Buy now");
        let mut service = observing(dom);
        service.scan();

        // The observer reports our own overlay as an added node
        let overlay = service.dom().next_sibling(&buy).unwrap();
        let outcome =
            service.handle_watch_event(WatchEvent::Mutations(vec![child_list(body, vec![overlay])]));
        assert_eq!(outcome.report.unwrap().matched, 0);
        assert_eq!(service.overlay_count(), 1);
    }

    #[test]
    fn test_ready_state_rescans_and_drains() {
        let dom = FakeDom::new();
        let buy = dom.element(dom.body(), "input");
        dom.set_attr(buy, "value", "Buy Now");
        let mut service = observing(dom);

        let outcome = service.handle_watch_event(WatchEvent::ReadyStateChanged);
        assert_eq!(outcome.report.unwrap().matched, 1);
        assert!(outcome.drain_pending);
    }

    #[test]
    fn test_visibility_drains_without_scan() {
        let dom = FakeDom::new();
        let mut service = observing(dom);

        let visible = service.handle_watch_event(WatchEvent::VisibilityChanged { visible: true });
        assert_eq!(visible.report, None);
        assert!(visible.drain_pending);

        let hidden = service.handle_watch_event(WatchEvent::VisibilityChanged { visible: false });
        assert!(!hidden.drain_pending);
        assert_eq!(service.stats().scans, 0);
    }

    #[test]
    fn test_ignored_while_stopped() {
        let dom = FakeDom::new();
        let mut service = ScanService::new(dom, GuardConfig::default()).unwrap();
        let outcome = service.handle_watch_event(WatchEvent::ReadyStateChanged);
        assert_eq!(outcome, WatchOutcome::default());
    }
}
