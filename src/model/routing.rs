use std::collections::BTreeMap;

use crate::model::messages::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub next_hop: NodeId,
    pub cost: f64,
}

/// Destination -> (next-hop, cost) view exposed to the forwarder. Derived
/// state: never the source of truth, always rebuilt from an engine's
/// `(dist, next_hop)` tables.
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    entries: BTreeMap<NodeId, RouteEntry>,
}

impl RoutingTable {
    /// Replaces the whole table from a freshly computed `dist`/`next_hop`
    /// pair, skipping `self_id` and any destination with no next hop
    /// (unreachable).
    pub fn rebuild(
        &mut self,
        self_id: &str,
        dist: &BTreeMap<NodeId, f64>,
        next_hop: &BTreeMap<NodeId, NodeId>,
    ) {
        self.entries.clear();
        for (dst, cost) in dist {
            if dst == self_id {
                continue;
            }
            let Some(hop) = next_hop.get(dst) else {
                continue;
            };
            self.entries.insert(
                dst.clone(),
                RouteEntry {
                    next_hop: hop.clone(),
                    cost: *cost,
                },
            );
        }
    }

    pub fn next_hop(&self, dst: &str) -> Option<&NodeId> {
        self.entries.get(dst).map(|entry| &entry.next_hop)
    }

    pub fn cost(&self, dst: &str) -> Option<f64> {
        self.entries.get(dst).map(|entry| entry.cost)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&NodeId, &RouteEntry)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_skips_self_and_unreachable() {
        let mut table = RoutingTable::default();
        let dist: BTreeMap<NodeId, f64> = [
            ("A".to_string(), 0.0),
            ("B".to_string(), 1.0),
            ("C".to_string(), f64::INFINITY),
        ]
        .into_iter()
        .collect();
        let next_hop: BTreeMap<NodeId, NodeId> =
            [("B".to_string(), "B".to_string())].into_iter().collect();

        table.rebuild("A", &dist, &next_hop);

        assert_eq!(table.next_hop("B"), Some(&"B".to_string()));
        assert_eq!(table.cost("B"), Some(1.0));
        assert_eq!(table.next_hop("A"), None);
        assert_eq!(table.next_hop("C"), None);
    }
}
