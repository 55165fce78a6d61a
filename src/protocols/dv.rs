use std::collections::BTreeMap;

use crate::model::messages::NodeId;

#[derive(Debug, Clone, Copy)]
pub struct DvTimers {
    pub dv_every: f64,
}

impl Default for DvTimers {
    fn default() -> Self {
        Self { dv_every: 10.0 }
    }
}

/// Distance-vector routing engine. Relaxes `dv_table` against each neighbor's
/// most recently advertised vector; no split-horizon or hold-down by default
/// (count-to-infinity on link failure is possible, matching the reference),
/// but poison-reverse on advertisement is available as an opt-in since the
/// relaxation rule is otherwise identical either way.
pub struct DvEngine {
    self_id: NodeId,
    link_costs: BTreeMap<NodeId, f64>,
    dv_table: BTreeMap<NodeId, f64>,
    next_hop: BTreeMap<NodeId, NodeId>,
    vectors: BTreeMap<NodeId, BTreeMap<NodeId, f64>>,
    poison_reverse: bool,
}

impl DvEngine {
    pub fn new(self_id: NodeId, link_costs: BTreeMap<NodeId, f64>, poison_reverse: bool) -> Self {
        let mut dv_table = BTreeMap::new();
        dv_table.insert(self_id.clone(), 0.0);
        let mut next_hop = BTreeMap::new();
        for (neighbor, cost) in &link_costs {
            dv_table.insert(neighbor.clone(), *cost);
            next_hop.insert(neighbor.clone(), neighbor.clone());
        }
        Self {
            self_id,
            link_costs,
            dv_table,
            next_hop,
            vectors: BTreeMap::new(),
            poison_reverse,
        }
    }

    /// Snapshot to wrap into a wire `Frame::Info` payload: `{origin, dist}`.
    pub fn make_vector(&self) -> BTreeMap<NodeId, f64> {
        self.dv_table.clone()
    }

    /// Stores `dist` under `origin` and relaxes every advertised destination
    /// through it. Returns whether anything in `dv_table`/`next_hop` changed.
    pub fn ingest_vector(&mut self, origin: NodeId, dist: BTreeMap<NodeId, f64>) -> bool {
        let Some(&link_cost) = self.link_costs.get(&origin) else {
            self.vectors.insert(origin, dist);
            return false;
        };

        let mut changed = false;
        for (dst, advertised) in &dist {
            if *dst == self.self_id {
                continue;
            }
            let candidate = link_cost + advertised;
            let better = self
                .dv_table
                .get(dst)
                .map_or(true, |current| candidate < *current);
            if better {
                self.dv_table.insert(dst.clone(), candidate);
                self.next_hop.insert(dst.clone(), origin.clone());
                changed = true;
            }
        }

        self.vectors.insert(origin, dist);
        changed
    }

    pub fn next_hop(&self, dst: &str) -> Option<&NodeId> {
        self.next_hop.get(dst)
    }

    pub fn dist(&self, dst: &str) -> Option<f64> {
        self.dv_table.get(dst).copied()
    }

    pub fn dist_table(&self) -> &BTreeMap<NodeId, f64> {
        &self.dv_table
    }

    pub fn next_hop_table(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.next_hop
    }

    /// Vector this engine would send to `neighbor` on the next advertisement,
    /// applying poison-reverse (advertising `infinity` for routes learned
    /// through that same neighbor) when enabled.
    pub fn vector_for_neighbor(&self, neighbor: &str) -> BTreeMap<NodeId, f64> {
        if !self.poison_reverse {
            return self.dv_table.clone();
        }
        self.dv_table
            .iter()
            .map(|(dst, cost)| {
                let routed_via_neighbor = self
                    .next_hop
                    .get(dst)
                    .is_some_and(|hop| hop == neighbor && dst != neighbor);
                if routed_via_neighbor {
                    (dst.clone(), f64::INFINITY)
                } else {
                    (dst.clone(), *cost)
                }
            })
            .collect()
    }
}
