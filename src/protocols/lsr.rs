use std::collections::BTreeMap;

use crate::model::lsdb::Lsdb;
use crate::model::messages::NodeId;
use crate::model::state::NeighborTable;
use crate::protocols::dijkstra::{compute_spf, SpfResult};

#[derive(Debug, Clone, Copy)]
pub struct LsrTimers {
    pub hello_every: f64,
    pub lsp_every: f64,
}

impl Default for LsrTimers {
    fn default() -> Self {
        Self {
            hello_every: 5.0,
            lsp_every: 20.0,
        }
    }
}

/// Link-state routing engine: local LSP generation, LSDB ingestion, and the
/// Dijkstra recompute this triggers. One instance per node.
pub struct LsrEngine {
    self_id: NodeId,
    seq: u64,
    lsdb: Lsdb,
    spf: SpfResult,
}

impl LsrEngine {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            seq: 0,
            lsdb: Lsdb::default(),
            spf: SpfResult::default(),
        }
    }

    /// Increments the local seq counter and returns `(seq, links)` for the
    /// caller to wrap into a wire `Frame::Info` payload.
    pub fn make_local_lsp(&mut self, links: BTreeMap<NodeId, f64>) -> (u64, BTreeMap<NodeId, f64>) {
        self.seq += 1;
        (self.seq, links)
    }

    /// Installs an LSP into the LSDB and recomputes shortest paths if it was
    /// new. Returns whether it changed anything (install happened).
    pub fn ingest_lsp(
        &mut self,
        origin: NodeId,
        seq: u64,
        links: BTreeMap<NodeId, f64>,
        now: f64,
    ) -> bool {
        let installed = self.lsdb.upsert(origin, seq, links, now);
        if installed {
            self.recompute();
        }
        installed
    }

    fn recompute(&mut self) {
        let graph = self.lsdb.build_graph();
        self.spf = compute_spf(&graph, &self.self_id);
    }

    pub fn next_hop(&self, dst: &str) -> Option<&NodeId> {
        self.spf.next_hop.get(dst)
    }

    pub fn dist(&self, dst: &str) -> Option<f64> {
        self.spf.dist.get(dst).copied()
    }

    pub fn routing_snapshot(&self) -> &SpfResult {
        &self.spf
    }

    pub fn age_out(&mut self, now: f64, max_age: f64) -> bool {
        let changed = self.lsdb.age_out(now, max_age);
        if changed {
            self.recompute();
        }
        changed
    }

    /// Updates the recorded cost to `neighbor`. Per the documented open
    /// question this is never invoked automatically from a measured HELLO
    /// RTT; it exists so a caller can wire that in explicitly, matching the
    /// original implementation's commented-out call.
    pub fn on_hello_result(neighbors: &mut NeighborTable, neighbor: &str, measured_cost: f64) {
        neighbors.set_cost(neighbor, measured_cost);
    }
}
