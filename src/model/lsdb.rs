use std::collections::BTreeMap;

use crate::model::messages::NodeId;

#[derive(Debug, Clone)]
pub struct Lsp {
    pub origin: NodeId,
    pub seq: u64,
    pub links: BTreeMap<NodeId, f64>,
    pub learned_at: f64,
}

/// Per-origin latest link-state advertisement, keyed by sequence number.
/// Invariant: for every installed origin, the stored LSP is the one with the
/// highest `seq` ever accepted for it.
#[derive(Debug, Default)]
pub struct Lsdb {
    records: BTreeMap<NodeId, Lsp>,
}

impl Lsdb {
    pub fn should_accept(&self, origin: &str, seq: u64) -> bool {
        match self.records.get(origin) {
            Some(current) => seq > current.seq,
            None => true,
        }
    }

    /// Check-and-install in one step; returns whether installation happened.
    pub fn upsert(
        &mut self,
        origin: NodeId,
        seq: u64,
        links: BTreeMap<NodeId, f64>,
        now: f64,
    ) -> bool {
        if !self.should_accept(&origin, seq) {
            return false;
        }
        self.records.insert(
            origin.clone(),
            Lsp {
                origin,
                seq,
                links,
                learned_at: now,
            },
        );
        true
    }

    pub fn records(&self) -> impl Iterator<Item = &Lsp> {
        self.records.values()
    }

    pub fn age_out(&mut self, now: f64, max_age: f64) -> bool {
        let before = self.records.len();
        self.records
            .retain(|_, record| (now - record.learned_at) <= max_age);
        before != self.records.len()
    }

    /// Undirected adjacency map built from every installed LSP: for each
    /// `(origin, to, w)` edge this records both `origin -> to` and
    /// `to -> origin`. When two origins disagree on the weight of the edge
    /// between them, last-writer-wins: whichever origin's LSP was installed
    /// more recently determines the weight used for edges touching it,
    /// rather than averaging the two.
    pub fn build_graph(&self) -> BTreeMap<NodeId, BTreeMap<NodeId, f64>> {
        let mut graph: BTreeMap<NodeId, BTreeMap<NodeId, f64>> = BTreeMap::new();
        let mut by_recency: Vec<&Lsp> = self.records.values().collect();
        by_recency.sort_by(|a, b| a.learned_at.partial_cmp(&b.learned_at).unwrap());

        for lsp in by_recency {
            graph.entry(lsp.origin.clone()).or_default();
            for (to, weight) in &lsp.links {
                graph
                    .entry(lsp.origin.clone())
                    .or_default()
                    .insert(to.clone(), *weight);
                graph
                    .entry(to.clone())
                    .or_default()
                    .insert(lsp.origin.clone(), *weight);
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(pairs: &[(&str, f64)]) -> BTreeMap<NodeId, f64> {
        pairs.iter().map(|(n, w)| (n.to_string(), *w)).collect()
    }

    #[test]
    fn stale_seq_is_rejected() {
        let mut lsdb = Lsdb::default();
        assert!(lsdb.upsert("A".into(), 3, links(&[("B", 1.0)]), 0.0));
        assert!(!lsdb.should_accept("A", 3));
        assert!(!lsdb.upsert("A".into(), 2, links(&[("B", 1.0)]), 1.0));
        assert!(lsdb.upsert("A".into(), 4, links(&[("B", 1.0)]), 2.0));
    }

    #[test]
    fn build_graph_is_undirected() {
        let mut lsdb = Lsdb::default();
        lsdb.upsert("A".into(), 1, links(&[("B", 2.5)]), 0.0);
        let graph = lsdb.build_graph();
        assert_eq!(graph["A"]["B"], 2.5);
        assert_eq!(graph["B"]["A"], 2.5);
    }

    #[test]
    fn age_out_removes_stale_origins() {
        let mut lsdb = Lsdb::default();
        lsdb.upsert("A".into(), 1, links(&[("B", 1.0)]), 0.0);
        assert!(!lsdb.age_out(10.0, 100.0));
        assert!(lsdb.age_out(200.0, 100.0));
        assert_eq!(lsdb.records().count(), 0);
    }
}
