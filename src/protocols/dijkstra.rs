use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::model::messages::NodeId;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpfResult {
    pub dist: BTreeMap<NodeId, f64>,
    pub next_hop: BTreeMap<NodeId, NodeId>,
}

/// Wraps `f64` so it can sit in a `BinaryHeap`. Link costs are never NaN, so
/// `total_cmp` is a safe total order here.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapCost(f64);

impl Eq for HeapCost {}

impl PartialOrd for HeapCost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapCost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Single-source shortest path with next-hop reconstruction, over an
/// undirected adjacency map such as `Lsdb::build_graph()`. A real
/// min-priority-queue discipline (`BinaryHeap<Reverse<...>>`), not a linear
/// scan. Unreachable destinations have no `dist`/`next_hop` entry; ties
/// within the heap are broken by destination id for determinism.
pub fn compute_spf(graph: &BTreeMap<NodeId, BTreeMap<NodeId, f64>>, source: &str) -> SpfResult {
    let mut dist: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut parent: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut heap: BinaryHeap<Reverse<(HeapCost, NodeId)>> = BinaryHeap::new();

    dist.insert(source.to_string(), 0.0);
    heap.push(Reverse((HeapCost(0.0), source.to_string())));

    while let Some(Reverse((HeapCost(d), u))) = heap.pop() {
        if dist.get(&u).is_some_and(|&best| d > best) {
            continue;
        }
        let Some(edges) = graph.get(&u) else {
            continue;
        };
        for (v, w) in edges {
            let nd = d + w;
            let better = dist.get(v).map_or(true, |&best| nd < best);
            if better {
                dist.insert(v.clone(), nd);
                parent.insert(v.clone(), u.clone());
                heap.push(Reverse((HeapCost(nd), v.clone())));
            }
        }
    }

    let mut next_hop: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    for dst in graph.keys() {
        if dst == source || !dist.contains_key(dst) {
            continue;
        }
        let mut cur = dst.clone();
        let mut prev = parent.get(&cur).cloned();
        while let Some(p) = &prev {
            if p == source {
                break;
            }
            cur = p.clone();
            prev = parent.get(&cur).cloned();
        }
        if prev.as_deref() == Some(source) {
            next_hop.insert(dst.clone(), cur);
        }
    }

    SpfResult { dist, next_hop }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str, f64)]) -> BTreeMap<NodeId, BTreeMap<NodeId, f64>> {
        let mut g: BTreeMap<NodeId, BTreeMap<NodeId, f64>> = BTreeMap::new();
        for (u, v, w) in edges {
            g.entry(u.to_string()).or_default().insert(v.to_string(), *w);
            g.entry(v.to_string()).or_default().insert(u.to_string(), *w);
        }
        g
    }

    #[test]
    fn triangle_shortest_path_picks_direct_edge() {
        let g = graph(&[("A", "B", 1.0), ("B", "C", 1.0), ("A", "C", 5.0)]);
        let result = compute_spf(&g, "A");
        assert_eq!(result.dist["C"], 2.0);
        assert_eq!(result.next_hop["C"], "B");
        assert_eq!(result.next_hop["B"], "B");
    }

    #[test]
    fn unreachable_node_has_no_entry() {
        let mut g = graph(&[("A", "B", 1.0)]);
        g.entry("Z".to_string()).or_default();
        let result = compute_spf(&g, "A");
        assert!(!result.dist.contains_key("Z"));
        assert!(!result.next_hop.contains_key("Z"));
    }

    #[test]
    fn source_never_gets_a_next_hop() {
        let g = graph(&[("A", "B", 1.0)]);
        let result = compute_spf(&g, "A");
        assert!(!result.next_hop.contains_key("A"));
        assert_eq!(result.dist["A"], 0.0);
    }

    #[test]
    fn cost_change_reconverges_to_new_shortest_path() {
        let mut g = graph(&[("A", "B", 1.0), ("B", "C", 1.0), ("A", "C", 5.0)]);
        let before = compute_spf(&g, "A");
        assert_eq!(before.next_hop["C"], "B");

        g.entry("A".to_string()).or_default().insert("C".to_string(), 0.5);
        g.entry("C".to_string()).or_default().insert("A".to_string(), 0.5);
        let after = compute_spf(&g, "A");
        assert_eq!(after.next_hop["C"], "C");
        assert_eq!(after.dist["C"], 0.5);
    }
}
