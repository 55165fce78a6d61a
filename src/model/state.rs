use std::collections::BTreeMap;

use crate::model::messages::NodeId;

#[derive(Debug, Clone)]
pub struct NeighborInfo {
    pub id: NodeId,
    pub address: String,
    pub port: u16,
    pub cost: f64,
    pub last_hello_at: Option<f64>,
    pub is_up: bool,
}

/// Direct neighbors: link costs, last-HELLO timestamp, liveness. A neighbor
/// never HELLO-ed is not-yet-proven-alive (`is_up` starts false).
#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: BTreeMap<NodeId, NeighborInfo>,
}

impl NeighborTable {
    pub fn new(neighbors: Vec<NeighborInfo>) -> Self {
        let neighbors = neighbors
            .into_iter()
            .map(|neighbor| (neighbor.id.clone(), neighbor))
            .collect();
        Self { neighbors }
    }

    /// Marks `id` as seen at `now`; returns true iff it transitioned down->up.
    pub fn mark_seen(&mut self, id: &str, now: f64) -> bool {
        let Some(neighbor) = self.neighbors.get_mut(id) else {
            return false;
        };
        let was_up = neighbor.is_up;
        neighbor.last_hello_at = Some(now);
        neighbor.is_up = true;
        !was_up
    }

    pub fn touch_hello(&mut self, id: &str, now: f64) {
        if let Some(neighbor) = self.neighbors.get_mut(id) {
            neighbor.last_hello_at = Some(now);
        }
    }

    /// Re-evaluates liveness against `hello_timeout`; returns ids whose
    /// `is_up` flipped.
    pub fn refresh_liveness(&mut self, now: f64, hello_timeout: f64) -> Vec<NodeId> {
        let mut changed = Vec::new();
        for (id, neighbor) in &mut self.neighbors {
            let Some(last_hello_at) = neighbor.last_hello_at else {
                continue;
            };
            let alive = (now - last_hello_at) <= hello_timeout;
            if alive != neighbor.is_up {
                neighbor.is_up = alive;
                changed.push(id.clone());
            }
        }
        changed
    }

    pub fn dead_neighbors(&self, now: f64, hello_timeout: f64) -> Vec<NodeId> {
        self.neighbors
            .values()
            .filter(|neighbor| {
                neighbor
                    .last_hello_at
                    .is_some_and(|ts| (now - ts) > hello_timeout)
            })
            .map(|neighbor| neighbor.id.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&NeighborInfo> {
        self.neighbors.get(id)
    }

    pub fn cost_of(&self, id: &str) -> Option<f64> {
        self.neighbors.get(id).map(|neighbor| neighbor.cost)
    }

    pub fn set_cost(&mut self, id: &str, cost: f64) {
        if let Some(neighbor) = self.neighbors.get_mut(id) {
            neighbor.cost = cost;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NeighborInfo)> {
        self.neighbors.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.neighbors.keys()
    }

    pub fn links(&self) -> BTreeMap<NodeId, f64> {
        self.neighbors
            .iter()
            .map(|(id, neighbor)| (id.clone(), neighbor.cost))
            .collect()
    }
}

/// Id-keyed dedup cache with TTL expiry, used for both control frames (INFO)
/// and DATA so neither grows an unbounded seen-set over a long-running node.
#[derive(Debug)]
pub struct SeenCache {
    ttl_s: f64,
    expiry: BTreeMap<String, f64>,
}

impl SeenCache {
    pub fn new(ttl_s: f64) -> Self {
        Self {
            ttl_s,
            expiry: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, id: &str, now: f64) {
        self.expiry.insert(id.to_string(), now + self.ttl_s);
    }

    /// Returns true iff `id` is present and not expired; lazily evicts it
    /// from the cache if it has expired.
    pub fn contains(&mut self, id: &str, now: f64) -> bool {
        match self.expiry.get(id) {
            Some(&expires_at) if expires_at >= now => true,
            Some(_) => {
                self.expiry.remove(id);
                false
            }
            None => false,
        }
    }

    pub fn purge(&mut self, now: f64) {
        self.expiry.retain(|_, expires_at| *expires_at >= now);
    }

    pub fn len(&self) -> usize {
        self.expiry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(id: &str, cost: f64) -> NeighborInfo {
        NeighborInfo {
            id: id.to_string(),
            address: "127.0.0.1".to_string(),
            port: 5000,
            cost,
            last_hello_at: None,
            is_up: false,
        }
    }

    #[test]
    fn mark_seen_reports_transition_to_up_once() {
        let mut table = NeighborTable::new(vec![neighbor("B", 1.0)]);
        assert!(table.mark_seen("B", 1.0));
        assert!(!table.mark_seen("B", 2.0));
        assert!(table.get("B").unwrap().is_up);
    }

    #[test]
    fn refresh_liveness_flips_down_after_timeout() {
        let mut table = NeighborTable::new(vec![neighbor("B", 1.0)]);
        table.mark_seen("B", 0.0);
        let changed = table.refresh_liveness(10.0, 3.0);
        assert_eq!(changed, vec!["B".to_string()]);
        assert!(!table.get("B").unwrap().is_up);
    }

    #[test]
    fn seen_cache_deduplicates_until_ttl_expires() {
        let mut cache = SeenCache::new(10.0);
        assert!(!cache.contains("m1", 0.0));
        cache.add("m1", 0.0);
        assert!(cache.contains("m1", 5.0));
        assert!(!cache.contains("m1", 11.0));
    }

    #[test]
    fn seen_cache_purge_drops_expired_entries() {
        let mut cache = SeenCache::new(5.0);
        cache.add("old", 0.0);
        cache.add("fresh", 10.0);
        cache.purge(12.0);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("fresh", 12.0));
    }
}
