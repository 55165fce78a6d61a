use serde_json::{json, Value};

use crate::model::messages::NodeId;
use crate::model::state::SeenCache;

/// Outcome of handing a DATA frame to the flooding engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FloodOutcome {
    /// Already seen; nothing to do.
    Duplicate,
    /// Delivered locally (`dst == self`).
    Delivered,
    /// TTL reached zero before delivery; never forwarded.
    TtlExhausted,
    /// Forward to every neighbor except `except` (the frame it arrived
    /// from), with `ttl` decremented and a hop annotation appended.
    Forward {
        ttl: u32,
        headers: Vec<Value>,
        except: Option<NodeId>,
    },
}

/// Controlled flood of DATA frames: id-deduplicated via a TTL `SeenCache`,
/// with TTL enforcement. The reference implementation this is grounded in
/// never consults TTL at all (spec-flagged as a bug); this build decrements
/// and enforces it exactly like the LSR/DV forwarder.
pub struct FloodingEngine {
    self_id: NodeId,
    seen: SeenCache,
}

impl FloodingEngine {
    pub fn new(self_id: NodeId, seen_ttl_s: f64) -> Self {
        Self {
            self_id,
            seen: SeenCache::new(seen_ttl_s),
        }
    }

    /// `dst`/`ttl`/`headers` are read from the inbound DATA frame; `from` is
    /// the neighbor it arrived from, if known (used to avoid re-sending it
    /// straight back).
    pub fn handle_data(
        &mut self,
        id: &str,
        dst: &str,
        ttl: u32,
        headers: &[Value],
        from: Option<&str>,
        now: f64,
    ) -> FloodOutcome {
        if self.seen.contains(id, now) {
            return FloodOutcome::Duplicate;
        }
        self.seen.add(id, now);

        if dst == self.self_id {
            return FloodOutcome::Delivered;
        }

        if ttl == 0 {
            return FloodOutcome::TtlExhausted;
        }

        let mut headers = headers.to_vec();
        headers.push(json!({"hop": self.self_id, "ts": now}));

        FloodOutcome::Forward {
            ttl: ttl - 1,
            headers,
            except: from.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_data_is_dropped() {
        let mut engine = FloodingEngine::new("C".into(), 120.0);
        assert_eq!(
            engine.handle_data("m1", "B", 8, &[], Some("A"), 0.0),
            FloodOutcome::Forward {
                ttl: 7,
                headers: vec![json!({"hop": "C", "ts": 0.0})],
                except: Some("A".into()),
            }
        );
        assert_eq!(
            engine.handle_data("m1", "B", 8, &[], Some("A"), 1.0),
            FloodOutcome::Duplicate
        );
    }

    #[test]
    fn data_addressed_to_self_is_delivered_not_forwarded() {
        let mut engine = FloodingEngine::new("C".into(), 120.0);
        assert_eq!(
            engine.handle_data("m1", "C", 8, &[], Some("A"), 0.0),
            FloodOutcome::Delivered
        );
    }

    #[test]
    fn ttl_exhaustion_prevents_forwarding() {
        let mut engine = FloodingEngine::new("B".into(), 120.0);
        assert_eq!(
            engine.handle_data("m1", "Z", 0, &[], Some("A"), 0.0),
            FloodOutcome::TtlExhausted
        );
    }

    #[test]
    fn forward_appends_hop_header_and_decrements_ttl() {
        let mut engine = FloodingEngine::new("B".into(), 120.0);
        let outcome = engine.handle_data("m1", "Z", 3, &[json!({"hop": "A"})], Some("A"), 5.0);
        match outcome {
            FloodOutcome::Forward {
                ttl,
                headers,
                except,
            } => {
                assert_eq!(ttl, 2);
                assert_eq!(headers.len(), 2);
                assert_eq!(except, Some("A".to_string()));
            }
            other => panic!("expected Forward, got {other:?}"),
        }
    }
}
