use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::model::messages::{Frame, NodeId};
use crate::model::routing::RoutingTable;
use crate::model::state::{NeighborInfo, NeighborTable, SeenCache};
use crate::protocols::dv::DvEngine;
use crate::protocols::flooding::{FloodOutcome, FloodingEngine};
use crate::protocols::lsr::LsrEngine;
use crate::runtime::config::{DaemonTimers, Proto};
use crate::runtime::transport::Transport;

const TICK: Duration = Duration::from_millis(200);

/// One concrete protocol engine, chosen at construction time. The three
/// engines' outbound-message shapes differ enough (LSR needs flood +
/// recompute, DV needs per-neighbor vector broadcast, flooding needs
/// neither) that a single shared trait would only blur the seams; an enum
/// dispatch keeps each engine's actual contract visible.
enum Engine {
    Lsr(LsrEngine),
    Dv(DvEngine),
    Flooding(FloodingEngine),
}

struct NodeState {
    neighbors: NeighborTable,
    engine: Engine,
    data_seen: SeenCache,
    routing_table: RoutingTable,
    outstanding_hello: BTreeMap<String, (NodeId, f64)>,
}

struct NodeInner {
    self_id: NodeId,
    proto: Proto,
    transport: Mutex<Box<dyn Transport>>,
    state: Mutex<NodeState>,
    timers: DaemonTimers,
    running: Arc<AtomicBool>,
    epoch: Instant,
}

/// Orchestrator: wires the chosen engine, runs the periodic protocol timers,
/// dispatches inbound frames, and performs data forwarding. One instance per
/// running node; owns its `NeighborTable`, engine state, and `RoutingTable`
/// for its entire run.
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    pub fn new(
        self_id: NodeId,
        proto: Proto,
        neighbors: Vec<NeighborInfo>,
        timers: DaemonTimers,
        transport: Box<dyn Transport>,
    ) -> Self {
        let link_costs: BTreeMap<NodeId, f64> = neighbors
            .iter()
            .map(|n| (n.id.clone(), n.cost))
            .collect();

        let engine = match proto {
            Proto::Lsr => Engine::Lsr(LsrEngine::new(self_id.clone())),
            Proto::Dv => Engine::Dv(DvEngine::new(
                self_id.clone(),
                link_costs,
                timers.poison_reverse,
            )),
            Proto::Flooding => Engine::Flooding(FloodingEngine::new(
                self_id.clone(),
                timers.seen_ttl_s,
            )),
        };

        let state = NodeState {
            neighbors: NeighborTable::new(neighbors),
            engine,
            data_seen: SeenCache::new(timers.seen_ttl_s),
            routing_table: RoutingTable::default(),
            outstanding_hello: BTreeMap::new(),
        };

        let inner = Arc::new(NodeInner {
            self_id,
            proto,
            transport: Mutex::new(transport),
            state: Mutex::new(state),
            timers,
            running: Arc::new(AtomicBool::new(true)),
            epoch: Instant::now(),
        });

        Self { inner }
    }

    /// Registers the inbound callback with the transport, starts it,
    /// performs LSR's initial self-announce, and spawns the timer thread.
    /// Returns once startup is complete; the node keeps running on
    /// background threads until `stop()` is called.
    pub fn start(&self) -> Result<()> {
        let dispatch_inner = Arc::clone(&self.inner);
        let callback: Arc<dyn Fn(Frame) + Send + Sync> =
            Arc::new(move |frame| dispatch_inner.dispatch(frame));

        {
            let mut transport = self.inner.transport.lock().unwrap();
            transport.start(callback)?;
        }

        if self.inner.proto == Proto::Lsr {
            self.inner.reannounce_lsp();
        }

        let timer_inner = Arc::clone(&self.inner);
        thread::spawn(move || timer_inner.run_timers());

        info!(
            node = self.inner.self_id.as_str(),
            proto = self.inner.proto.as_str(),
            "node started"
        );
        Ok(())
    }

    /// Sets the stop flag; the timer thread observes it on its next tick and
    /// exits. Outstanding outbound sends may be abandoned; no frame is
    /// guaranteed in-flight delivery at shutdown.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Relaxed);
    }

    pub fn next_hop(&self, dst: &str) -> Option<NodeId> {
        self.inner
            .state
            .lock()
            .unwrap()
            .routing_table
            .next_hop(dst)
            .cloned()
    }

    pub fn cost(&self, dst: &str) -> Option<f64> {
        self.inner.state.lock().unwrap().routing_table.cost(dst)
    }
}

impl NodeInner {
    fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn send_to(&self, neighbor: &str, frame: &Frame) {
        self.transport.lock().unwrap().send_to(neighbor, frame);
    }

    fn flood(&self, frame: &Frame, except: Option<&str>) {
        self.transport.lock().unwrap().flood(frame, except);
    }

    fn run_timers(self: Arc<Self>) {
        let mut next_hello = self.now_secs();
        let mut next_lsp = self.now_secs() + self.timers.lsp_every;
        let mut next_dv = self.now_secs();

        while self.running.load(Ordering::Relaxed) {
            thread::sleep(TICK);
            let now = self.now_secs();

            if self.proto == Proto::Lsr && now >= next_hello {
                self.send_hellos();
                next_hello = now + self.timers.hello_every;
            }
            if self.proto == Proto::Lsr && now >= next_lsp {
                self.reannounce_lsp();
                next_lsp = now + self.timers.lsp_every;
            }
            if self.proto == Proto::Dv && now >= next_dv {
                self.advertise_vector();
                next_dv = now + self.timers.dv_every;
            }

            self.refresh_liveness(now);
            if let Some(max_age) = self.timers.lsp_max_age {
                self.age_out_lsdb(now, max_age);
            }
        }
    }

    fn refresh_liveness(&self, now: f64) {
        let mut state = self.state.lock().unwrap();
        state.neighbors.refresh_liveness(now, self.timers.hello_timeout);
    }

    fn age_out_lsdb(&self, now: f64, max_age: f64) {
        let mut state = self.state.lock().unwrap();
        if let Engine::Lsr(engine) = &mut state.engine {
            if engine.age_out(now, max_age) {
                rebuild_routing_table_from_lsr(&mut state.routing_table, &self.self_id, engine);
            }
        }
    }

    fn send_hellos(&self) {
        let now = self.now_secs();
        let neighbor_ids: Vec<NodeId> = {
            let mut state = self.state.lock().unwrap();
            let ids: Vec<NodeId> = state.neighbors.ids().cloned().collect();
            for id in &ids {
                let frame = Frame::hello(self.proto.as_str(), &self.self_id, id, now);
                let Frame::Hello { id: msg_id, .. } = &frame else {
                    unreachable!()
                };
                state
                    .outstanding_hello
                    .insert(msg_id.clone(), (id.clone(), now));
                drop(state);
                self.send_to(id, &frame);
                state = self.state.lock().unwrap();
            }
            ids
        };
        debug!(count = neighbor_ids.len(), "sent HELLO to neighbors");
    }

    fn reannounce_lsp(&self) {
        let now = self.now_secs();
        let mut state = self.state.lock().unwrap();
        let Engine::Lsr(engine) = &mut state.engine else {
            return;
        };
        let links = state.neighbors.links();
        let (seq, links) = engine.make_local_lsp(links);
        engine.ingest_lsp(self.self_id.clone(), seq, links.clone(), now);
        rebuild_routing_table_from_lsr(&mut state.routing_table, &self.self_id, engine);
        drop(state);

        let frame = Frame::info(self.proto.as_str(), lsp_payload(&self.self_id, seq, &links));
        self.flood(&frame, None);
        self.log_routing_table();
    }

    fn advertise_vector(&self) {
        let (neighbor_ids, vectors): (Vec<NodeId>, Vec<BTreeMap<NodeId, f64>>) = {
            let state = self.state.lock().unwrap();
            let Engine::Dv(engine) = &state.engine else {
                return;
            };
            let ids: Vec<NodeId> = state.neighbors.ids().cloned().collect();
            let vectors = ids.iter().map(|id| engine.vector_for_neighbor(id)).collect();
            (ids, vectors)
        };
        for (neighbor, dist) in neighbor_ids.iter().zip(vectors) {
            let frame = Frame::info(self.proto.as_str(), dv_payload(&self.self_id, &dist));
            self.send_to(neighbor, &frame);
        }
    }

    fn log_routing_table(&self) {
        let state = self.state.lock().unwrap();
        for (dst, entry) in state.routing_table.entries() {
            info!(
                node = self.self_id.as_str(),
                dst = dst.as_str(),
                via = entry.next_hop.as_str(),
                cost = entry.cost,
                "route"
            );
        }
    }

    fn dispatch(&self, frame: Frame) {
        if frame.proto() != self.proto.as_str() {
            debug!(got = frame.proto(), "drop frame for other protocol");
            return;
        }

        match frame {
            Frame::Hello { id, from, ts, .. } => self.handle_hello(id, from, ts),
            Frame::Echo { id, from, .. } => self.handle_echo(id, from),
            Frame::Info { payload, .. } => self.handle_info(payload),
            Frame::Data {
                id,
                src,
                dst,
                ttl,
                headers,
                payload,
                ..
            } => self.handle_data(id, src, dst, ttl, headers, payload),
        }
    }

    fn handle_hello(&self, id: String, from: NodeId, ts: f64) {
        let echo = Frame::echo(self.proto.as_str(), &self.self_id, &from, id, ts);
        self.send_to(&from, &echo);
    }

    fn handle_echo(&self, id: String, from: NodeId) {
        let now = self.now_secs();
        let mut state = self.state.lock().unwrap();
        if state.outstanding_hello.remove(&id).is_some() {
            state.neighbors.mark_seen(&from, now);
        }
    }

    fn handle_info(&self, payload: BTreeMap<String, Value>) {
        let now = self.now_secs();
        match self.proto {
            Proto::Lsr => {
                let Some((origin, seq, links)) = parse_lsp_payload(&payload) else {
                    debug!("drop malformed LSP payload");
                    return;
                };
                let mut state = self.state.lock().unwrap();
                let Engine::Lsr(engine) = &mut state.engine else {
                    return;
                };
                let installed = engine.ingest_lsp(origin.clone(), seq, links.clone(), now);
                if !installed {
                    return;
                }
                rebuild_routing_table_from_lsr(&mut state.routing_table, &self.self_id, engine);
                drop(state);

                let frame = Frame::info(self.proto.as_str(), lsp_payload(&origin, seq, &links));
                self.flood(&frame, None);
                self.log_routing_table();
            }
            Proto::Dv => {
                let Some((origin, dist)) = parse_dv_payload(&payload) else {
                    debug!("drop malformed DV payload");
                    return;
                };
                let mut state = self.state.lock().unwrap();
                let Engine::Dv(engine) = &mut state.engine else {
                    return;
                };
                let changed = engine.ingest_vector(origin, dist);
                if !changed {
                    return;
                }
                rebuild_routing_table_from_dv(&mut state.routing_table, &self.self_id, engine);
                drop(state);
                self.log_routing_table();
            }
            Proto::Flooding => {}
        }
    }

    fn handle_data(
        &self,
        id: String,
        src: NodeId,
        dst: NodeId,
        ttl: u32,
        headers: Vec<Value>,
        payload: Value,
    ) {
        let now = self.now_secs();

        if self.proto == Proto::Flooding {
            self.handle_flooding_data(id, src, dst, ttl, headers, payload, now);
            return;
        }

        let mut state = self.state.lock().unwrap();
        if state.data_seen.contains(&id, now) {
            return;
        }
        state.data_seen.add(&id, now);

        if dst == self.self_id {
            drop(state);
            info!(
                node = self.self_id.as_str(),
                from = src.as_str(),
                id = id.as_str(),
                trace = ?headers,
                "DELIVER DATA"
            );
            return;
        }

        if ttl == 0 {
            warn!(node = self.self_id.as_str(), id = id.as_str(), "DROP ttl=0");
            return;
        }

        let next_hop = match &state.engine {
            Engine::Lsr(engine) => engine.next_hop(&dst).cloned(),
            Engine::Dv(engine) => engine.next_hop(&dst).cloned(),
            Engine::Flooding(_) => None,
        };
        drop(state);

        let Some(next_hop) = next_hop else {
            warn!(
                node = self.self_id.as_str(),
                id = id.as_str(),
                dst = dst.as_str(),
                "DROP no-route"
            );
            return;
        };

        let mut headers = headers;
        headers.push(json!({"hop": self.self_id}));
        let forwarded = Frame::Data {
            id,
            proto: self.proto.as_str().to_string(),
            src,
            dst,
            ttl: ttl - 1,
            headers,
            payload,
        };
        self.send_to(&next_hop, &forwarded);
    }

    fn handle_flooding_data(
        &self,
        id: String,
        src: NodeId,
        dst: NodeId,
        ttl: u32,
        headers: Vec<Value>,
        payload: Value,
        now: f64,
    ) {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            let Engine::Flooding(engine) = &mut state.engine else {
                return;
            };
            engine.handle_data(&id, &dst, ttl, &headers, None, now)
        };

        match outcome {
            FloodOutcome::Duplicate => {}
            FloodOutcome::Delivered => {
                info!(
                    node = self.self_id.as_str(),
                    from = src.as_str(),
                    id = id.as_str(),
                    trace = ?headers,
                    "DELIVER DATA"
                );
            }
            FloodOutcome::TtlExhausted => {
                warn!(node = self.self_id.as_str(), id = id.as_str(), "DROP ttl=0");
            }
            FloodOutcome::Forward {
                ttl,
                headers,
                except,
            } => {
                let frame = Frame::Data {
                    id,
                    proto: self.proto.as_str().to_string(),
                    src,
                    dst,
                    ttl,
                    headers,
                    payload,
                };
                self.flood(&frame, except.as_deref());
            }
        }
    }
}

fn rebuild_routing_table_from_lsr(table: &mut RoutingTable, self_id: &str, engine: &LsrEngine) {
    let snapshot = engine.routing_snapshot();
    table.rebuild(self_id, &snapshot.dist, &snapshot.next_hop);
}

fn rebuild_routing_table_from_dv(table: &mut RoutingTable, self_id: &str, engine: &DvEngine) {
    table.rebuild(self_id, engine.dist_table(), engine.next_hop_table());
}

fn lsp_payload(origin: &str, seq: u64, links: &BTreeMap<NodeId, f64>) -> BTreeMap<String, Value> {
    let mut payload = BTreeMap::new();
    payload.insert("origin".to_string(), json!(origin));
    payload.insert("seq".to_string(), json!(seq));
    let links_json: Vec<Value> = links
        .iter()
        .map(|(to, w)| json!({"to": to, "w": w}))
        .collect();
    payload.insert("links".to_string(), Value::Array(links_json));
    payload
}

fn parse_lsp_payload(payload: &BTreeMap<String, Value>) -> Option<(NodeId, u64, BTreeMap<NodeId, f64>)> {
    let origin = payload.get("origin")?.as_str()?.to_string();
    let seq = payload.get("seq")?.as_u64()?;
    let links_value = payload.get("links")?.as_array()?;
    let mut links = BTreeMap::new();
    for entry in links_value {
        let to = entry.get("to")?.as_str()?.to_string();
        let w = entry.get("w")?.as_f64()?;
        links.insert(to, w);
    }
    Some((origin, seq, links))
}

fn dv_payload(origin: &str, dist: &BTreeMap<NodeId, f64>) -> BTreeMap<String, Value> {
    let mut payload = BTreeMap::new();
    payload.insert("origin".to_string(), json!(origin));
    let dist_map: Map<String, Value> = dist
        .iter()
        .map(|(dst, cost)| (dst.clone(), json!(cost)))
        .collect();
    payload.insert("dist".to_string(), Value::Object(dist_map));
    payload
}

fn parse_dv_payload(payload: &BTreeMap<String, Value>) -> Option<(NodeId, BTreeMap<NodeId, f64>)> {
    let origin = payload.get("origin")?.as_str()?.to_string();
    let dist_obj = payload.get("dist")?.as_object()?;
    let mut dist = BTreeMap::new();
    for (dst, cost) in dist_obj {
        dist.insert(dst.clone(), cost.as_f64()?);
    }
    Some((origin, dist))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsp_payload_roundtrips() {
        let links: BTreeMap<NodeId, f64> = [("B".to_string(), 1.5)].into_iter().collect();
        let payload = lsp_payload("A", 3, &links);
        let (origin, seq, parsed_links) = parse_lsp_payload(&payload).expect("parse");
        assert_eq!(origin, "A");
        assert_eq!(seq, 3);
        assert_eq!(parsed_links, links);
    }

    #[test]
    fn dv_payload_roundtrips() {
        let dist: BTreeMap<NodeId, f64> = [("A".to_string(), 0.0), ("B".to_string(), 1.0)]
            .into_iter()
            .collect();
        let payload = dv_payload("A", &dist);
        let (origin, parsed_dist) = parse_dv_payload(&payload).expect("parse");
        assert_eq!(origin, "A");
        assert_eq!(parsed_dist, dist);
    }

    #[test]
    fn parse_lsp_payload_rejects_missing_fields() {
        let mut payload = BTreeMap::new();
        payload.insert("origin".to_string(), json!("A"));
        assert!(parse_lsp_payload(&payload).is_none());
    }
}
