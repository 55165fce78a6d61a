use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::model::messages::{decode_message, encode_message, Frame, NodeId};

/// Abstract delivery contract the routing core depends on. The core never
/// inspects frame content beyond framing, so either realization below can
/// stand in for the other without the core noticing.
pub trait Transport: Send {
    /// Begin accepting inbound frames on a background thread; each decoded
    /// frame is delivered exactly once to `on_message`. Malformed lines are
    /// logged and skipped, never fatal to the reader.
    fn start(&mut self, on_message: Arc<dyn Fn(Frame) + Send + Sync>) -> Result<()>;

    /// Best-effort unicast to a named direct neighbor. Failure is swallowed:
    /// the protocol layer tolerates loss by retransmission, not retries here.
    fn send_to(&self, neighbor: &str, frame: &Frame);

    /// Deliver `frame` to every neighbor except `except`, if given.
    fn flood(&self, frame: &Frame, except: Option<&str>);
}

const CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

/// Stream transport: a short-lived TCP connection per send, and a persistent
/// accept loop that reads newline-delimited frames off each inbound
/// connection on its own thread. Grounded in
/// `original_source/src/core/transport_socket.py::SocketTransport`.
pub struct TcpLineTransport {
    bind_port: u16,
    peers: Arc<std::collections::BTreeMap<NodeId, PeerAddress>>,
}

impl TcpLineTransport {
    pub fn new(bind_port: u16, peers: std::collections::BTreeMap<NodeId, PeerAddress>) -> Self {
        Self {
            bind_port,
            peers: Arc::new(peers),
        }
    }
}

impl Transport for TcpLineTransport {
    fn start(&mut self, on_message: Arc<dyn Fn(Frame) + Send + Sync>) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.bind_port)).with_context(|| {
            format!("failed to bind transport listener on port {}", self.bind_port)
        })?;

        thread::spawn(move || loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    let on_message = Arc::clone(&on_message);
                    thread::spawn(move || handle_connection(stream, &on_message));
                }
                Err(err) => {
                    warn!("transport accept error: {err}");
                    thread::sleep(Duration::from_millis(100));
                }
            }
        });
        Ok(())
    }

    fn send_to(&self, neighbor: &str, frame: &Frame) {
        let Some(peer) = self.peers.get(neighbor) else {
            debug!("send_to unknown neighbor {neighbor}, dropping");
            return;
        };
        if let Err(err) = send_line(&peer.host, peer.port, frame) {
            debug!("send_to {neighbor} failed: {err}");
        }
    }

    fn flood(&self, frame: &Frame, except: Option<&str>) {
        for (neighbor, peer) in self.peers.iter() {
            if Some(neighbor.as_str()) == except {
                continue;
            }
            if let Err(err) = send_line(&peer.host, peer.port, frame) {
                debug!("flood to {neighbor} failed: {err}");
            }
        }
    }
}

fn handle_connection(stream: TcpStream, on_message: &Arc<dyn Fn(Frame) + Send + Sync>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { return };
        if line.trim().is_empty() {
            continue;
        }
        match decode_message(line.as_bytes()) {
            Ok(frame) => on_message(frame),
            Err(err) => debug!("drop malformed frame: {err}"),
        }
    }
}

fn send_line(host: &str, port: u16, frame: &Frame) -> Result<()> {
    let mut payload = encode_message(frame)?;
    payload.push(b'\n');
    let addr = (host, port)
        .to_socket_addrs()
        .context("dns resolution failed")?
        .next()
        .context("no address resolved")?;
    let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).context("connect failed")?;
    stream.set_write_timeout(Some(CONNECT_TIMEOUT)).ok();
    stream.write_all(&payload).context("write failed")?;
    Ok(())
}

/// Pub/sub transport: each node subscribes to `{section}.{topo}.{self}` and
/// publishes to `{section}.{topo}.{peer}`, matching `original_source/app.py`'s
/// `redis.Redis`/`pubsub()` usage. The core behaves identically over either
/// realization; this one trades a bound listen port for a shared broker.
pub struct RedisPubSubTransport {
    client: redis::Client,
    section: String,
    topo: String,
    self_id: NodeId,
    peer_ids: Vec<NodeId>,
}

impl RedisPubSubTransport {
    pub fn new(
        redis_url: &str,
        section: String,
        topo: String,
        self_id: NodeId,
        peer_ids: Vec<NodeId>,
    ) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("failed to build redis client")?;
        Ok(Self {
            client,
            section,
            topo,
            self_id,
            peer_ids,
        })
    }

    fn channel(&self, node: &str) -> String {
        format!("{}.{}.{}", self.section, self.topo, node)
    }

    fn publish(&self, neighbor: &str, frame: &Frame) -> Result<()> {
        let mut conn = self
            .client
            .get_connection()
            .context("redis connect failed")?;
        let payload = String::from_utf8(encode_message(frame)?).context("frame not utf8")?;
        redis::cmd("PUBLISH")
            .arg(self.channel(neighbor))
            .arg(payload)
            .query::<i64>(&mut conn)
            .context("redis publish failed")?;
        Ok(())
    }
}

impl Transport for RedisPubSubTransport {
    fn start(&mut self, on_message: Arc<dyn Fn(Frame) + Send + Sync>) -> Result<()> {
        let client = self.client.clone();
        let channel = self.channel(&self.self_id);

        thread::spawn(move || loop {
            let attempt = (|| -> Result<()> {
                let mut conn = client.get_connection().context("redis connect failed")?;
                let mut pubsub = conn.as_pubsub();
                pubsub
                    .subscribe(&channel)
                    .context("redis subscribe failed")?;
                loop {
                    let msg = pubsub.get_message().context("redis get_message failed")?;
                    let payload: String =
                        msg.get_payload().context("redis payload decode failed")?;
                    match decode_message(payload.as_bytes()) {
                        Ok(frame) => on_message(frame),
                        Err(err) => debug!("drop malformed frame: {err}"),
                    }
                }
            })();
            if let Err(err) = attempt {
                warn!("redis subscriber loop ended, retrying: {err}");
                thread::sleep(Duration::from_secs(1));
            }
        });
        Ok(())
    }

    fn send_to(&self, neighbor: &str, frame: &Frame) {
        if let Err(err) = self.publish(neighbor, frame) {
            debug!("send_to {neighbor} failed: {err}");
        }
    }

    fn flood(&self, frame: &Frame, except: Option<&str>) {
        for neighbor in &self.peer_ids {
            if Some(neighbor.as_str()) == except {
                continue;
            }
            if let Err(err) = self.publish(neighbor, frame) {
                debug!("flood to {neighbor} failed: {err}");
            }
        }
    }
}
