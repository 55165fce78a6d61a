use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::model::messages::NodeId;
use crate::runtime::transport::PeerAddress;

/// *names file*: `NODE_ID HOST PORT` per line, `#` comments, blank lines
/// skipped. Maps every node in the deployment to its transport endpoint.
pub fn load_names(path: &Path) -> Result<BTreeMap<NodeId, PeerAddress>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read names file {}", path.display()))?;

    let mut names = BTreeMap::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [id, host, port] = fields[..] else {
            bail!("{}:{}: expected `NODE_ID HOST PORT`", path.display(), lineno + 1);
        };
        let port: u16 = port
            .parse()
            .with_context(|| format!("{}:{}: invalid port {port}", path.display(), lineno + 1))?;
        names.insert(
            id.to_string(),
            PeerAddress {
                host: host.to_string(),
                port,
            },
        );
    }
    Ok(names)
}

/// *topology file*: `U V W` per line, undirected edge with weight `W`. Both
/// endpoints learn each other as neighbors with cost `W`.
pub fn load_topo(path: &Path) -> Result<BTreeMap<NodeId, BTreeMap<NodeId, f64>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read topology file {}", path.display()))?;

    let mut graph: BTreeMap<NodeId, BTreeMap<NodeId, f64>> = BTreeMap::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [u, v, w] = fields[..] else {
            bail!("{}:{}: expected `U V W`", path.display(), lineno + 1);
        };
        let w: f64 = w
            .parse()
            .with_context(|| format!("{}:{}: invalid weight {w}", path.display(), lineno + 1))?;
        graph.entry(u.to_string()).or_default().insert(v.to_string(), w);
        graph.entry(v.to_string()).or_default().insert(u.to_string(), w);
    }
    Ok(graph)
}

/// Direct neighbors of `self_id` as seen from the topology file, joined with
/// their transport endpoints from the names file. Costs default to `1.0` if
/// the topology file supplies no weight for an otherwise-named neighbor.
pub fn direct_neighbors(
    self_id: &str,
    names: &BTreeMap<NodeId, PeerAddress>,
    topo: &BTreeMap<NodeId, BTreeMap<NodeId, f64>>,
) -> BTreeMap<NodeId, (PeerAddress, f64)> {
    let Some(links) = topo.get(self_id) else {
        return BTreeMap::new();
    };
    links
        .iter()
        .filter_map(|(neighbor, cost)| {
            names
                .get(neighbor)
                .map(|addr| (neighbor.clone(), (addr.clone(), *cost)))
        })
        .collect()
}

/// Routing protocol selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    Lsr,
    Dv,
    Flooding,
}

impl Proto {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proto::Lsr => "lsr",
            Proto::Dv => "dv",
            Proto::Flooding => "flooding",
        }
    }
}

impl std::str::FromStr for Proto {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lsr" => Ok(Proto::Lsr),
            "dv" => Ok(Proto::Dv),
            "flooding" => Ok(Proto::Flooding),
            other => bail!("unknown protocol {other:?}, expected lsr|dv|flooding"),
        }
    }
}

/// Daemon-wide timer/behavior knobs. Every field has the default named in the
/// spec; an optional YAML file can override them for a long-running daemon,
/// grounded in the teacher's `load_daemon_config` YAML-with-defaults idiom.
#[derive(Debug, Clone, Copy)]
pub struct DaemonTimers {
    pub hello_every: f64,
    pub lsp_every: f64,
    pub dv_every: f64,
    pub hello_timeout: f64,
    pub lsp_max_age: Option<f64>,
    pub seen_ttl_s: f64,
    pub poison_reverse: bool,
}

impl Default for DaemonTimers {
    fn default() -> Self {
        let hello_every = 5.0;
        let lsp_every = 20.0;
        Self {
            hello_every,
            lsp_every,
            dv_every: 10.0,
            hello_timeout: 3.0 * hello_every,
            lsp_max_age: Some(3.0 * lsp_every),
            seen_ttl_s: 120.0,
            poison_reverse: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawDaemonTimers {
    hello_every: Option<f64>,
    lsp_every: Option<f64>,
    dv_every: Option<f64>,
    hello_timeout: Option<f64>,
    lsp_max_age: Option<f64>,
    seen_ttl_s: Option<f64>,
    poison_reverse: Option<bool>,
}

/// Loads timer overrides from an optional YAML file; a missing path is not
/// an error, it just means "use the spec defaults".
pub fn load_daemon_timers(path: Option<&Path>) -> Result<DaemonTimers> {
    let Some(path) = path else {
        return Ok(DaemonTimers::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read daemon config {}", path.display()))?;
    let raw: RawDaemonTimers =
        serde_yaml::from_str(&text).context("failed to parse daemon config yaml")?;

    let defaults = DaemonTimers::default();
    let hello_every = raw.hello_every.unwrap_or(defaults.hello_every);
    let lsp_every = raw.lsp_every.unwrap_or(defaults.lsp_every);
    Ok(DaemonTimers {
        hello_every,
        lsp_every,
        dv_every: raw.dv_every.unwrap_or(defaults.dv_every),
        hello_timeout: raw.hello_timeout.unwrap_or(3.0 * hello_every),
        lsp_max_age: raw.lsp_max_age.or(Some(3.0 * lsp_every)),
        seen_ttl_s: raw.seen_ttl_s.unwrap_or(defaults.seen_ttl_s),
        poison_reverse: raw.poison_reverse.unwrap_or(defaults.poison_reverse),
    })
}
