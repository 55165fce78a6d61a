use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use tracing::{warn, Level};
use tracing_subscriber::EnvFilter;

use irp::model::state::NeighborInfo;
use irp::runtime::config::{direct_neighbors, load_daemon_timers, load_names, load_topo, DaemonTimers, Proto};
use irp::runtime::node::Node;
use irp::runtime::transport::{PeerAddress, TcpLineTransport};

/// Routing daemon: parses the topology files, constructs the transport for
/// the chosen node, and runs the selected engine (LSR, DV, or flooding)
/// until interrupted.
#[derive(Debug, Parser)]
#[command(name = "routingd")]
#[command(about = "Routing overlay daemon (LSR / DV / flooding)")]
struct Cli {
    /// Routing engine to run.
    #[arg(long, default_value = "lsr")]
    proto: Proto,
    /// This process's node id (must appear in --names).
    #[arg(long)]
    id: String,
    /// Names file: `NODE_ID HOST PORT` per line.
    #[arg(long)]
    names: PathBuf,
    /// Topology file: `U V W` per line.
    #[arg(long)]
    topo: PathBuf,
    /// Optional YAML file overriding the default protocol timers.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    hello_every: Option<f64>,
    #[arg(long)]
    lsp_every: Option<f64>,
    #[arg(long)]
    dv_every: Option<f64>,
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

enum ExitReason {
    Config(anyhow::Error),
    Bind(anyhow::Error),
}

fn main() {
    let args = Cli::parse();
    if let Err(err) = init_logging(&args.log_level) {
        eprintln!("failed to initialize logging: {err:#}");
        std::process::exit(1);
    }

    match run(&args) {
        Ok(()) => {}
        Err(ExitReason::Config(err)) => {
            eprintln!("configuration error: {err:#}");
            std::process::exit(1);
        }
        Err(ExitReason::Bind(err)) => {
            eprintln!("transport cannot bind: {err:#}");
            std::process::exit(2);
        }
    }
}

fn run(args: &Cli) -> Result<(), ExitReason> {
    let names = load_names(&args.names).map_err(ExitReason::Config)?;
    let topo = load_topo(&args.topo).map_err(ExitReason::Config)?;

    let self_addr = names
        .get(&args.id)
        .ok_or_else(|| {
            ExitReason::Config(anyhow!(
                "unknown node id {:?}: not present in {}",
                args.id,
                args.names.display()
            ))
        })?
        .clone();

    let neighbor_links = direct_neighbors(&args.id, &names, &topo);
    if neighbor_links.is_empty() {
        warn!(node = args.id.as_str(), "node has no neighbors in topology");
    }

    let neighbors: Vec<NeighborInfo> = neighbor_links
        .iter()
        .map(|(id, (addr, cost))| NeighborInfo {
            id: id.clone(),
            address: addr.host.clone(),
            port: addr.port,
            cost: *cost,
            last_hello_at: None,
            is_up: false,
        })
        .collect();

    let peers: BTreeMap<String, PeerAddress> = neighbor_links
        .iter()
        .map(|(id, (addr, _))| (id.clone(), addr.clone()))
        .collect();

    let timers = resolve_timers(args).map_err(ExitReason::Config)?;

    let transport = TcpLineTransport::new(self_addr.port, peers);
    let node = Node::new(args.id.clone(), args.proto, neighbors, timers, Box::new(transport));
    node.start().map_err(ExitReason::Bind)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))
            .map_err(|err| ExitReason::Config(err.into()))?;
    }
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }
    node.stop();
    Ok(())
}

fn resolve_timers(args: &Cli) -> anyhow::Result<DaemonTimers> {
    let mut timers = load_daemon_timers(args.config.as_deref())?;
    if let Some(hello_every) = args.hello_every {
        timers.hello_every = hello_every;
        timers.hello_timeout = 3.0 * hello_every;
    }
    if let Some(lsp_every) = args.lsp_every {
        timers.lsp_every = lsp_every;
        timers.lsp_max_age = Some(3.0 * lsp_every);
    }
    if let Some(dv_every) = args.dv_every {
        timers.dv_every = dv_every;
    }
    Ok(timers)
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}
