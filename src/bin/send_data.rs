use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use irp::model::messages::{encode_message, Frame};

/// Standalone data-sender: builds one DATA frame and writes it as a single
/// line to `HOST:PORT`. Grounded in `original_source/send_data.py`.
#[derive(Debug, Parser)]
#[command(name = "send_data")]
#[command(about = "Send a single DATA frame to a routingd instance")]
struct Args {
    host: String,
    port: u16,
    src: String,
    dst: String,
    proto: String,
    /// Remaining words are joined with a single space as the payload.
    #[arg(trailing_var_arg = true)]
    payload: Vec<String>,
}

const DEFAULT_TTL: u32 = 8;

fn main() -> Result<()> {
    let args = Args::parse();
    let payload_text = args.payload.join(" ");
    let frame = Frame::data(
        &args.proto.to_lowercase(),
        &args.src,
        &args.dst,
        DEFAULT_TTL,
        serde_json::Value::String(payload_text),
    );
    let Frame::Data { id, .. } = &frame else {
        unreachable!("Frame::data always returns a Data frame")
    };
    let id = id.clone();

    let mut line = encode_message(&frame)?;
    line.push(b'\n');

    let addr = (args.host.as_str(), args.port)
        .to_socket_addrs()
        .context("failed to resolve host:port")?
        .next()
        .context("no address resolved for host:port")?;
    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_secs(2))
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;
    stream
        .write_all(&line)
        .context("failed to write DATA frame")?;

    println!(
        "OK sent {id} from {} to {} via {}",
        args.src,
        args.dst,
        args.proto.to_uppercase()
    );
    Ok(())
}
