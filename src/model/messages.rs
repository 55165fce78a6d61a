use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type NodeId = String;

/// Wire frame. One variant per `type` field, carrying exactly the fields that
/// type requires; `proto` selects which routing engine the frame belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frame {
    Hello {
        id: String,
        proto: String,
        from: NodeId,
        to: NodeId,
        ts: f64,
    },
    Echo {
        id: String,
        proto: String,
        from: NodeId,
        to: NodeId,
        ts: f64,
    },
    Info {
        proto: String,
        #[serde(default)]
        payload: BTreeMap<String, Value>,
    },
    Data {
        id: String,
        proto: String,
        src: NodeId,
        dst: NodeId,
        #[serde(default = "default_ttl")]
        ttl: u32,
        #[serde(default)]
        headers: Vec<Value>,
        payload: Value,
    },
}

fn default_ttl() -> u32 {
    8
}

impl Frame {
    pub fn proto(&self) -> &str {
        match self {
            Frame::Hello { proto, .. }
            | Frame::Echo { proto, .. }
            | Frame::Info { proto, .. }
            | Frame::Data { proto, .. } => proto,
        }
    }

    pub fn hello(proto: &str, from: &str, to: &str, ts: f64) -> Self {
        Frame::Hello {
            id: Uuid::new_v4().to_string(),
            proto: proto.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            ts,
        }
    }

    pub fn echo(proto: &str, from: &str, to: &str, hello_id: String, ts: f64) -> Self {
        Frame::Echo {
            id: hello_id,
            proto: proto.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            ts,
        }
    }

    pub fn info(proto: &str, payload: BTreeMap<String, Value>) -> Self {
        Frame::Info {
            proto: proto.to_string(),
            payload,
        }
    }

    pub fn data(proto: &str, src: &str, dst: &str, ttl: u32, payload: Value) -> Self {
        Frame::Data {
            id: Uuid::new_v4().to_string(),
            proto: proto.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            ttl,
            headers: Vec::new(),
            payload,
        }
    }
}

/// Encode one frame as JSON bytes; the transport appends the line separator.
pub fn encode_message(frame: &Frame) -> Result<Vec<u8>> {
    serde_json::to_vec(frame).context("failed to encode frame")
}

/// Decode a single line. Malformed input is never fatal to the caller: this
/// returns `Err` and the read loop logs at `debug!` and keeps reading.
pub fn decode_message(line: &[u8]) -> Result<Frame> {
    serde_json::from_slice(line).context("failed to decode frame")
}
