//! JSON codec for route-table snapshots.
//!
//! ```json
//! {
//!   "version": 1,
//!   "nodes": [
//!     {"kuid": "80000000000000000000000000000000000000ff",
//!      "vendor": [71, 84, 75, 71], "version": {"major": 0, "minor": 1},
//!      "addr": "192.168.1.7:6346", "last_seen": 1700000000}
//!   ]
//! }
//! ```
//!
//! Records that fail to decode are skipped one by one; only a broken
//! envelope fails the whole load.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{SnapshotError, SnapshotRecord};

/// Envelope version written by this codec.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    nodes: &'a [SnapshotRecord],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
}

pub fn snapshot_to_json(records: &[SnapshotRecord]) -> Result<String, SnapshotError> {
    let envelope = EnvelopeRef {
        version: SNAPSHOT_VERSION,
        nodes: records,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

pub fn snapshot_from_json(json: &str) -> Result<Vec<SnapshotRecord>, SnapshotError> {
    let envelope: Envelope = serde_json::from_str(json)?;
    decode_envelope(envelope)
}

pub fn write_snapshot<W: Write>(writer: W, records: &[SnapshotRecord]) -> Result<(), SnapshotError> {
    let envelope = EnvelopeRef {
        version: SNAPSHOT_VERSION,
        nodes: records,
    };
    serde_json::to_writer_pretty(writer, &envelope)?;
    Ok(())
}

pub fn read_snapshot<R: Read>(reader: R) -> Result<Vec<SnapshotRecord>, SnapshotError> {
    let envelope: Envelope = serde_json::from_reader(reader)?;
    decode_envelope(envelope)
}

fn decode_envelope(envelope: Envelope) -> Result<Vec<SnapshotRecord>, SnapshotError> {
    if envelope.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: envelope.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let total = envelope.nodes.len();
    let records: Vec<SnapshotRecord> = envelope
        .nodes
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, %err, "skipping malformed snapshot record");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(kept = records.len(), total, "snapshot partially decoded");
    }
    Ok(records)
}
