//! Wire messages for the daemon command protocol
//!
//! Commands are newline-delimited JSON objects. Each request carries a
//! client-chosen `id`; the daemon echoes it in exactly one response whose
//! `error` field is null on success and a reason string on rejection.
//! Payload fields sit alongside `id`/`error` in the same object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single command sent to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed by the daemon
    pub id: u64,
    /// Method name, e.g. "worker.add"
    pub method: String,
    /// Ordered argument list
    pub params: Vec<String>,
}

/// Response envelope with the payload fields flattened alongside
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation id of the request this answers
    pub id: u64,
    /// Rejection reason, null on success
    #[serde(default)]
    pub error: Option<String>,
    /// Remaining payload fields
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl ResponseEnvelope {
    /// Decode the payload fields into the caller's expected shape
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.payload))
    }
}

/// Reply payload of `worker.add`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerAdded {
    /// Id of the newly created worker
    pub worker_id: u64,
}

/// One worker as reported by `worker.list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Daemon-assigned worker id
    pub worker_id: u64,
    /// Device the worker is bound to
    pub device_uuid: String,
    /// Algorithms the worker is running, with current speeds
    #[serde(default)]
    pub algorithms: Vec<WorkerAlgorithm>,
}

/// An algorithm running on a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAlgorithm {
    /// Sub-algorithm name
    pub name: String,
    /// Current hash rate
    #[serde(default)]
    pub speed: f64,
}

/// Reply payload of `worker.list`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerList {
    pub workers: Vec<WorkerRecord>,
}

/// One algorithm as reported by `algorithm.list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmRecord {
    /// Sub-algorithm name
    pub name: String,
    /// Aggregate hash rate across workers
    #[serde(default)]
    pub speed: f64,
}

/// Reply payload of `algorithm.list`
#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmList {
    pub algorithms: Vec<AlgorithmRecord>,
}
