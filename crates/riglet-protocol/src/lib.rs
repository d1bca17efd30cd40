//! riglet-protocol: Command socket client for the miner daemon
//!
//! This crate provides the protocol layer between riglet and the daemon:
//! - Wire message types (requests, response envelopes, list records)
//! - A correlated request/response client over a local TCP socket

pub mod client;
pub mod message;

pub use client::ApiClient;
pub use message::{AlgorithmRecord, Request, ResponseEnvelope, WorkerAlgorithm, WorkerRecord};
