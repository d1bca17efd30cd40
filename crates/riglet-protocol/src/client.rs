//! Correlated request/response client for the daemon command socket
//!
//! The daemon processes commands on one connection strictly in order, one
//! response per request, so the client holds the connection for the full
//! write/read exchange and never has more than one command outstanding.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use riglet_core::{RigletError, RigletResult};

use crate::message::{
    AlgorithmList, AlgorithmRecord, Request, ResponseEnvelope, WorkerAdded, WorkerList,
    WorkerRecord,
};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

/// Client for the miner daemon's command socket
///
/// Performs at-most-once delivery with synchronous correlation; it never
/// retries. Connection-level failures poison the connection, and later
/// calls fail fast with [`RigletError::NotConnected`] until a fresh
/// [`ApiClient::connect`].
pub struct ApiClient {
    command_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl ApiClient {
    /// Create a client with the given per-command response timeout
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            command_timeout,
            conn: Mutex::new(None),
        }
    }

    /// Establish the connection to the daemon's command socket
    pub async fn connect(&self, addr: SocketAddr) -> RigletResult<()> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| RigletError::Connection(format!("connect to {} failed: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();

        let mut conn = self.conn.lock().await;
        *conn = Some(Connection {
            reader: BufReader::new(read),
            writer: write,
            next_id: 1,
        });

        debug!(addr = %addr, "Connected to miner daemon");
        Ok(())
    }

    /// Drop the connection, if any
    pub async fn disconnect(&self) {
        *self.conn.lock().await = None;
    }

    /// Whether a usable connection is currently held
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Send one named command with an ordered argument list and wait for
    /// its correlated response
    pub async fn send_command(
        &self,
        method: &str,
        params: &[String],
    ) -> RigletResult<ResponseEnvelope> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(RigletError::NotConnected)?;

        let id = conn.next_id;
        conn.next_id += 1;

        let request = Request {
            id,
            method: method.to_string(),
            params: params.to_vec(),
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        debug!(method = method, id = id, "Sending command");

        match Self::exchange(conn, &line, self.command_timeout, method).await {
            Ok(mut envelope) => {
                if envelope.id != id {
                    // Correlation broken; nothing further on this
                    // connection can be matched to its request.
                    *guard = None;
                    return Err(RigletError::Protocol(format!(
                        "response id {} does not match request id {}",
                        envelope.id, id
                    )));
                }
                if let Some(reason) = envelope.error.take() {
                    return Err(RigletError::Remote {
                        method: method.to_string(),
                        reason,
                    });
                }
                Ok(envelope)
            }
            Err(e) => {
                warn!(method = method, error = %e, "Command failed");
                if e.is_connection_failure() || matches!(e, RigletError::Protocol(_)) {
                    *guard = None;
                }
                Err(e)
            }
        }
    }

    async fn exchange(
        conn: &mut Connection,
        line: &str,
        timeout: Duration,
        method: &str,
    ) -> RigletResult<ResponseEnvelope> {
        conn.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RigletError::Connection(format!("write failed: {}", e)))?;
        conn.writer
            .flush()
            .await
            .map_err(|e| RigletError::Connection(format!("flush failed: {}", e)))?;

        let mut response = String::new();
        let read = tokio::time::timeout(timeout, conn.reader.read_line(&mut response))
            .await
            .map_err(|_| RigletError::Timeout {
                method: method.to_string(),
            })?;
        let n = read.map_err(|e| RigletError::Connection(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(RigletError::Connection(
                "daemon closed the connection".to_string(),
            ));
        }

        serde_json::from_str(response.trim())
            .map_err(|e| RigletError::Protocol(format!("malformed response: {}", e)))
    }

    /// `worker.add(device_uuid)` — create a worker bound to the device
    pub async fn worker_add(&self, device_uuid: &str) -> RigletResult<u64> {
        let envelope = self
            .send_command("worker.add", &[device_uuid.to_string()])
            .await?;
        let added: WorkerAdded = envelope
            .decode()
            .map_err(|e| RigletError::Protocol(format!("worker.add payload: {}", e)))?;
        Ok(added.worker_id)
    }

    /// `worker.free(worker_id)` — tear the worker down
    pub async fn worker_free(&self, worker_id: u64) -> RigletResult<()> {
        self.send_command("worker.free", &[worker_id.to_string()])
            .await?;
        Ok(())
    }

    /// `algorithm.add(worker_id, names...)` — attach a workload's
    /// sub-algorithms to the worker
    pub async fn algorithm_add(&self, worker_id: u64, names: &[String]) -> RigletResult<()> {
        let mut params = Vec::with_capacity(names.len() + 1);
        params.push(worker_id.to_string());
        params.extend(names.iter().cloned());
        self.send_command("algorithm.add", &params).await?;
        Ok(())
    }

    /// `algorithm.destroy(worker_id)` — detach the worker's workload
    pub async fn algorithm_destroy(&self, worker_id: u64) -> RigletResult<()> {
        self.send_command("algorithm.destroy", &[worker_id.to_string()])
            .await?;
        Ok(())
    }

    /// `worker.list()` — all live workers with their algorithms and speeds
    pub async fn worker_list(&self) -> RigletResult<Vec<WorkerRecord>> {
        let envelope = self.send_command("worker.list", &[]).await?;
        let list: WorkerList = envelope
            .decode()
            .map_err(|e| RigletError::Protocol(format!("worker.list payload: {}", e)))?;
        Ok(list.workers)
    }

    /// `algorithm.list()` — all loaded algorithms
    pub async fn algorithm_list(&self) -> RigletResult<Vec<AlgorithmRecord>> {
        let envelope = self.send_command("algorithm.list", &[]).await?;
        let list: AlgorithmList = envelope
            .decode()
            .map_err(|e| RigletError::Protocol(format!("algorithm.list payload: {}", e)))?;
        Ok(list.algorithms)
    }

    /// Best-effort clean shutdown command
    ///
    /// The daemon is allowed to close the socket instead of answering, so
    /// connection failures here count as success.
    pub async fn quit(&self) -> RigletResult<()> {
        match self.send_command("quit", &[]).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_connection_failure() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
