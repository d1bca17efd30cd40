//! Test support: an in-process mock miner daemon
//!
//! Speaks the daemon's line-delimited JSON command protocol over a real
//! TCP socket, keeps a per-method command log for idempotence assertions,
//! and can inject a one-shot rejection or a one-shot lost response.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use riglet_core::{Device, DeviceVendor, MinerConfig, RigletResult};
use riglet_engine::{default_catalog, Engine};
use riglet_runtime::{MinerProcess, MinerRuntime};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A worker as the mock daemon holds it
#[derive(Debug, Clone)]
pub struct MockWorker {
    pub worker_id: u64,
    pub device_uuid: String,
    pub algorithms: Vec<String>,
}

#[derive(Debug, Default)]
struct MinerState {
    workers: Vec<MockWorker>,
    next_worker_id: u64,
    commands: Vec<String>,
    fail_next: Option<String>,
    silent_next: Option<String>,
}

/// In-process stand-in for the miner daemon
pub struct MockMiner {
    addr: SocketAddr,
    state: Arc<Mutex<MinerState>>,
    _task: JoinHandle<()>,
}

impl MockMiner {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state: Arc<Mutex<MinerState>> = Arc::default();

        let loop_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);
                let mut line = String::new();
                while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                    let request: Value = serde_json::from_str(line.trim()).unwrap();
                    if let Some(mut response) = handle(&loop_state, &request) {
                        response.push('\n');
                        if write.write_all(response.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    line.clear();
                }
            }
        });

        Self {
            addr,
            state,
            _task: task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn workers(&self) -> Vec<MockWorker> {
        self.state.lock().unwrap().workers.clone()
    }

    pub fn command_count(&self) -> usize {
        self.state.lock().unwrap().commands.len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Reject the next command with the given method name
    pub fn fail_next(&self, method: &str) {
        self.state.lock().unwrap().fail_next = Some(method.to_string());
    }

    /// Apply the next command with the given method name but lose its
    /// response (the client sees a timeout)
    pub fn silent_next(&self, method: &str) {
        self.state.lock().unwrap().silent_next = Some(method.to_string());
    }

    fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.workers.clear();
        state.commands.clear();
        state.fail_next = None;
        state.silent_next = None;
    }
}

fn fake_speed(name: &str) -> f64 {
    10.0 * name.len() as f64
}

fn handle(state: &Mutex<MinerState>, request: &Value) -> Option<String> {
    let id = request["id"].as_u64().unwrap();
    let method = request["method"].as_str().unwrap().to_string();
    let params: Vec<String> = request["params"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap().to_string())
        .collect();

    let mut s = state.lock().unwrap();
    s.commands.push(method.clone());

    if s.fail_next.as_deref() == Some(method.as_str()) {
        s.fail_next = None;
        return Some(json!({"id": id, "error": "injected failure"}).to_string());
    }
    let silent = if s.silent_next.as_deref() == Some(method.as_str()) {
        s.silent_next = None;
        true
    } else {
        false
    };

    let reply = match method.as_str() {
        "worker.add" => {
            let device_uuid = params[0].clone();
            if s.workers.iter().any(|w| w.device_uuid == device_uuid) {
                json!({"id": id, "error": "device already has a worker"})
            } else {
                let worker_id = s.next_worker_id;
                s.next_worker_id += 1;
                s.workers.push(MockWorker {
                    worker_id,
                    device_uuid,
                    algorithms: Vec::new(),
                });
                json!({"id": id, "error": null, "worker_id": worker_id})
            }
        }
        "worker.free" => {
            let worker_id: u64 = params[0].parse().unwrap();
            let before = s.workers.len();
            s.workers.retain(|w| w.worker_id != worker_id);
            if s.workers.len() == before {
                json!({"id": id, "error": "unknown worker"})
            } else {
                json!({"id": id, "error": null})
            }
        }
        "algorithm.add" => {
            let worker_id: u64 = params[0].parse().unwrap();
            let names: Vec<String> = params[1..].to_vec();
            match s.workers.iter_mut().find(|w| w.worker_id == worker_id) {
                None => json!({"id": id, "error": "unknown worker"}),
                Some(w) if !w.algorithms.is_empty() => {
                    json!({"id": id, "error": "worker already has an algorithm"})
                }
                Some(_) if names.is_empty() => json!({"id": id, "error": "no algorithm given"}),
                Some(w) => {
                    w.algorithms = names;
                    json!({"id": id, "error": null})
                }
            }
        }
        "algorithm.destroy" => {
            let worker_id: u64 = params[0].parse().unwrap();
            match s.workers.iter_mut().find(|w| w.worker_id == worker_id) {
                None => json!({"id": id, "error": "unknown worker"}),
                Some(w) => {
                    w.algorithms.clear();
                    json!({"id": id, "error": null})
                }
            }
        }
        "worker.list" => {
            let workers: Vec<Value> = s
                .workers
                .iter()
                .map(|w| {
                    json!({
                        "worker_id": w.worker_id,
                        "device_uuid": w.device_uuid,
                        "algorithms": w
                            .algorithms
                            .iter()
                            .map(|name| json!({"name": name, "speed": fake_speed(name)}))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            json!({"id": id, "error": null, "workers": workers})
        }
        "algorithm.list" => {
            let mut names: Vec<String> = Vec::new();
            for w in &s.workers {
                for name in &w.algorithms {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
            let algorithms: Vec<Value> = names
                .iter()
                .map(|name| json!({"name": name, "speed": fake_speed(name)}))
                .collect();
            json!({"id": id, "error": null, "algorithms": algorithms})
        }
        "quit" => json!({"id": id, "error": null}),
        _ => json!({"id": id, "error": format!("unknown method {}", method)}),
    };

    if silent {
        None
    } else {
        Some(reply.to_string())
    }
}

/// Runtime whose "daemon" is the shared [`MockMiner`]
pub struct MockMinerRuntime {
    miner: Arc<MockMiner>,
}

impl MockMinerRuntime {
    pub fn new(miner: Arc<MockMiner>) -> Self {
        Self { miner }
    }
}

#[async_trait]
impl MinerRuntime for MockMinerRuntime {
    async fn spawn(&self, _config: &MinerConfig) -> RigletResult<Box<dyn MinerProcess>> {
        // A fresh instance starts with no workers.
        self.miner.reset();
        Ok(Box::new(MockDaemonProcess {
            addr: self.miner.addr(),
            alive: AtomicBool::new(true),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockDaemonProcess {
    addr: SocketAddr,
    alive: AtomicBool,
}

#[async_trait]
impl MinerProcess for MockDaemonProcess {
    fn api_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn is_running(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&mut self) -> RigletResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Fabricate an NVIDIA device with a unique uuid
pub fn nvidia_device(tag: &str) -> Device {
    Device::new(
        format!("GPU-{}", uuid::Uuid::new_v4()),
        format!("GeForce {}", tag),
        DeviceVendor::Nvidia,
    )
}

/// Fabricate a device the CUDA workloads must reject
pub fn amd_device() -> Device {
    Device::new(
        format!("GPU-{}", uuid::Uuid::new_v4()),
        "Radeon".to_string(),
        DeviceVendor::Amd,
    )
}

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A loaded engine wired to a fresh mock daemon
pub async fn engine_fixture() -> (Engine, Arc<MockMiner>) {
    init_logging();

    let miner = Arc::new(MockMiner::start().await);
    let mut config = MinerConfig::default();
    config.timeouts.command_secs = 1;
    config.timeouts.startup_secs = 2;
    config.timeouts.shutdown_secs = 0;

    let engine = Engine::with_runtime(
        config,
        default_catalog(),
        Arc::new(MockMinerRuntime::new(miner.clone())),
    );
    engine.load().await.unwrap();

    (engine, miner)
}
