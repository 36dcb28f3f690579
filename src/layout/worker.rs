//! Background layout thread.
//!
//! Requests carry a full node snapshot. The worker only ever acts on the newest
//! request it has seen, and an in-flight simulation is abandoned between ticks
//! as soon as a newer request id is issued. Results for superseded ids are
//! dropped on the receiving side as well.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use log::{debug, error, info};

use super::force::{ForceConfig, ForceSimulation};
use super::god::{GodLayout, compute_god_layout};
use crate::model::{Node, Position3};

pub type RequestId = u64;

enum LayoutRequest {
    God {
        request_id: RequestId,
        root_id: String,
        nodes: Vec<Node>,
    },
    Normal {
        request_id: RequestId,
        nodes: Vec<Node>,
        links: Vec<(String, String)>,
        config: ForceConfig,
    },
    Stop,
    Shutdown,
}

#[derive(Debug)]
pub enum LayoutUpdate {
    God {
        request_id: RequestId,
        layout: GodLayout,
    },
    GodError {
        request_id: RequestId,
        message: String,
    },
    Positions {
        request_id: RequestId,
        positions: HashMap<String, Position3>,
        settled: bool,
    },
}

impl LayoutUpdate {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::God { request_id, .. }
            | Self::GodError { request_id, .. }
            | Self::Positions { request_id, .. } => *request_id,
        }
    }
}

pub struct LayoutWorker {
    tx: Sender<LayoutRequest>,
    rx: Receiver<LayoutUpdate>,
    latest: Arc<AtomicU64>,
    next_request_id: RequestId,
    handle: Option<JoinHandle<()>>,
}

impl LayoutWorker {
    pub fn spawn() -> anyhow::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (update_tx, update_rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));

        let worker_latest = Arc::clone(&latest);
        let handle = thread::Builder::new()
            .name("layout-worker".to_owned())
            .spawn(move || run_worker(request_rx, update_tx, worker_latest))
            .context("failed to spawn layout worker thread")?;
        info!("layout worker started");

        Ok(Self {
            tx: request_tx,
            rx: update_rx,
            latest,
            next_request_id: 0,
            handle: Some(handle),
        })
    }

    fn issue_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        self.latest.store(self.next_request_id, Ordering::SeqCst);
        self.next_request_id
    }

    pub fn request_god(&mut self, root_id: &str, nodes: Vec<Node>) -> RequestId {
        let request_id = self.issue_request_id();
        self.send(LayoutRequest::God {
            request_id,
            root_id: root_id.to_owned(),
            nodes,
        });
        request_id
    }

    pub fn request_normal(
        &mut self,
        nodes: Vec<Node>,
        links: Vec<(String, String)>,
        config: ForceConfig,
    ) -> RequestId {
        let request_id = self.issue_request_id();
        self.send(LayoutRequest::Normal {
            request_id,
            nodes,
            links,
            config,
        });
        request_id
    }

    /// Halts the running simulation and invalidates anything still in flight.
    pub fn stop(&mut self) {
        self.issue_request_id();
        self.send(LayoutRequest::Stop);
    }

    fn send(&self, request: LayoutRequest) {
        if self.tx.send(request).is_err() {
            error!("layout worker is gone; request dropped");
        }
    }

    fn accept(&self, update: LayoutUpdate) -> Option<LayoutUpdate> {
        if update.request_id() == self.next_request_id {
            Some(update)
        } else {
            debug!(
                "discarding stale layout result {} (latest {})",
                update.request_id(),
                self.next_request_id
            );
            None
        }
    }

    /// Non-blocking; returns current results in arrival order.
    pub fn poll(&mut self) -> Vec<LayoutUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(update) => updates.extend(self.accept(update)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("layout worker disconnected");
                    break;
                }
            }
        }
        updates
    }

    /// Blocks until a current result arrives or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<LayoutUpdate> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(update) => {
                    if let Some(update) = self.accept(update) {
                        return Some(update);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    error!("layout worker disconnected");
                    return None;
                }
            }
        }
    }
}

impl Drop for LayoutWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(LayoutRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("layout worker panicked during shutdown");
            }
        }
    }
}

struct ActiveSimulation {
    request_id: RequestId,
    simulation: ForceSimulation,
}

/// Collapses everything queued behind `first` down to the newest request.
fn newest_request(first: LayoutRequest, rx: &Receiver<LayoutRequest>) -> LayoutRequest {
    let mut newest = first;
    while let Ok(next) = rx.try_recv() {
        if matches!(newest, LayoutRequest::Shutdown) {
            continue;
        }
        newest = next;
    }
    newest
}

fn run_worker(rx: Receiver<LayoutRequest>, tx: Sender<LayoutUpdate>, latest: Arc<AtomicU64>) {
    let mut active: Option<ActiveSimulation> = None;

    loop {
        let received = match &active {
            Some(running) => match rx.recv_timeout(running.simulation.config().tick_interval) {
                Ok(request) => Some(request),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(request) => Some(request),
                Err(_) => break,
            },
        };

        let had_request = received.is_some();
        if let Some(request) = received {
            match newest_request(request, &rx) {
                LayoutRequest::Shutdown => break,
                LayoutRequest::Stop => {
                    if active.take().is_some() {
                        debug!("force simulation stopped");
                    }
                }
                LayoutRequest::God {
                    request_id,
                    root_id,
                    nodes,
                } => {
                    active = None;
                    let update = run_god(request_id, &root_id, &nodes);
                    if latest.load(Ordering::SeqCst) == request_id && tx.send(update).is_err() {
                        break;
                    }
                }
                LayoutRequest::Normal {
                    request_id,
                    nodes,
                    links,
                    config,
                } => {
                    let mut running = match active.take() {
                        Some(mut running) => {
                            running.simulation.set_config(config);
                            running.simulation.reseed(&nodes, &links);
                            running.request_id = request_id;
                            running
                        }
                        None => ActiveSimulation {
                            request_id,
                            simulation: ForceSimulation::new(&nodes, &links, config, request_id),
                        },
                    };
                    running.simulation.warm_up();
                    debug!(
                        "force simulation {request_id} warmed up with {} nodes",
                        running.simulation.len()
                    );
                    active = Some(running);
                }
            }
        }

        let Some(running) = active.as_mut() else {
            continue;
        };
        if latest.load(Ordering::SeqCst) != running.request_id {
            debug!("force simulation {} superseded", running.request_id);
            active = None;
            continue;
        }

        if !had_request {
            running.simulation.tick();
        }
        let settled = running.simulation.is_settled();
        let update = LayoutUpdate::Positions {
            request_id: running.request_id,
            positions: running.simulation.positions(),
            settled,
        };
        if tx.send(update).is_err() {
            break;
        }
        if settled {
            debug!("force simulation {} settled", running.request_id);
            active = None;
        }
    }

    info!("layout worker stopped");
}

fn run_god(request_id: RequestId, root_id: &str, nodes: &[Node]) -> LayoutUpdate {
    guarded_god(request_id, || compute_god_layout(root_id, nodes))
}

/// Turns a panic inside the computation into `GodError`. Relies on the
/// release profile unwinding.
fn guarded_god(request_id: RequestId, compute: impl FnOnce() -> GodLayout) -> LayoutUpdate {
    match panic::catch_unwind(AssertUnwindSafe(compute)) {
        Ok(layout) => LayoutUpdate::God { request_id, layout },
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|text| (*text).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "god layout computation panicked".to_owned());
            error!("god layout {request_id} failed: {message}");
            LayoutUpdate::GodError { request_id, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::force::simulation_links;
    use crate::model::default_root_color;

    fn node(id: &str, parent: Option<&str>) -> Node {
        Node::new(
            id.to_owned(),
            parent.map(str::to_owned),
            id.to_owned(),
            default_root_color(),
            0,
        )
    }

    fn nodes() -> Vec<Node> {
        vec![node("r", None), node("a", Some("r")), node("b", Some("r"))]
    }

    #[test]
    fn god_request_returns_layout() {
        let mut worker = LayoutWorker::spawn().unwrap();
        let id = worker.request_god("r", nodes());
        match worker.wait(Duration::from_secs(5)) {
            Some(LayoutUpdate::God { request_id, layout }) => {
                assert_eq!(request_id, id);
                assert_eq!(layout.len(), 3);
            }
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[test]
    fn panicking_layout_becomes_god_error() {
        let update = guarded_god(7, || panic!("layout exploded"));
        match update {
            LayoutUpdate::GodError { request_id, message } => {
                assert_eq!(request_id, 7);
                assert_eq!(message, "layout exploded");
            }
            other => panic!("unexpected update {other:?}"),
        }
        assert!(matches!(guarded_god(8, GodLayout::empty), LayoutUpdate::God { request_id: 8, .. }));
    }

    #[test]
    fn only_latest_request_is_delivered() {
        let mut worker = LayoutWorker::spawn().unwrap();
        worker.request_god("r", nodes());
        worker.request_god("a", nodes());
        let latest = worker.request_god("r", nodes());

        let update = worker.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(update.request_id(), latest);
        thread::sleep(Duration::from_millis(50));
        assert!(worker.poll().iter().all(|update| update.request_id() == latest));
    }

    #[test]
    fn normal_request_streams_until_settled() {
        let mut worker = LayoutWorker::spawn().unwrap();
        let nodes = nodes();
        let links = simulation_links(&nodes);
        let config = ForceConfig {
            tick_interval: Duration::from_millis(1),
            ..ForceConfig::default()
        };
        let id = worker.request_normal(nodes, links, config);

        let mut saw_settled = false;
        while let Some(update) = worker.wait(Duration::from_secs(5)) {
            let LayoutUpdate::Positions {
                request_id,
                positions,
                settled,
            } = update
            else {
                panic!("expected positions");
            };
            assert_eq!(request_id, id);
            assert_eq!(positions.len(), 3);
            if settled {
                saw_settled = true;
                break;
            }
        }
        assert!(saw_settled);
    }

    #[test]
    fn stop_silences_running_simulation() {
        let mut worker = LayoutWorker::spawn().unwrap();
        let nodes = nodes();
        let links = simulation_links(&nodes);
        worker.request_normal(nodes, links, ForceConfig::default());
        worker.stop();
        thread::sleep(Duration::from_millis(100));
        assert!(worker.poll().is_empty());
    }
}
