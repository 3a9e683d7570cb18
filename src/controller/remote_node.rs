use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::events::{EventHub, NodeEvent};
use crate::heartbeat::{Monitor, MonitorError, ProbeObserver};
use crate::jobs::Job;
use crate::schematic::NodeSchematic;
use crate::wire::client::RpcClient;
use crate::wire::messages::{
    AssignResponse, ConstructResponse, RemoveResponse, Request, ResetResponse, SleepJobResponse,
    StatusResponse, WakeJobResponse,
};

/// Handlers supplied once, at construction. Lost/Recovered/Timeout run on
/// whichever thread detected the condition; the job lookup is how this node
/// sees the controller's ledger without owning any job collection itself.
pub struct NodeCallbacks {
    pub on_lost: Box<dyn Fn(i32) + Send + Sync>,
    pub on_recovered: Box<dyn Fn(i32) + Send + Sync>,
    pub on_timeout: Box<dyn Fn(i32) + Send + Sync>,
    pub job_lookup: Box<dyn Fn(i32) -> Vec<Job> + Send + Sync>,
}

#[derive(Debug)]
pub enum NodeInitError {
    Endpoint {
        node_id: i32,
        address: String,
        source: io::Error,
    },
    Monitor {
        node_id: i32,
        source: MonitorError,
    },
    Unreachable {
        node_id: i32,
        address: String,
    },
}

impl fmt::Display for NodeInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint {
                node_id,
                address,
                source,
            } => write!(
                f,
                "node {node_id} endpoint '{address}' did not resolve: {source}"
            ),
            Self::Monitor { node_id, source } => {
                write!(f, "node {node_id} heartbeat monitor failed: {source}")
            }
            Self::Unreachable { node_id, address } => write!(
                f,
                "node {node_id} at {address} was unreachable during initialization"
            ),
        }
    }
}

impl std::error::Error for NodeInitError {}

struct SharedState {
    reachable: AtomicBool,
    awake: AtomicBool,
    events: EventHub,
}

struct Countdown {
    cancel: Sender<()>,
}

/// Controller-side liveness and control state machine for one worker.
///
/// A dedicated probe thread flips `reachable` and raises edge-triggered
/// Lost/Recovered events while RPC operations run synchronously on the
/// caller's thread; the two never coordinate, so an RPC may fail before the
/// probe loop has observed the same outage (and vice versa).
pub struct RemoteNode {
    schematic: NodeSchematic,
    shared: Arc<SharedState>,
    monitor: Monitor,
    client: RpcClient,
    countdown: Mutex<Option<Countdown>>,
    job_lookup: Box<dyn Fn(i32) -> Vec<Job> + Send + Sync>,
}

impl RemoteNode {
    pub fn connect(
        schematic: NodeSchematic,
        callbacks: NodeCallbacks,
        ping_interval: Duration,
    ) -> Result<Self, NodeInitError> {
        let endpoint = schematic.endpoint().map_err(|source| NodeInitError::Endpoint {
            node_id: schematic.id,
            address: schematic.display_endpoint(),
            source,
        })?;

        let shared = Arc::new(SharedState {
            reachable: AtomicBool::new(false),
            awake: AtomicBool::new(true),
            events: EventHub::new(),
        });

        let failure_shared = Arc::clone(&shared);
        let client = RpcClient::new(
            endpoint,
            ping_interval,
            Arc::new(move || {
                if !failure_shared.awake.load(Ordering::SeqCst) {
                    return;
                }
                if failure_shared.reachable.swap(false, Ordering::SeqCst) {
                    failure_shared.events.notify(NodeEvent::Lost);
                }
            }),
        );

        let mut monitor = Monitor::new(endpoint, ping_interval)
            .map_err(|source| NodeInitError::Monitor {
                node_id: schematic.id,
                source,
            })?;
        monitor
            .start(Self::probe_observer(&shared))
            .map_err(|source| NodeInitError::Monitor {
                node_id: schematic.id,
                source,
            })?;

        // give the first probe one full interval to land before judging
        thread::sleep(ping_interval);
        if !shared.reachable.load(Ordering::SeqCst) {
            let _ = monitor.stop();
            return Err(NodeInitError::Unreachable {
                node_id: schematic.id,
                address: schematic.display_endpoint(),
            });
        }

        let NodeCallbacks {
            on_lost,
            on_recovered,
            on_timeout,
            job_lookup,
        } = callbacks;

        let node = Self {
            schematic,
            shared,
            monitor,
            client,
            countdown: Mutex::new(None),
            job_lookup,
        };

        // clear any stale state left by a previous controller incarnation,
        // then hand the worker its schematic; failures here stay silent
        if node.status() {
            node.reset();
        }
        node.construct();

        let node_id = node.schematic.id;
        node.shared
            .events
            .subscribe(NodeEvent::Lost, move || on_lost(node_id));
        node.shared
            .events
            .subscribe(NodeEvent::Recovered, move || on_recovered(node_id));
        node.shared
            .events
            .subscribe(NodeEvent::Timeout, move || on_timeout(node_id));

        Ok(node)
    }

    fn probe_observer(shared: &Arc<SharedState>) -> ProbeObserver {
        let shared = Arc::clone(shared);
        Arc::new(move |up| {
            if up {
                if !shared.reachable.swap(true, Ordering::SeqCst) {
                    shared.events.notify(NodeEvent::Recovered);
                }
            } else if shared.reachable.swap(false, Ordering::SeqCst) {
                shared.events.notify(NodeEvent::Lost);
            }
        })
    }

    pub fn schematic(&self) -> &NodeSchematic {
        &self.schematic
    }

    pub fn reachable(&self) -> bool {
        self.shared.reachable.load(Ordering::SeqCst)
    }

    pub fn awake(&self) -> bool {
        self.shared.awake.load(Ordering::SeqCst)
    }

    pub fn assigned_jobs(&self) -> Vec<Job> {
        (self.job_lookup)(self.schematic.id)
    }

    pub fn status(&self) -> bool {
        self.client
            .call::<StatusResponse>(&Request::Status)
            .map(|response| response.constructed)
            .unwrap_or(false)
    }

    pub fn construct(&self) -> bool {
        let request = Request::Construct {
            schematic: self.schematic.clone(),
        };
        self.client
            .call::<ConstructResponse>(&request)
            .map(|response| response.success)
            .unwrap_or(false)
    }

    pub fn assign(&self, job: &Job) -> bool {
        let request = Request::Assign {
            blueprint: job.blueprint.clone(),
        };
        self.client
            .call::<AssignResponse>(&request)
            .map(|response| response.success)
            .unwrap_or(false)
    }

    pub fn remove(&self, job_id: i32) -> bool {
        self.client
            .call::<RemoveResponse>(&Request::Remove { job_id })
            .map(|response| response.success)
            .unwrap_or(false)
    }

    pub fn sleep_job(&self, job_id: i32) -> bool {
        self.client
            .call::<SleepJobResponse>(&Request::SleepJob { job_id })
            .map(|response| response.success)
            .unwrap_or(false)
    }

    pub fn wake_job(&self, job_id: i32) -> bool {
        self.client
            .call::<WakeJobResponse>(&Request::WakeJob { job_id })
            .map(|response| response.success)
            .unwrap_or(false)
    }

    pub fn reset(&self) -> bool {
        self.client
            .call::<ResetResponse>(&Request::Reset)
            .map(|response| response.success)
            .unwrap_or(false)
    }

    /// Node-level lifecycle exit: cancel any armed countdown, stop the probe
    /// thread, mark asleep, then tell the worker to drop its state.
    pub fn sleep(&mut self) -> bool {
        self.interrupt_countdown();
        let _ = self.monitor.stop();
        self.shared.awake.store(false, Ordering::SeqCst);
        self.reset()
    }

    pub fn wake(&mut self) -> bool {
        let _ = self.monitor.start(Self::probe_observer(&self.shared));
        self.shared.awake.store(true, Ordering::SeqCst);
        self.construct()
    }

    /// Arms the one-shot stall timer. An already-armed countdown is replaced,
    /// which cancels it; at most one live countdown exists per node.
    pub fn begin_countdown(&self, duration: Duration) {
        let (cancel, expiry) = mpsc::channel();
        let shared = Arc::clone(&self.shared);

        thread::spawn(move || match expiry.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => shared.events.notify(NodeEvent::Timeout),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        });

        let mut slot = self.countdown.lock().expect("countdown slot lock poisoned");
        *slot = Some(Countdown { cancel });
    }

    pub fn interrupt_countdown(&self) {
        let mut slot = self.countdown.lock().expect("countdown slot lock poisoned");
        if let Some(countdown) = slot.take() {
            let _ = countdown.cancel.send(());
        }
    }
}
