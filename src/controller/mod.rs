pub mod remote_node;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::jobs::{Blueprint, Job, JobsLedger};
use crate::logging::Logger;
use crate::schematic::NodeSchematic;

use self::remote_node::{NodeCallbacks, RemoteNode};

#[derive(Debug)]
pub enum ControllerError {
    UnknownNode { node_id: i32 },
    UnknownJob { job_id: i32 },
    DuplicateJobId { job_id: i32 },
    Refused { node_id: i32 },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode { node_id } => write!(f, "node {node_id} is not part of the fleet"),
            Self::UnknownJob { job_id } => write!(f, "job {job_id} is not registered"),
            Self::DuplicateJobId { job_id } => {
                write!(f, "job id {job_id} is already registered")
            }
            Self::Refused { node_id } => {
                write!(f, "node {node_id} refused or failed the operation")
            }
        }
    }
}

impl std::error::Error for ControllerError {}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeReport {
    pub reachable: bool,
    pub awake: bool,
    pub address: String,
    pub port: u16,
}

/// Aggregate snapshot handed to external reporting layers: node id to node
/// info, job id to blueprint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusReport {
    pub nodes: BTreeMap<i32, NodeReport>,
    pub jobs: BTreeMap<i32, Blueprint>,
}

pub struct Controller {
    logger: Arc<Logger>,
    ledger: Arc<Mutex<JobsLedger>>,
    nodes: HashMap<i32, RemoteNode>,
}

impl Controller {
    /// Builds one RemoteNode per schematic. Nodes that fail initialization
    /// are excluded from the fleet and logged at error severity; the fleet
    /// that remains is whatever answered its first heartbeat.
    pub fn bootstrap(
        schematics: Vec<NodeSchematic>,
        ping_interval: Duration,
        logger: Arc<Logger>,
    ) -> Self {
        let ledger = Arc::new(Mutex::new(JobsLedger::new()));
        let mut nodes = HashMap::new();

        for schematic in schematics {
            let node_id = schematic.id;
            let endpoint = schematic.display_endpoint();

            match RemoteNode::connect(
                schematic,
                Self::fleet_callbacks(&logger, &ledger),
                ping_interval,
            ) {
                Ok(node) => {
                    logger.log(
                        crate::logging::LogLevel::Info,
                        Some("controller::fleet"),
                        "node joined the fleet",
                        Some(json!({"node_id": node_id, "endpoint": endpoint})),
                    );
                    nodes.insert(node_id, node);
                }
                Err(error) => {
                    logger.error(
                        Some("controller::fleet"),
                        &format!("excluding node {node_id}: {error}"),
                    );
                }
            }
        }

        Self {
            logger,
            ledger,
            nodes,
        }
    }

    fn fleet_callbacks(logger: &Arc<Logger>, ledger: &Arc<Mutex<JobsLedger>>) -> NodeCallbacks {
        let lost_logger = Arc::clone(logger);
        let recovered_logger = Arc::clone(logger);
        let timeout_logger = Arc::clone(logger);
        let lookup_ledger = Arc::clone(ledger);

        NodeCallbacks {
            on_lost: Box::new(move |node_id| {
                lost_logger.warn(
                    Some("controller::fleet"),
                    &format!("node {node_id} became unreachable"),
                );
            }),
            on_recovered: Box::new(move |node_id| {
                recovered_logger.info(
                    Some("controller::fleet"),
                    &format!("node {node_id} is reachable again"),
                );
            }),
            on_timeout: Box::new(move |node_id| {
                timeout_logger.warn(
                    Some("controller::fleet"),
                    &format!("node {node_id} operation countdown elapsed"),
                );
            }),
            job_lookup: Box::new(move |node_id| {
                lookup_ledger
                    .lock()
                    .expect("jobs ledger lock poisoned")
                    .jobs_for_node(node_id)
            }),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, node_id: i32) -> Option<&RemoteNode> {
        self.nodes.get(&node_id)
    }

    pub fn assign_job(&self, node_id: i32, blueprint: Blueprint) -> Result<(), ControllerError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(ControllerError::UnknownNode { node_id })?;

        let job_id = blueprint.id;
        {
            let ledger = self.ledger.lock().expect("jobs ledger lock poisoned");
            if ledger.get(job_id).is_some() {
                return Err(ControllerError::DuplicateJobId { job_id });
            }
        }

        let job = Job { blueprint, node_id };
        if !node.assign(&job) {
            return Err(ControllerError::Refused { node_id });
        }

        self.ledger
            .lock()
            .expect("jobs ledger lock poisoned")
            .register(job)
            .map_err(|_| ControllerError::DuplicateJobId { job_id })?;

        self.logger.log(
            crate::logging::LogLevel::Debug,
            Some("controller::jobs"),
            "job assigned",
            Some(json!({"job_id": job_id, "node_id": node_id})),
        );
        Ok(())
    }

    pub fn remove_job(&self, job_id: i32) -> Result<(), ControllerError> {
        let node_id = self.owning_node_id(job_id)?;
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(ControllerError::UnknownNode { node_id })?;

        if !node.remove(job_id) {
            return Err(ControllerError::Refused { node_id });
        }

        let _ = self
            .ledger
            .lock()
            .expect("jobs ledger lock poisoned")
            .remove(job_id);
        Ok(())
    }

    pub fn sleep_job(&self, job_id: i32) -> Result<(), ControllerError> {
        let node_id = self.owning_node_id(job_id)?;
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(ControllerError::UnknownNode { node_id })?;

        if node.sleep_job(job_id) {
            Ok(())
        } else {
            Err(ControllerError::Refused { node_id })
        }
    }

    pub fn wake_job(&self, job_id: i32) -> Result<(), ControllerError> {
        let node_id = self.owning_node_id(job_id)?;
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(ControllerError::UnknownNode { node_id })?;

        if node.wake_job(job_id) {
            Ok(())
        } else {
            Err(ControllerError::Refused { node_id })
        }
    }

    pub fn sleep_node(&mut self, node_id: i32) -> Result<(), ControllerError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(ControllerError::UnknownNode { node_id })?;

        if node.sleep() {
            Ok(())
        } else {
            Err(ControllerError::Refused { node_id })
        }
    }

    pub fn wake_node(&mut self, node_id: i32) -> Result<(), ControllerError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(ControllerError::UnknownNode { node_id })?;

        if node.wake() {
            Ok(())
        } else {
            Err(ControllerError::Refused { node_id })
        }
    }

    pub fn status_report(&self) -> StatusReport {
        let nodes = self
            .nodes
            .iter()
            .map(|(node_id, node)| {
                let schematic = node.schematic();
                (
                    *node_id,
                    NodeReport {
                        reachable: node.reachable(),
                        awake: node.awake(),
                        address: schematic.address.clone(),
                        port: schematic.port,
                    },
                )
            })
            .collect();

        let jobs = self
            .ledger
            .lock()
            .expect("jobs ledger lock poisoned")
            .blueprints();

        StatusReport { nodes, jobs }
    }

    fn owning_node_id(&self, job_id: i32) -> Result<i32, ControllerError> {
        self.ledger
            .lock()
            .expect("jobs ledger lock poisoned")
            .get(job_id)
            .map(|job| job.node_id)
            .ok_or(ControllerError::UnknownJob { job_id })
    }
}
