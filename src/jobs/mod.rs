use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque description of one unit of work. The controller never interprets
/// the workload value; workers receive it verbatim inside Assign requests.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Blueprint {
    pub id: i32,
    pub workload: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub blueprint: Blueprint,
    pub node_id: i32,
}

impl Job {
    pub fn id(&self) -> i32 {
        self.blueprint.id
    }
}

#[derive(Debug)]
pub enum LedgerError {
    DuplicateJobId { job_id: i32 },
    JobNotFound { job_id: i32 },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateJobId { job_id } => {
                write!(f, "job id {job_id} is already registered")
            }
            Self::JobNotFound { job_id } => write!(f, "job {job_id} not found"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Controller-side job bookkeeping. Nodes never hold job collections of
/// their own; they see this ledger only through a lookup callback.
#[derive(Default)]
pub struct JobsLedger {
    jobs: HashMap<i32, Job>,
}

impl JobsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Job) -> Result<(), LedgerError> {
        let job_id = job.id();
        if self.jobs.contains_key(&job_id) {
            return Err(LedgerError::DuplicateJobId { job_id });
        }
        self.jobs.insert(job_id, job);
        Ok(())
    }

    pub fn remove(&mut self, job_id: i32) -> Result<Job, LedgerError> {
        self.jobs
            .remove(&job_id)
            .ok_or(LedgerError::JobNotFound { job_id })
    }

    pub fn get(&self, job_id: i32) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn jobs_for_node(&self, node_id: i32) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .values()
            .filter(|job| job.node_id == node_id)
            .cloned()
            .collect();
        jobs.sort_by_key(Job::id);
        jobs
    }

    pub fn blueprints(&self) -> BTreeMap<i32, Blueprint> {
        self.jobs
            .iter()
            .map(|(job_id, job)| (*job_id, job.blueprint.clone()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.jobs.len()
    }
}
