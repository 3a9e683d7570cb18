use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::jobs::Blueprint;
use crate::logging::Logger;
use crate::schematic::NodeSchematic;
use crate::server::RequestHandler;
use crate::wire::messages::{
    AssignResponse, ConstructResponse, RemoveResponse, Request, ResetResponse, SleepJobResponse,
    StatusResponse, WakeJobResponse,
};
use crate::wire::INVALID_REQUEST_REPLY;

#[derive(Clone, Debug, PartialEq)]
pub struct DeployedJob {
    pub blueprint: Blueprint,
    pub awake: bool,
}

#[derive(Default)]
struct NodeState {
    schematic: Option<NodeSchematic>,
    jobs: HashMap<i32, DeployedJob>,
}

/// Worker-side state machine behind the dispatch server's handler. Holds the
/// constructed schematic and the deployed jobs; every operation answers with
/// the matching typed response.
pub struct NodeRuntime {
    logger: Arc<Logger>,
    state: Mutex<NodeState>,
}

impl NodeRuntime {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            state: Mutex::new(NodeState::default()),
        }
    }

    pub fn handler(self: Arc<Self>) -> RequestHandler {
        Arc::new(move |raw| self.handle(raw))
    }

    pub fn handle(&self, raw: &str) -> String {
        let Ok(request) = serde_json::from_str::<Request>(raw) else {
            self.logger
                .warn(Some("node::dispatch"), "rejecting unparseable request");
            return INVALID_REQUEST_REPLY.to_owned();
        };

        let kind = request.kind();
        let mut state = self.state.lock().expect("node state lock poisoned");

        let reply = match request {
            Request::Status => {
                serde_json::to_string(&StatusResponse::new(state.schematic.is_some()))
            }
            Request::Construct { schematic } => {
                let success = Self::construct(&mut state, schematic);
                serde_json::to_string(&ConstructResponse::new(success))
            }
            Request::Assign { blueprint } => {
                let success = Self::assign(&mut state, blueprint);
                serde_json::to_string(&AssignResponse::new(success))
            }
            Request::Remove { job_id } => {
                let success = state.jobs.remove(&job_id).is_some();
                serde_json::to_string(&RemoveResponse::new(success))
            }
            Request::SleepJob { job_id } => {
                let success = Self::set_job_awake(&mut state, job_id, false);
                serde_json::to_string(&SleepJobResponse::new(success))
            }
            Request::WakeJob { job_id } => {
                let success = Self::set_job_awake(&mut state, job_id, true);
                serde_json::to_string(&WakeJobResponse::new(success))
            }
            Request::Reset => {
                *state = NodeState::default();
                serde_json::to_string(&ResetResponse::new(true))
            }
        };
        drop(state);

        match reply {
            Ok(reply) => {
                self.logger.log(
                    crate::logging::LogLevel::Debug,
                    Some("node::dispatch"),
                    "handled request",
                    Some(json!({"kind": kind.as_str()})),
                );
                reply
            }
            Err(_) => INVALID_REQUEST_REPLY.to_owned(),
        }
    }

    pub fn constructed(&self) -> bool {
        self.state
            .lock()
            .expect("node state lock poisoned")
            .schematic
            .is_some()
    }

    pub fn deployed_jobs(&self) -> Vec<DeployedJob> {
        let state = self.state.lock().expect("node state lock poisoned");
        let mut jobs: Vec<DeployedJob> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.blueprint.id);
        jobs
    }

    fn construct(state: &mut NodeState, schematic: NodeSchematic) -> bool {
        if state.schematic.is_some() {
            return false;
        }
        state.schematic = Some(schematic);
        true
    }

    fn assign(state: &mut NodeState, blueprint: Blueprint) -> bool {
        if state.schematic.is_none() || state.jobs.contains_key(&blueprint.id) {
            return false;
        }
        state.jobs.insert(
            blueprint.id,
            DeployedJob {
                blueprint,
                awake: true,
            },
        );
        true
    }

    // job-level sleep/wake report success only on an actual transition
    fn set_job_awake(state: &mut NodeState, job_id: i32, awake: bool) -> bool {
        match state.jobs.get_mut(&job_id) {
            Some(job) if job.awake != awake => {
                job.awake = awake;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::jobs::Blueprint;
    use crate::logging::{LogLevel, Logger, LoggerConfig};
    use crate::schematic::{HardwareProfile, NodeSchematic};
    use crate::wire::messages::{
        AssignResponse, ConstructResponse, RemoveResponse, Request, ResetResponse,
        SleepJobResponse, StatusResponse, WakeJobResponse,
    };
    use crate::wire::INVALID_REQUEST_REPLY;

    use super::NodeRuntime;

    fn runtime() -> NodeRuntime {
        NodeRuntime::new(Arc::new(Logger::new(LoggerConfig {
            min_level: LogLevel::Error,
            human_friendly: false,
        })))
    }

    fn schematic() -> NodeSchematic {
        NodeSchematic {
            id: 1,
            address: "127.0.0.1".to_owned(),
            port: 9411,
            profile: HardwareProfile {
                cores: 2,
                memory_mb: 4096,
            },
        }
    }

    fn blueprint(id: i32) -> Blueprint {
        Blueprint {
            id,
            workload: json!({"cmd": "noop"}),
        }
    }

    fn send(runtime: &NodeRuntime, request: &Request) -> String {
        let raw = serde_json::to_string(request).expect("request should serialize");
        runtime.handle(&raw)
    }

    #[test]
    fn status_reflects_construction_lifecycle() {
        let runtime = runtime();

        let reply: StatusResponse =
            serde_json::from_str(&send(&runtime, &Request::Status)).expect("reply should parse");
        assert!(!reply.constructed);

        let reply: ConstructResponse = serde_json::from_str(&send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        ))
        .expect("reply should parse");
        assert!(reply.success);

        let reply: StatusResponse =
            serde_json::from_str(&send(&runtime, &Request::Status)).expect("reply should parse");
        assert!(reply.constructed);
    }

    #[test]
    fn construct_twice_is_rejected() {
        let runtime = runtime();
        send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        );

        let reply: ConstructResponse = serde_json::from_str(&send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        ))
        .expect("reply should parse");
        assert!(!reply.success);
    }

    #[test]
    fn assign_requires_construction_and_unique_job_ids() {
        let runtime = runtime();

        let reply: AssignResponse = serde_json::from_str(&send(
            &runtime,
            &Request::Assign {
                blueprint: blueprint(1),
            },
        ))
        .expect("reply should parse");
        assert!(!reply.success, "assign before construct must fail");

        send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        );

        let reply: AssignResponse = serde_json::from_str(&send(
            &runtime,
            &Request::Assign {
                blueprint: blueprint(1),
            },
        ))
        .expect("reply should parse");
        assert!(reply.success);

        let reply: AssignResponse = serde_json::from_str(&send(
            &runtime,
            &Request::Assign {
                blueprint: blueprint(1),
            },
        ))
        .expect("reply should parse");
        assert!(!reply.success, "duplicate job id must fail");

        assert_eq!(runtime.deployed_jobs().len(), 1);
    }

    #[test]
    fn job_sleep_and_wake_report_actual_transitions() {
        let runtime = runtime();
        send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        );
        send(
            &runtime,
            &Request::Assign {
                blueprint: blueprint(5),
            },
        );

        let reply: SleepJobResponse =
            serde_json::from_str(&send(&runtime, &Request::SleepJob { job_id: 5 }))
                .expect("reply should parse");
        assert!(reply.success);

        let reply: SleepJobResponse =
            serde_json::from_str(&send(&runtime, &Request::SleepJob { job_id: 5 }))
                .expect("reply should parse");
        assert!(!reply.success, "sleeping a sleeping job must fail");

        let reply: WakeJobResponse =
            serde_json::from_str(&send(&runtime, &Request::WakeJob { job_id: 5 }))
                .expect("reply should parse");
        assert!(reply.success);

        let reply: WakeJobResponse =
            serde_json::from_str(&send(&runtime, &Request::WakeJob { job_id: 99 }))
                .expect("reply should parse");
        assert!(!reply.success, "waking an unknown job must fail");
    }

    #[test]
    fn remove_deletes_the_job_once() {
        let runtime = runtime();
        send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        );
        send(
            &runtime,
            &Request::Assign {
                blueprint: blueprint(8),
            },
        );

        let reply: RemoveResponse =
            serde_json::from_str(&send(&runtime, &Request::Remove { job_id: 8 }))
                .expect("reply should parse");
        assert!(reply.success);

        let reply: RemoveResponse =
            serde_json::from_str(&send(&runtime, &Request::Remove { job_id: 8 }))
                .expect("reply should parse");
        assert!(!reply.success);
    }

    #[test]
    fn reset_clears_schematic_and_jobs() {
        let runtime = runtime();
        send(
            &runtime,
            &Request::Construct {
                schematic: schematic(),
            },
        );
        send(
            &runtime,
            &Request::Assign {
                blueprint: blueprint(2),
            },
        );

        let reply: ResetResponse =
            serde_json::from_str(&send(&runtime, &Request::Reset)).expect("reply should parse");
        assert!(reply.success);
        assert!(!runtime.constructed());
        assert!(runtime.deployed_jobs().is_empty());
    }

    #[test]
    fn unparseable_text_gets_the_sentinel_reply() {
        let runtime = runtime();
        assert_eq!(runtime.handle("definitely not json"), INVALID_REQUEST_REPLY);
        assert_eq!(
            runtime.handle(r#"{"request":"Detonate"}"#),
            INVALID_REQUEST_REPLY
        );
    }
}
