use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::jobs::Blueprint;
use crate::schematic::NodeSchematic;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MessageKind {
    Status,
    Construct,
    Assign,
    Remove,
    SleepJob,
    WakeJob,
    Reset,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::Construct => "Construct",
            Self::Assign => "Assign",
            Self::Remove => "Remove",
            Self::SleepJob => "SleepJob",
            Self::WakeJob => "WakeJob",
            Self::Reset => "Reset",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "request")]
pub enum Request {
    Status,
    Construct { schematic: NodeSchematic },
    Assign { blueprint: Blueprint },
    Remove { job_id: i32 },
    SleepJob { job_id: i32 },
    WakeJob { job_id: i32 },
    Reset,
}

impl Request {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Status => MessageKind::Status,
            Self::Construct { .. } => MessageKind::Construct,
            Self::Assign { .. } => MessageKind::Assign,
            Self::Remove { .. } => MessageKind::Remove,
            Self::SleepJob { .. } => MessageKind::SleepJob,
            Self::WakeJob { .. } => MessageKind::WakeJob,
            Self::Reset => MessageKind::Reset,
        }
    }
}

/// Lenient first-pass decode of a reply: only the self-declared shape. The
/// full payload is decoded strictly once the shape matches the caller's
/// expectation.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    pub response: MessageKind,
}

pub trait TypedResponse: DeserializeOwned {
    const KIND: MessageKind;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StatusResponse {
    pub response: MessageKind,
    pub constructed: bool,
}

impl StatusResponse {
    pub fn new(constructed: bool) -> Self {
        Self {
            response: MessageKind::Status,
            constructed,
        }
    }
}

impl TypedResponse for StatusResponse {
    const KIND: MessageKind = MessageKind::Status;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConstructResponse {
    pub response: MessageKind,
    pub success: bool,
}

impl ConstructResponse {
    pub fn new(success: bool) -> Self {
        Self {
            response: MessageKind::Construct,
            success,
        }
    }
}

impl TypedResponse for ConstructResponse {
    const KIND: MessageKind = MessageKind::Construct;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssignResponse {
    pub response: MessageKind,
    pub success: bool,
}

impl AssignResponse {
    pub fn new(success: bool) -> Self {
        Self {
            response: MessageKind::Assign,
            success,
        }
    }
}

impl TypedResponse for AssignResponse {
    const KIND: MessageKind = MessageKind::Assign;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveResponse {
    pub response: MessageKind,
    pub success: bool,
}

impl RemoveResponse {
    pub fn new(success: bool) -> Self {
        Self {
            response: MessageKind::Remove,
            success,
        }
    }
}

impl TypedResponse for RemoveResponse {
    const KIND: MessageKind = MessageKind::Remove;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SleepJobResponse {
    pub response: MessageKind,
    pub success: bool,
}

impl SleepJobResponse {
    pub fn new(success: bool) -> Self {
        Self {
            response: MessageKind::SleepJob,
            success,
        }
    }
}

impl TypedResponse for SleepJobResponse {
    const KIND: MessageKind = MessageKind::SleepJob;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WakeJobResponse {
    pub response: MessageKind,
    pub success: bool,
}

impl WakeJobResponse {
    pub fn new(success: bool) -> Self {
        Self {
            response: MessageKind::WakeJob,
            success,
        }
    }
}

impl TypedResponse for WakeJobResponse {
    const KIND: MessageKind = MessageKind::WakeJob;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResetResponse {
    pub response: MessageKind,
    pub success: bool,
}

impl ResetResponse {
    pub fn new(success: bool) -> Self {
        Self {
            response: MessageKind::Reset,
            success,
        }
    }
}

impl TypedResponse for ResetResponse {
    const KIND: MessageKind = MessageKind::Reset;
}
