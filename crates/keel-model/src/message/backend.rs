use serde::{Deserialize, Serialize};

use crate::{ContainerSpec, ContainerStatus, TaskStatus};

/// Inbound messages understood by the agent.
///
/// Encoded as `{"type": "<VariantName>", "message": {...}}`. The set is closed: a type
/// name without a variant fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BackendMessage {
    PayloadMessage(PayloadMessage),
    HeartbeatMessage(HeartbeatMessage),
    AckRequest(AckRequest),
    ServerException(ErrorMessage),
    BadRequestException(ErrorMessage),
}

impl BackendMessage {
    /// Type name as carried on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            BackendMessage::PayloadMessage(_) => "PayloadMessage",
            BackendMessage::HeartbeatMessage(_) => "HeartbeatMessage",
            BackendMessage::AckRequest(_) => "AckRequest",
            BackendMessage::ServerException(_) => "ServerException",
            BackendMessage::BadRequestException(_) => "BadRequestException",
        }
    }
}

/// Desired state for a batch of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMessage {
    pub message_id: String,
    #[serde(default)]
    pub seq_num: u64,
    #[serde(default)]
    pub tasks: Vec<TaskPayload>,
}

/// Desired state of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub arn: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub version: String,
    pub desired_status: TaskStatus,
    #[serde(default)]
    pub containers: Vec<ContainerPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eni: Option<EniPayload>,
}

/// Container definition plus an optional per-container desired status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPayload {
    #[serde(flatten)]
    pub spec: ContainerSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_status: Option<ContainerStatus>,
}

impl ContainerPayload {
    pub fn new(spec: ContainerSpec) -> Self {
        Self {
            spec,
            desired_status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EniPayload {
    pub attachment_arn: String,
    pub mac_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    #[serde(default)]
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    #[serde(default)]
    pub message: String,
}
