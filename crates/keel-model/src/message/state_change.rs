use serde::{Deserialize, Serialize};

use crate::{AttachmentStatus, ContainerStatus, PortBinding, TaskStatus};

/// Container status change reported to the backend.
///
/// `status` is always the collapsed backend value: `Running`, `Stopped` or `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateChange {
    pub task_arn: String,
    pub container_name: String,
    pub status: ContainerStatus,
    /// Known status the change was computed from; recorded as sent on delivery.
    #[serde(skip)]
    pub known_status: ContainerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_bindings: Vec<PortBinding>,
}

/// Task status change reported to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateChange {
    pub task_arn: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Network attachment change reported to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentStateChange {
    pub task_arn: String,
    pub attachment_arn: String,
    pub mac_address: String,
    pub status: AttachmentStatus,
}

/// Everything the agent reports upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StateChangeEvent {
    Container(ContainerStateChange),
    Task(TaskStateChange),
    Attachment(AttachmentStateChange),
}

impl StateChangeEvent {
    pub fn task_arn(&self) -> &str {
        match self {
            StateChangeEvent::Container(c) => &c.task_arn,
            StateChangeEvent::Task(t) => &t.task_arn,
            StateChangeEvent::Attachment(a) => &a.task_arn,
        }
    }

    /// Returns `true` for container or task changes that reach a terminal status.
    pub fn is_terminal(&self) -> bool {
        match self {
            StateChangeEvent::Container(c) => c.status.is_terminal(),
            StateChangeEvent::Task(t) => t.status.is_terminal(),
            StateChangeEvent::Attachment(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_change_omits_internal_fields() {
        let change = StateChangeEvent::Container(ContainerStateChange {
            task_arn: "arn:task/1".into(),
            container_name: "app".into(),
            status: ContainerStatus::Stopped,
            known_status: ContainerStatus::Stopped,
            exit_code: Some(1),
            reason: Some("CannotPullContainerError: not found".into()),
            port_bindings: vec![],
        });

        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["kind"], "container");
        assert_eq!(json["status"], "STOPPED");
        assert_eq!(json["exitCode"], 1);
        assert!(json.get("knownStatus").is_none());
        assert!(json.get("portBindings").is_none());
        assert!(change.is_terminal());
        assert_eq!(change.task_arn(), "arn:task/1");
    }
}
