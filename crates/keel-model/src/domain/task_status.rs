use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ContainerStatus, ModelError};

/// Aggregate status of a task, derived from the statuses of its containers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// No container has reached a task-visible status yet.
    #[default]
    None,
    /// Containers exist but the task is not ready yet.
    Created,
    /// Every essential container is at its steady state.
    Running,
    /// Every container has stopped.
    Stopped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::None => "NONE",
            TaskStatus::Created => "CREATED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Stopped => "STOPPED",
        }
    }

    /// Returns `true` if the task is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        *self == TaskStatus::Stopped
    }

    /// Returns `true` if the backend tracks this task status.
    pub fn should_report_to_backend(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Stopped)
    }

    /// Translates a desired task status into the desired status of one of its containers.
    pub fn container_status(&self, steady_state: ContainerStatus) -> ContainerStatus {
        match self {
            TaskStatus::None => ContainerStatus::None,
            TaskStatus::Created => ContainerStatus::Created,
            TaskStatus::Running => steady_state,
            TaskStatus::Stopped => ContainerStatus::Stopped,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(TaskStatus::None),
            "CREATED" => Ok(TaskStatus::Created),
            "RUNNING" => Ok(TaskStatus::Running),
            "STOPPED" => Ok(TaskStatus::Stopped),
            _ => Err(ModelError::InvalidStatus(s.to_string())),
        }
    }
}
