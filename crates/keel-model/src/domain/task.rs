use std::{collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    Container, ContainerStatus, EniAttachment, Guarded, ModelError, TaskArn, TaskPayload,
    TaskStatus,
};

/// A task accepted by the agent and the containers it owns.
///
/// The known status is a cached aggregate of the container statuses, kept for change
/// detection; it is recomputed whenever a container's known status changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub arn: TaskArn,
    pub family: String,
    pub version: String,
    pub containers: Vec<Arc<Container>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eni: Option<Arc<EniAttachment>>,
    #[serde(default)]
    desired_status: Guarded<TaskStatus>,
    #[serde(default)]
    known_status: Guarded<TaskStatus>,
    #[serde(default)]
    sent_status: Guarded<TaskStatus>,
}

impl Task {
    /// Build a task, checking container names are unique and dependencies resolve.
    pub fn new(
        arn: impl Into<TaskArn>,
        family: impl Into<String>,
        version: impl Into<String>,
        containers: Vec<Container>,
    ) -> Result<Self, ModelError> {
        let arn = arn.into();

        let mut names = HashSet::new();
        for container in &containers {
            if !names.insert(container.name()) {
                return Err(ModelError::DuplicateContainer {
                    task: arn.clone(),
                    container: container.name().to_string(),
                });
            }
        }
        for container in &containers {
            if let Some(dependency) = container
                .spec
                .run_dependencies
                .iter()
                .find(|dep| !names.contains(dep.as_str()))
            {
                return Err(ModelError::UnknownDependency {
                    container: container.name().to_string(),
                    dependency: dependency.clone(),
                });
            }
        }

        Ok(Self {
            arn,
            family: family.into(),
            version: version.into(),
            containers: containers.into_iter().map(Arc::new).collect(),
            eni: None,
            desired_status: Guarded::default(),
            known_status: Guarded::default(),
            sent_status: Guarded::default(),
        })
    }

    /// Build a task from a desired-state payload.
    ///
    /// Containers without an explicit desired status inherit the task's desired status,
    /// translated through their steady state.
    pub fn from_payload(payload: &TaskPayload) -> Result<Self, ModelError> {
        let containers = payload
            .containers
            .iter()
            .map(|c| Container::new(c.spec.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut task = Self::new(
            payload.arn.clone(),
            payload.family.clone(),
            payload.version.clone(),
            containers,
        )?;
        if let Some(eni) = &payload.eni {
            task.eni = Some(Arc::new(EniAttachment::new(
                payload.arn.clone(),
                eni.attachment_arn.clone(),
                eni.mac_address.clone(),
            )));
        }

        task.set_desired_status(payload.desired_status);
        for (container, declared) in task.containers.iter().zip(&payload.containers) {
            let desired = declared.desired_status.unwrap_or_else(|| {
                payload
                    .desired_status
                    .container_status(container.steady_state_status())
            });
            container.set_desired_status(desired);
        }
        Ok(task)
    }

    /// Attach a container injected by the agent (for example a network pause container).
    pub fn with_internal_container(mut self, container: Container) -> Result<Self, ModelError> {
        if self.container(container.name()).is_some() {
            return Err(ModelError::DuplicateContainer {
                task: self.arn.clone(),
                container: container.name().to_string(),
            });
        }
        let container = Arc::new(container);
        container.set_desired_status(
            self.desired_status()
                .container_status(container.steady_state_status()),
        );
        self.containers.push(container);
        Ok(self)
    }

    pub fn container(&self, name: &str) -> Option<&Arc<Container>> {
        self.containers.iter().find(|c| c.name() == name)
    }

    pub fn essential_containers(&self) -> impl Iterator<Item = &Arc<Container>> {
        self.containers.iter().filter(|c| c.is_essential())
    }

    /// Returns `true` if the named container was injected by the agent.
    pub fn is_internal_container(&self, name: &str) -> bool {
        self.container(name).is_some_and(|c| c.is_internal)
    }

    pub fn desired_status(&self) -> TaskStatus {
        self.desired_status.get()
    }

    pub fn set_desired_status(&self, status: TaskStatus) {
        self.desired_status.set(status);
    }

    /// Raise the desired status, ignoring values that are not ahead of the current one.
    pub fn advance_desired_status(&self, status: TaskStatus) -> bool {
        self.desired_status.set_if(status, |cur, next| next > cur)
    }

    pub fn known_status(&self) -> TaskStatus {
        self.known_status.get()
    }

    pub fn set_known_status(&self, status: TaskStatus) {
        self.known_status.set(status);
    }

    /// Raise the cached known status, returning `true` if it moved.
    pub fn advance_known_status(&self, status: TaskStatus) -> bool {
        self.known_status.set_if(status, |cur, next| next > cur)
    }

    pub fn sent_status(&self) -> TaskStatus {
        self.sent_status.get()
    }

    pub fn set_sent_status(&self, status: TaskStatus) {
        self.sent_status.set(status);
    }

    /// Raise the sent status, ignoring values that are not ahead of the current one.
    pub fn advance_sent_status(&self, status: TaskStatus) -> bool {
        self.sent_status.set_if(status, |cur, next| next > cur)
    }

    /// Returns `true` if every container is known to have stopped.
    pub fn all_containers_stopped(&self) -> bool {
        self.containers
            .iter()
            .all(|c| c.known_status() == ContainerStatus::Stopped)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} ({}->{})",
            self.family,
            self.version,
            self.arn,
            self.known_status(),
            self.desired_status()
        )
    }
}
