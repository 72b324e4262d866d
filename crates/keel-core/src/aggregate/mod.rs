//! Task status aggregation and the cross-container policies built on it.
//!
//! The free functions operate on a single [`Task`]; [`TaskAggregator`] wires them to the
//! record store for the runtime-observation path.
use std::sync::Arc;

use keel_model::{Container, ContainerStatus, PortBinding, Task, TaskStatus};
use tracing::{debug, info};

use crate::{TaskEngineState, error::CoreError, eni::mark_resources_provisioned};

/// Task status implied by the container known statuses.
///
/// The task sits at the lowest status any of its containers implies, so it only reports
/// `Running` once every container reached its steady state and only reports `Stopped`
/// once every container stopped.
pub fn aggregate_task_status(task: &Task) -> TaskStatus {
    task.containers
        .iter()
        .map(|c| c.known_status().task_status(c.steady_state_status()))
        .min()
        .unwrap_or_default()
}

/// Recompute the cached task known status. Returns the new value if it moved forward.
pub fn update_task_known_status(task: &Task) -> Option<TaskStatus> {
    let status = aggregate_task_status(task);
    task.advance_known_status(status).then_some(status)
}

/// If an essential container is known stopped, force every other container towards stop.
///
/// Returns the names of containers whose desired status changed. The task desired status
/// follows along.
pub fn apply_essential_cascade(task: &Task) -> Vec<String> {
    let Some(stopped) = task
        .essential_containers()
        .find(|c| c.known_terminal())
    else {
        return Vec::new();
    };

    task.advance_desired_status(TaskStatus::Stopped);

    let mut changed = Vec::new();
    for container in &task.containers {
        if container.name() == stopped.name() {
            continue;
        }
        if container.advance_desired_status(ContainerStatus::Stopped) {
            changed.push(container.name().to_string());
        }
    }
    if !changed.is_empty() {
        info!(
            task = %task.arn,
            essential = %stopped.name(),
            containers = ?changed,
            "essential container stopped, stopping the rest of the task"
        );
    }
    changed
}

/// Every essential container is at or past its steady state and has not stopped.
pub fn is_steady_running(task: &Task) -> bool {
    task.essential_containers().all(|c| {
        let known = c.known_status();
        known >= c.steady_state_status() && !known.is_terminal()
    })
}

/// Every container is known stopped.
pub fn is_stopped(task: &Task) -> bool {
    task.all_containers_stopped()
}

/// Names listed in `container`'s run dependencies that have not reached their steady state.
///
/// Names that do not resolve inside the task are returned too.
pub fn unsatisfied_dependencies(task: &Task, container: &Container) -> Vec<String> {
    container
        .spec
        .run_dependencies
        .iter()
        .filter(|name| match task.container(name) {
            Some(dep) => dep.known_status() < dep.steady_state_status(),
            None => true,
        })
        .cloned()
        .collect()
}

/// Returns `true` if `container` may be started.
pub fn dependencies_satisfied(task: &Task, container: &Container) -> bool {
    unsatisfied_dependencies(task, container).is_empty()
}

/// What the runtime reported about one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerObservation {
    pub status: ContainerStatus,
    pub exit_code: Option<i32>,
    pub port_bindings: Vec<PortBinding>,
}

impl ContainerObservation {
    pub fn new(status: ContainerStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_port_bindings(mut self, bindings: Vec<PortBinding>) -> Self {
        self.port_bindings = bindings;
        self
    }
}

/// Effect of one observation on the owning task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// New task known status, if it moved.
    pub task_status: Option<TaskStatus>,
    /// Containers told to stop because an essential container stopped.
    pub stopped_by_cascade: Vec<String>,
}

/// Applies runtime observations to the record store.
#[derive(Clone)]
pub struct TaskAggregator {
    state: TaskEngineState,
}

impl TaskAggregator {
    pub fn new(state: TaskEngineState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &TaskEngineState {
        &self.state
    }

    /// Record a container lifecycle event and recompute the task.
    pub fn observe_container(
        &self,
        task_arn: &str,
        container_name: &str,
        observation: ContainerObservation,
    ) -> Result<Aggregation, CoreError> {
        let (task, container) = self.resolve(task_arn, container_name)?;

        debug_assert!(
            observation.status != ContainerStatus::Zombie,
            "runtime reported the zombie sentinel"
        );
        let known = container.known_status();
        if observation.status <= known {
            debug!(
                task = %task.arn,
                container = %container.name(),
                %known,
                status = %observation.status,
                "redundant container status, ignoring"
            );
            return Ok(Aggregation::default());
        }

        if observation.exit_code.is_some() {
            container.set_known_exit_code(observation.exit_code);
        }
        if !observation.port_bindings.is_empty() {
            container.set_known_port_bindings(observation.port_bindings);
        }
        if !container.advance_known_status(observation.status) {
            debug!(task = %task.arn, container = %container.name(), "container status moved concurrently");
            return Ok(Aggregation::default());
        }
        debug!(
            task = %task.arn,
            container = %container.name(),
            status = %observation.status,
            "container status observed"
        );

        Ok(self.aggregate(&task))
    }

    /// Move containers waiting on task resources to `ResourcesProvisioned` and recompute.
    pub fn provision_resources(&self, task_arn: &str) -> Result<Aggregation, CoreError> {
        let task = self
            .state
            .task(task_arn)
            .ok_or_else(|| CoreError::UnknownTask(task_arn.to_string()))?;

        let provisioned = mark_resources_provisioned(&task);
        if !provisioned.is_empty() {
            debug!(task = %task.arn, containers = ?provisioned, "resources provisioned");
        }
        Ok(self.aggregate(&task))
    }

    fn aggregate(&self, task: &Task) -> Aggregation {
        let stopped_by_cascade = apply_essential_cascade(task);
        let task_status = update_task_known_status(task);
        if let Some(status) = task_status {
            info!(task = %task.arn, %status, "task status changed");
        }
        Aggregation {
            task_status,
            stopped_by_cascade,
        }
    }

    fn resolve(
        &self,
        task_arn: &str,
        container_name: &str,
    ) -> Result<(Arc<Task>, Arc<Container>), CoreError> {
        let task = self
            .state
            .task(task_arn)
            .ok_or_else(|| CoreError::UnknownTask(task_arn.to_string()))?;
        let container = task
            .container(container_name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownContainer {
                task: task_arn.to_string(),
                container: container_name.to_string(),
            })?;
        Ok((task, container))
    }
}
