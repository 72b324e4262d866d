use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use keel_model::{DockerContainer, EniAttachment, Task, TaskArn, TaskStatus};
use tracing::debug;

use crate::error::CoreError;

/// In-memory store of the tasks the agent is working on.
///
/// Cheap to clone; every clone shares the same records. Each instance is independent,
/// so tests and embedders can run several side by side.
#[derive(Clone)]
pub struct TaskEngineState {
    inner: Arc<RwLock<TaskEngineStateInner>>,
}

#[derive(Default)]
struct TaskEngineStateInner {
    /// Tasks indexed by ARN.
    tasks: HashMap<TaskArn, Arc<Task>>,
    /// Runtime containers indexed by runtime id.
    containers: HashMap<String, DockerContainer>,
    /// Index: runtime id -> owning task.
    task_by_docker_id: HashMap<String, TaskArn>,
    /// Index: task -> runtime ids of its containers.
    docker_ids_by_task: HashMap<TaskArn, Vec<String>>,
    /// Network attachments indexed by normalized MAC address.
    eni_by_mac: HashMap<String, Arc<EniAttachment>>,
}

impl TaskEngineState {
    /// Create empty state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TaskEngineStateInner::default())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TaskEngineStateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TaskEngineStateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a task. If the ARN is already known the existing record is kept and returned.
    pub fn add_task(&self, task: Task) -> Arc<Task> {
        let mut inner = self.write();

        if let Some(existing) = inner.tasks.get(&task.arn) {
            debug!(task = %task.arn, "task already registered, keeping existing record");
            return Arc::clone(existing);
        }

        let task = Arc::new(task);
        if let Some(eni) = &task.eni {
            inner
                .eni_by_mac
                .insert(normalize_mac(&eni.mac_address), Arc::clone(eni));
        }
        inner.tasks.insert(task.arn.clone(), Arc::clone(&task));
        task
    }

    /// Get task by ARN.
    pub fn task(&self, arn: &str) -> Option<Arc<Task>> {
        self.read().tasks.get(arn).cloned()
    }

    /// Remove a task together with its runtime containers and attachment.
    pub fn remove_task(&self, arn: &str) -> Option<Arc<Task>> {
        let mut inner = self.write();

        let task = inner.tasks.remove(arn)?;
        for docker_id in inner.docker_ids_by_task.remove(arn).unwrap_or_default() {
            inner.containers.remove(&docker_id);
            inner.task_by_docker_id.remove(&docker_id);
        }
        if let Some(eni) = &task.eni {
            inner.eni_by_mac.remove(&normalize_mac(&eni.mac_address));
        }
        Some(task)
    }

    /// List all tasks.
    pub fn list_all(&self) -> Vec<Arc<Task>> {
        self.read().tasks.values().cloned().collect()
    }

    /// List tasks whose cached known status matches.
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<Arc<Task>> {
        self.read()
            .tasks
            .values()
            .filter(|task| task.known_status() == status)
            .cloned()
            .collect()
    }

    /// Tasks that are running and not on their way out; the set telemetry collects for.
    pub fn running_tasks(&self) -> Vec<Arc<Task>> {
        self.read()
            .tasks
            .values()
            .filter(|task| {
                task.known_status() == TaskStatus::Running && !task.desired_status().is_terminal()
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tasks.is_empty()
    }

    /// Record the runtime container created for one of a task's containers.
    pub fn add_docker_container(
        &self,
        task_arn: &str,
        container: DockerContainer,
    ) -> Result<(), CoreError> {
        let mut inner = self.write();

        if !inner.tasks.contains_key(task_arn) {
            return Err(CoreError::UnknownTask(task_arn.to_string()));
        }

        let docker_id = container.docker_id.clone();
        inner
            .task_by_docker_id
            .insert(docker_id.clone(), task_arn.to_string());
        let ids = inner
            .docker_ids_by_task
            .entry(task_arn.to_string())
            .or_default();
        if !ids.contains(&docker_id) {
            ids.push(docker_id.clone());
        }
        inner.containers.insert(docker_id, container);
        Ok(())
    }

    pub fn container_by_docker_id(&self, docker_id: &str) -> Option<DockerContainer> {
        self.read().containers.get(docker_id).cloned()
    }

    pub fn task_by_docker_id(&self, docker_id: &str) -> Option<Arc<Task>> {
        let inner = self.read();
        inner
            .task_by_docker_id
            .get(docker_id)
            .and_then(|arn| inner.tasks.get(arn))
            .cloned()
    }

    pub fn docker_ids_for_task(&self, arn: &str) -> Vec<String> {
        self.read()
            .docker_ids_by_task
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }

    /// Find the attachment expected on the device with this MAC address.
    pub fn eni_by_mac(&self, mac: &str) -> Option<Arc<EniAttachment>> {
        self.read().eni_by_mac.get(&normalize_mac(mac)).cloned()
    }
}

impl Default for TaskEngineState {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_mac(mac: &str) -> String {
    mac.trim().to_ascii_lowercase()
}
