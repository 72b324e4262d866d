use std::sync::Arc;

use keel_model::{
    Container, ContainerSpec, ContainerStatus, PayloadMessage, Task, TaskArn, TaskPayload,
};
use tracing::{debug, info, warn};

use crate::{TaskEngineState, error::CoreError};

/// What happened to each task of a desired-state message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadOutcome {
    /// Tasks seen for the first time and registered.
    pub added: Vec<TaskArn>,
    /// Known tasks whose desired status moved forward.
    pub updated: Vec<TaskArn>,
    /// New tasks that failed validation and were skipped.
    pub rejected: Vec<TaskArn>,
    /// `task/container` references that did not resolve locally.
    pub unresolved: Vec<String>,
}

/// Apply a desired-state message to the record store.
///
/// New tasks are validated and registered. Known tasks only ever see their desired statuses
/// advance; older or repeated values are accepted without effect.
pub fn apply_payload(state: &TaskEngineState, message: &PayloadMessage) -> PayloadOutcome {
    let mut outcome = PayloadOutcome::default();

    for payload in &message.tasks {
        match state.task(&payload.arn) {
            Some(task) => {
                if update_task(&task, payload, &mut outcome.unresolved) {
                    outcome.updated.push(task.arn.clone());
                }
            }
            None => match register_task(state, payload) {
                Ok(task) => {
                    info!(task = %task.arn, desired = %task.desired_status(), "task added");
                    outcome.added.push(task.arn.clone());
                }
                Err(err) => {
                    warn!(task = %payload.arn, error = %err, "rejecting invalid task");
                    outcome.rejected.push(payload.arn.clone());
                }
            },
        }
    }

    debug!(
        message_id = %message.message_id,
        seq = message.seq_num,
        added = outcome.added.len(),
        updated = outcome.updated.len(),
        rejected = outcome.rejected.len(),
        "payload applied"
    );
    outcome
}

/// Name of the container the agent injects to hold a task's network attachment.
pub const PAUSE_CONTAINER_NAME: &str = "~internal~ecs~pause";
pub const PAUSE_CONTAINER_IMAGE: &str = "amazon/amazon-ecs-pause:0.1.0";

/// Validate a task payload and add it to the record store.
///
/// Tasks with a network attachment get a pause container that reaches its steady state
/// only once the attachment is in place.
pub fn register_task(state: &TaskEngineState, payload: &TaskPayload) -> Result<Arc<Task>, CoreError> {
    let mut task = Task::from_payload(payload)?;
    if payload.eni.is_some() {
        let pause = Container::internal(
            ContainerSpec::new(PAUSE_CONTAINER_NAME, PAUSE_CONTAINER_IMAGE).essential(true),
            ContainerStatus::ResourcesProvisioned,
        )?;
        task = task.with_internal_container(pause)?;
    }
    Ok(state.add_task(task))
}

fn update_task(task: &Task, payload: &TaskPayload, unresolved: &mut Vec<String>) -> bool {
    let mut changed = task.advance_desired_status(payload.desired_status);

    for declared in &payload.containers {
        let Some(container) = task.container(&declared.spec.name) else {
            warn!(task = %task.arn, container = %declared.spec.name, "dropping update for unknown container");
            unresolved.push(format!("{}/{}", task.arn, declared.spec.name));
            continue;
        };
        let desired = declared.desired_status.unwrap_or_else(|| {
            payload
                .desired_status
                .container_status(container.steady_state_status())
        });
        changed |= container.advance_desired_status(desired);
    }

    if !changed {
        debug!(task = %task.arn, desired = %payload.desired_status, "stale desired status ignored");
    }
    changed
}

/// Set the desired status of one container, or of every container when no name is given.
///
/// Returns `true` if any desired status advanced.
pub fn set_desired_status(
    state: &TaskEngineState,
    task_arn: &str,
    container_name: Option<&str>,
    status: ContainerStatus,
) -> Result<bool, CoreError> {
    debug_assert!(status != ContainerStatus::Zombie, "zombie is not a desired status");

    let task = state
        .task(task_arn)
        .ok_or_else(|| CoreError::UnknownTask(task_arn.to_string()))?;

    match container_name {
        Some(name) => {
            let container = task.container(name).ok_or_else(|| CoreError::UnknownContainer {
                task: task_arn.to_string(),
                container: name.to_string(),
            })?;
            Ok(container.advance_desired_status(status))
        }
        None => Ok(task
            .containers
            .iter()
            .fold(false, |changed, c| c.advance_desired_status(status) | changed)),
    }
}

#[cfg(test)]
mod tests {
    use keel_model::{ContainerPayload, EniPayload, TaskStatus};

    use super::*;

    fn task_payload(arn: &str, desired: TaskStatus) -> TaskPayload {
        TaskPayload {
            arn: arn.into(),
            family: "web".into(),
            version: "1".into(),
            desired_status: desired,
            containers: vec![
                ContainerPayload::new(ContainerSpec::new("app", "nginx").essential(true)),
                ContainerPayload::new(ContainerSpec::new("log", "fluentbit")),
            ],
            eni: None,
        }
    }

    fn message(tasks: Vec<TaskPayload>) -> PayloadMessage {
        PayloadMessage {
            message_id: "m-1".into(),
            seq_num: 1,
            tasks,
        }
    }

    #[test]
    fn registers_new_tasks() {
        let state = TaskEngineState::new();
        let outcome = apply_payload(&state, &message(vec![task_payload("a", TaskStatus::Running)]));

        assert_eq!(outcome.added, vec!["a".to_string()]);
        let task = state.task("a").unwrap();
        assert_eq!(task.container("log").unwrap().desired_status(), ContainerStatus::Running);
    }

    #[test]
    fn invalid_task_is_rejected_and_others_continue() {
        let state = TaskEngineState::new();
        let mut bad = task_payload("bad", TaskStatus::Running);
        bad.containers[0].spec.memory = 2;

        let outcome = apply_payload(
            &state,
            &message(vec![bad, task_payload("good", TaskStatus::Running)]),
        );
        assert_eq!(outcome.rejected, vec!["bad".to_string()]);
        assert_eq!(outcome.added, vec!["good".to_string()]);
        assert!(state.task("bad").is_none());
    }

    #[test]
    fn desired_status_advances_but_never_regresses() {
        let state = TaskEngineState::new();
        apply_payload(&state, &message(vec![task_payload("a", TaskStatus::Running)]));

        let outcome = apply_payload(&state, &message(vec![task_payload("a", TaskStatus::Created)]));
        assert!(outcome.updated.is_empty());
        let task = state.task("a").unwrap();
        assert_eq!(task.desired_status(), TaskStatus::Running);

        let outcome = apply_payload(&state, &message(vec![task_payload("a", TaskStatus::Stopped)]));
        assert_eq!(outcome.updated, vec!["a".to_string()]);
        assert_eq!(task.desired_status(), TaskStatus::Stopped);
        assert!(task.containers.iter().all(|c| c.desired_terminal()));
    }

    #[test]
    fn unknown_containers_are_dropped() {
        let state = TaskEngineState::new();
        apply_payload(&state, &message(vec![task_payload("a", TaskStatus::Running)]));

        let mut update = task_payload("a", TaskStatus::Running);
        update
            .containers
            .push(ContainerPayload::new(ContainerSpec::new("ghost", "x")));
        let outcome = apply_payload(&state, &message(vec![update]));
        assert_eq!(outcome.unresolved, vec!["a/ghost".to_string()]);
        assert!(outcome.updated.is_empty());
    }

    #[test]
    fn register_wraps_model_errors() {
        let state = TaskEngineState::new();
        let mut bad = task_payload("bad", TaskStatus::Running);
        bad.containers[1].spec.image.clear();
        assert!(matches!(
            register_task(&state, &bad),
            Err(CoreError::InvalidSpec(keel_model::ModelError::EmptyImage { .. }))
        ));
    }

    #[test]
    fn attachment_adds_pause_container() {
        let state = TaskEngineState::new();
        let mut payload = task_payload("a", TaskStatus::Running);
        payload.eni = Some(EniPayload {
            attachment_arn: "arn:attachment/1".into(),
            mac_address: "0a:00:00:00:00:01".into(),
        });

        let task = register_task(&state, &payload).unwrap();
        assert!(task.is_internal_container(PAUSE_CONTAINER_NAME));
        let pause = task.container(PAUSE_CONTAINER_NAME).unwrap();
        assert_eq!(pause.desired_status(), ContainerStatus::ResourcesProvisioned);
        assert!(state.eni_by_mac("0A:00:00:00:00:01").is_some());
    }

    #[test]
    fn set_desired_for_one_or_all_containers() {
        let state = TaskEngineState::new();
        apply_payload(&state, &message(vec![task_payload("a", TaskStatus::Created)]));

        assert!(set_desired_status(&state, "a", Some("app"), ContainerStatus::Running).unwrap());
        assert!(!set_desired_status(&state, "a", Some("app"), ContainerStatus::Created).unwrap());
        assert!(set_desired_status(&state, "a", None, ContainerStatus::Stopped).unwrap());

        let task = state.task("a").unwrap();
        assert!(task.containers.iter().all(|c| c.desired_terminal()));

        assert!(matches!(
            set_desired_status(&state, "zzz", None, ContainerStatus::Stopped),
            Err(CoreError::UnknownTask(_))
        ));
        assert!(matches!(
            set_desired_status(&state, "a", Some("ghost"), ContainerStatus::Stopped),
            Err(CoreError::UnknownContainer { .. })
        ));
    }
}
