//! Next-step planning for the loop that drives containers towards their desired status.
//!
//! Nothing here talks to the runtime. The loop asks [`plan_next_action`] what to do,
//! records the attempt with [`record_applied`] and reports the outcome through
//! [`record_transition`]; observed statuses come back through the aggregator.
use std::sync::Arc;

use keel_model::{ApplyingError, Container, ContainerStatus, Task, next_known_state_progression};
use tracing::{debug, trace, warn};

use crate::aggregate::dependencies_satisfied;

/// Status the loop should drive `container` to next, if any.
///
/// Returns `None` when the container already stopped, when the desired status is not ahead
/// of the known one, when the step is already applied and awaiting observation, or when a
/// start is held back by run dependencies. A desired `Stopped` skips the remaining steps.
pub fn plan_next_action(task: &Task, container: &Container) -> Option<ContainerStatus> {
    let snapshot = container.snapshot();

    if snapshot.known.is_terminal() {
        return None;
    }
    if snapshot.desired <= snapshot.known {
        trace!(
            task = %task.arn,
            container = %container.name(),
            known = %snapshot.known,
            desired = %snapshot.desired,
            "desired status not ahead of known"
        );
        return None;
    }

    let next = if snapshot.desired.is_terminal() {
        ContainerStatus::Stopped
    } else {
        next_known_state_progression(snapshot.known, container.steady_state_status())
    };
    if next > snapshot.desired {
        return None;
    }
    if snapshot.applied >= next {
        trace!(task = %task.arn, container = %container.name(), %next, "step already applied");
        return None;
    }
    if next > ContainerStatus::Created
        && next != ContainerStatus::Stopped
        && !dependencies_satisfied(task, container)
    {
        debug!(task = %task.arn, container = %container.name(), %next, "waiting on run dependencies");
        return None;
    }
    Some(next)
}

/// Plan the next step of every container in the task.
pub fn plan_task_actions(task: &Task) -> Vec<(Arc<Container>, ContainerStatus)> {
    task.containers
        .iter()
        .filter_map(|c| plan_next_action(task, c).map(|next| (Arc::clone(c), next)))
        .collect()
}

/// Record that the action for `status` was issued to the runtime.
pub fn record_applied(container: &Container, status: ContainerStatus) {
    container.set_applied_status(status);
}

/// Record the outcome of an issued action.
///
/// A failure is kept on the record for the next report and the applied status falls back to
/// the known one, so the step is planned again.
pub fn record_transition(container: &Container, outcome: Result<ContainerStatus, ApplyingError>) {
    match outcome {
        Ok(status) => {
            if container.applied_status() < status {
                container.set_applied_status(status);
            }
        }
        Err(err) => {
            let known = container.known_status();
            warn!(
                container = %container.name(),
                %known,
                applied = %container.applied_status(),
                error = %err,
                "failed to apply container transition"
            );
            container.set_applying_error(Some(err));
            container.set_applied_status(known);
        }
    }
}

#[cfg(test)]
mod tests {
    use keel_model::{ContainerSpec, TaskStatus};

    use super::*;

    fn task() -> Task {
        let task = Task::new(
            "arn:task/1",
            "web",
            "1",
            vec![
                Container::new(ContainerSpec::new("db", "postgres").essential(true)).unwrap(),
                Container::new(ContainerSpec::new("app", "api").depends_on("db")).unwrap(),
            ],
        )
        .unwrap();
        task.set_desired_status(TaskStatus::Running);
        for c in &task.containers {
            c.set_desired_status(ContainerStatus::Running);
        }
        task
    }

    #[test]
    fn walks_one_step_at_a_time() {
        let task = task();
        let db = task.container("db").unwrap();

        let mut steps = Vec::new();
        while let Some(next) = plan_next_action(&task, db) {
            record_applied(db, next);
            assert_eq!(plan_next_action(&task, db), None);
            db.set_known_status(next);
            steps.push(next);
        }
        assert_eq!(
            steps,
            vec![
                ContainerStatus::Pulled,
                ContainerStatus::Created,
                ContainerStatus::Running
            ]
        );
    }

    #[test]
    fn stale_desired_status_is_a_no_op() {
        let task = task();
        let db = task.container("db").unwrap();
        db.set_known_status(ContainerStatus::Running);
        db.set_desired_status(ContainerStatus::Created);
        assert_eq!(plan_next_action(&task, db), None);
    }

    #[test]
    fn start_waits_for_dependencies() {
        let task = task();
        let app = task.container("app").unwrap();
        app.set_known_status(ContainerStatus::Created);
        assert_eq!(plan_next_action(&task, app), None);

        app.set_known_status(ContainerStatus::None);
        assert_eq!(plan_next_action(&task, app), Some(ContainerStatus::Pulled));

        app.set_known_status(ContainerStatus::Created);
        task.container("db").unwrap().set_known_status(ContainerStatus::Running);
        assert_eq!(plan_next_action(&task, app), Some(ContainerStatus::Running));
    }

    #[test]
    fn desired_stop_skips_remaining_steps() {
        let task = task();
        let app = task.container("app").unwrap();
        app.set_known_status(ContainerStatus::Created);
        app.set_desired_status(ContainerStatus::Stopped);
        assert_eq!(plan_next_action(&task, app), Some(ContainerStatus::Stopped));

        app.set_known_status(ContainerStatus::Stopped);
        assert_eq!(plan_next_action(&task, app), None);
    }

    #[test]
    fn provisioning_step_follows_running() {
        let task = Task::new(
            "arn:task/2",
            "web",
            "1",
            vec![
                Container::new(ContainerSpec::new("pause", "pause"))
                    .unwrap()
                    .with_steady_state(ContainerStatus::ResourcesProvisioned),
            ],
        )
        .unwrap();
        let pause = task.container("pause").unwrap();
        pause.set_desired_status(ContainerStatus::ResourcesProvisioned);
        pause.set_known_status(ContainerStatus::Running);
        assert_eq!(
            plan_next_action(&task, pause),
            Some(ContainerStatus::ResourcesProvisioned)
        );
    }

    #[test]
    fn failure_resets_applied_and_keeps_error() {
        let task = task();
        let db = task.container("db").unwrap();

        record_applied(db, ContainerStatus::Pulled);
        record_transition(
            db,
            Err(ApplyingError::new("CannotPullContainerError", "manifest unknown")),
        );
        assert_eq!(db.applied_status(), ContainerStatus::None);
        assert_eq!(
            db.applying_error().unwrap().to_string(),
            "CannotPullContainerError: manifest unknown"
        );
        assert_eq!(plan_next_action(&task, db), Some(ContainerStatus::Pulled));

        record_transition(db, Ok(ContainerStatus::Pulled));
        assert_eq!(db.applied_status(), ContainerStatus::Pulled);
        assert!(db.applying_error().is_some());
    }

    #[test]
    fn plan_task_collects_ready_containers() {
        let task = task();
        let planned: Vec<_> = plan_task_actions(&task)
            .into_iter()
            .map(|(c, next)| (c.name().to_string(), next))
            .collect();
        assert_eq!(
            planned,
            vec![
                ("db".to_string(), ContainerStatus::Pulled),
                ("app".to_string(), ContainerStatus::Pulled)
            ]
        );
    }
}
