//! Decides which status changes reach the backend and tracks what has been sent.
mod sink;
pub use sink::{ChannelSink, StateChangeSink};

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use keel_model::{
    Container, ContainerStateChange, ContainerStatus, StateChangeEvent, Task, TaskStateChange,
    TaskStatus,
};
use tracing::{debug, trace, warn};

/// Container change the backend has not seen yet, if any.
///
/// Agent-injected containers are never reported. Only steady-state and stopped statuses are
/// reportable, and only when their backend value differs from what the last sent status
/// implied.
pub fn pending_container_change(task: &Task, container: &Container) -> Option<ContainerStateChange> {
    if container.is_internal {
        return None;
    }

    let snapshot = container.snapshot();
    let steady = container.steady_state_status();
    if !snapshot.known.should_report_to_backend(steady) || snapshot.sent >= snapshot.known {
        return None;
    }

    let status = snapshot.known.backend_status(steady);
    if status == snapshot.sent.backend_status(steady) {
        return None;
    }

    Some(ContainerStateChange {
        task_arn: task.arn.clone(),
        container_name: container.name().to_string(),
        status,
        known_status: snapshot.known,
        exit_code: container.known_exit_code(),
        reason: container.applying_error().map(|e| e.to_string()),
        port_bindings: container.known_port_bindings(),
    })
}

/// Task change the backend has not seen yet, if any.
///
/// Held back while any of the task's containers still has a change of its own to report,
/// so the backend never sees a task transition ahead of its containers.
pub fn pending_task_change(task: &Task) -> Option<TaskStateChange> {
    let known = task.known_status();
    if !known.should_report_to_backend() || task.sent_status() >= known {
        return None;
    }
    if task
        .containers
        .iter()
        .any(|c| pending_container_change(task, c).is_some())
    {
        trace!(task = %task.arn, status = %known, "task change waits for container changes");
        return None;
    }
    Some(TaskStateChange {
        task_arn: task.arn.clone(),
        status: known,
        reason: None,
    })
}

/// Returns `true` once the backend has seen the task stop along with every container it
/// knows about. Agent-injected containers are not considered.
pub fn is_stop_reported(task: &Task) -> bool {
    task.sent_status() == TaskStatus::Stopped
        && task
            .containers
            .iter()
            .filter(|c| !c.is_internal)
            .all(|c| c.sent_status() == ContainerStatus::Stopped)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReportKey {
    Container {
        task: String,
        container: String,
        status: ContainerStatus,
    },
    Task {
        task: String,
        status: TaskStatus,
    },
}

#[derive(Debug)]
enum ReportTarget {
    Container(Arc<Container>, ContainerStatus),
    Task(Arc<Task>, TaskStatus),
}

/// Proof that a report is outstanding.
///
/// Must be handed back through [`BackendReportFilter::confirm`] once delivered or
/// [`BackendReportFilter::abandon`] if delivery failed.
#[derive(Debug)]
#[must_use]
pub struct ReportTicket {
    key: ReportKey,
    target: ReportTarget,
    event: StateChangeEvent,
}

impl ReportTicket {
    pub fn event(&self) -> &StateChangeEvent {
        &self.event
    }
}

/// Filters status changes down to what the backend should see.
///
/// Keeps at most one unacknowledged report per container and status level in flight.
/// Sent statuses only advance on confirmation.
#[derive(Debug, Default)]
pub struct BackendReportFilter {
    in_flight: Mutex<HashSet<ReportKey>>,
}

impl BackendReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<ReportKey>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start reporting a container change. Returns `None` when there is nothing new to send
    /// or an identical report is already outstanding.
    pub fn begin_container_report(
        &self,
        task: &Task,
        container: &Arc<Container>,
    ) -> Option<ReportTicket> {
        let change = pending_container_change(task, container)?;
        let key = ReportKey::Container {
            task: change.task_arn.clone(),
            container: change.container_name.clone(),
            status: change.status,
        };
        if !self.in_flight().insert(key.clone()) {
            trace!(task = %task.arn, container = %container.name(), "report already in flight");
            return None;
        }
        Some(ReportTicket {
            key,
            target: ReportTarget::Container(Arc::clone(container), change.known_status),
            event: StateChangeEvent::Container(change),
        })
    }

    /// Start reporting a task change.
    pub fn begin_task_report(&self, task: &Arc<Task>) -> Option<ReportTicket> {
        let change = pending_task_change(task)?;
        let key = ReportKey::Task {
            task: change.task_arn.clone(),
            status: change.status,
        };
        if !self.in_flight().insert(key.clone()) {
            trace!(task = %task.arn, "report already in flight");
            return None;
        }
        Some(ReportTicket {
            key,
            target: ReportTarget::Task(Arc::clone(task), change.status),
            event: StateChangeEvent::Task(change),
        })
    }

    /// Record a delivered report: the sent status advances to what was reported.
    pub fn confirm(&self, ticket: ReportTicket) {
        match &ticket.target {
            ReportTarget::Container(container, known) => {
                container.advance_sent_status(*known);
            }
            ReportTarget::Task(task, status) => {
                task.advance_sent_status(*status);
            }
        }
        self.in_flight().remove(&ticket.key);
    }

    /// Release a report that could not be delivered. The sent status is left untouched.
    pub fn abandon(&self, ticket: ReportTicket) {
        self.in_flight().remove(&ticket.key);
    }

    /// Number of reports awaiting confirmation.
    pub fn outstanding(&self) -> usize {
        self.in_flight().len()
    }

    /// Submit every pending change of a task: containers first, then the task itself.
    ///
    /// The task change is only started once every container change went through. Returns
    /// the number of changes delivered. Failed deliveries are logged and stay eligible for
    /// the next call.
    pub async fn report_task(&self, task: &Arc<Task>, sink: &dyn StateChangeSink) -> usize {
        let tickets: Vec<ReportTicket> = task
            .containers
            .iter()
            .filter_map(|container| self.begin_container_report(task, container))
            .collect();

        let mut delivered = 0;
        for ticket in tickets {
            delivered += usize::from(self.deliver(task, sink, ticket).await);
        }
        if let Some(ticket) = self.begin_task_report(task) {
            delivered += usize::from(self.deliver(task, sink, ticket).await);
        }
        delivered
    }

    async fn deliver(&self, task: &Task, sink: &dyn StateChangeSink, ticket: ReportTicket) -> bool {
        match sink.submit(ticket.event().clone()).await {
            Ok(()) => {
                debug!(task = %task.arn, event = ?ticket.event(), "state change delivered");
                self.confirm(ticket);
                true
            }
            Err(err) => {
                warn!(task = %task.arn, error = %err, "failed to deliver state change");
                self.abandon(ticket);
                false
            }
        }
    }
}
