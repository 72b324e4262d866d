use std::sync::Arc;

use keel_core::{
    BackendReportFilter, ChannelSink, ContainerObservation, EniStateManager,
    EniStateManagerConfig, PayloadOutcome, TaskAggregator, TaskEngineState,
    aggregate::is_stopped, apply_payload, is_stop_reported, plan_task_actions, record_applied,
    record_transition, set_desired_status,
};
use keel_model::{
    ApplyingError, Container, ContainerStatus, PayloadMessage, StateChangeEvent, Task, TaskStatus,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{config::AgentConfig, runtime::SimulatedRuntime};

/// Drives every known task towards its desired status against the simulated runtime.
pub struct Agent {
    config: AgentConfig,
    state: TaskEngineState,
    aggregator: TaskAggregator,
    filter: BackendReportFilter,
    sink: ChannelSink,
    eni: EniStateManager,
    runtime: SimulatedRuntime,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        sink: ChannelSink,
        attachment_events: mpsc::UnboundedSender<StateChangeEvent>,
    ) -> Self {
        let state = TaskEngineState::new();
        Self {
            aggregator: TaskAggregator::new(state.clone()),
            eni: EniStateManager::new(
                state.clone(),
                attachment_events,
                EniStateManagerConfig::default(),
            ),
            runtime: SimulatedRuntime::new(config.step_delay),
            filter: BackendReportFilter::new(),
            sink,
            state,
            config,
        }
    }

    pub fn state(&self) -> &TaskEngineState {
        &self.state
    }

    pub fn apply(&self, message: &PayloadMessage) -> PayloadOutcome {
        apply_payload(&self.state, message)
    }

    /// One engine pass: issue the next action of every container, report, and drop tasks
    /// whose stop the backend has seen. Returns the number of actions issued.
    pub async fn step(&self) -> usize {
        let mut actions = 0;

        for task in self.state.list_all() {
            for (container, next) in plan_task_actions(&task) {
                self.drive(&task, &container, next).await;
                actions += 1;
            }

            self.filter.report_task(&task, &self.sink).await;

            if is_stopped(&task) && (task.containers.is_empty() || is_stop_reported(&task)) {
                info!(task = %task.arn, "task stopped, forgetting it");
                self.state.remove_task(&task.arn);
            }
        }

        if !self.config.disable_metrics {
            debug!(
                tracked = self.state.len(),
                running = self.state.running_tasks().len(),
                "task metrics"
            );
        }
        actions
    }

    async fn drive(&self, task: &Arc<Task>, container: &Arc<Container>, next: ContainerStatus) {
        record_applied(container, next);

        if next == ContainerStatus::ResourcesProvisioned {
            self.provision(task, container);
            return;
        }

        match self.runtime.apply(task, container, next).await {
            Ok(applied) => {
                record_transition(container, Ok(next));
                if let Some(docker) = applied.docker
                    && let Err(err) = self.state.add_docker_container(&task.arn, docker)
                {
                    warn!(task = %task.arn, error = %err, "failed to record runtime container");
                }
                self.observe(task, container, applied.observation);
            }
            Err(err) => {
                record_transition(container, Err(err));
                // A container that cannot be brought up is given up on.
                if next != ContainerStatus::Stopped {
                    container.advance_desired_status(ContainerStatus::Stopped);
                    self.observe(task, container, ContainerObservation::new(ContainerStatus::Stopped));
                }
            }
        }
    }

    fn provision(&self, task: &Arc<Task>, container: &Arc<Container>) {
        if let Some(eni) = &task.eni
            && let Err(err) = self.eni.handle_eni_event(&eni.mac_address)
        {
            warn!(task = %task.arn, error = %err, "failed to report attachment");
        }
        if let Err(err) = self.aggregator.provision_resources(&task.arn) {
            warn!(task = %task.arn, error = %err, "failed to provision task resources");
        }
        if container.known_status() != ContainerStatus::ResourcesProvisioned {
            record_transition(
                container,
                Err(ApplyingError::new(
                    "ResourcesNotProvisioned",
                    "network attachment is not attached yet",
                )),
            );
        }
    }

    fn observe(&self, task: &Task, container: &Container, observation: ContainerObservation) {
        if let Err(err) = self
            .aggregator
            .observe_container(&task.arn, container.name(), observation)
        {
            warn!(task = %task.arn, container = %container.name(), error = %err, "dropping observation");
        }
    }

    /// Set every task and container on the way to `Stopped`.
    pub fn stop_all(&self) {
        for task in self.state.list_all() {
            task.advance_desired_status(TaskStatus::Stopped);
            if let Err(err) = set_desired_status(&self.state, &task.arn, None, ContainerStatus::Stopped) {
                warn!(task = %task.arn, error = %err, "failed to stop task");
            }
        }
    }

    /// Run engine passes until no task is left. Cancelling the token stops every task.
    pub async fn run(&self, token: CancellationToken) {
        let mut stopping = false;
        loop {
            tokio::select! {
                _ = token.cancelled(), if !stopping => {
                    info!(tasks = self.state.len(), "stopping all tasks");
                    self.stop_all();
                    stopping = true;
                }
                _ = tokio::time::sleep(self.config.step_delay) => {
                    self.step().await;
                    if self.state.is_empty() {
                        info!("no tasks left");
                        break;
                    }
                }
            }
        }
    }
}
